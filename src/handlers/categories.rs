use actix_web::{web, HttpRequest, HttpResponse};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::auth::authenticate;
use crate::errors::ApiError;
use crate::models::{Category, CreateCategory, UpdateCategory};

const CATEGORY_COLUMNS: &str = "id, name, description, created_at, updated_at";

fn map_category(row: &PgRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub async fn get_categories(
    pool: web::Data<PgPool>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;

    let categories = sqlx::query(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name"
    ))
    .map(|row: PgRow| map_category(&row))
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(categories))
}

pub async fn get_category(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;

    let category = sqlx::query(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
    ))
    .bind(id.into_inner())
    .map(|row: PgRow| map_category(&row))
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("Categoria não encontrada"))?;

    Ok(HttpResponse::Ok().json(category))
}

pub async fn create_category(
    pool: web::Data<PgPool>,
    category: web::Json<CreateCategory>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;

    if category.name.trim().is_empty() {
        return Err(ApiError::validation("Nome é obrigatório"));
    }

    let existing: (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM categories WHERE LOWER(name) = LOWER($1))")
            .bind(&category.name)
            .fetch_one(pool.get_ref())
            .await?;
    if existing.0 {
        return Err(ApiError::validation("Categoria já cadastrada"));
    }

    let created = sqlx::query(&format!(
        "INSERT INTO categories (id, name, description) VALUES (gen_random_uuid(), $1, $2) \
         RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(&category.name)
    .bind(&category.description)
    .map(|row: PgRow| map_category(&row))
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Created().json(created))
}

pub async fn update_category(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    category: web::Json<UpdateCategory>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;
    let category_id = id.into_inner();

    let updated = sqlx::query(&format!(
        "UPDATE categories SET name = COALESCE($1, name), \
         description = COALESCE($2, description), updated_at = NOW() \
         WHERE id = $3 RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(&category.name)
    .bind(&category.description)
    .bind(category_id)
    .map(|row: PgRow| map_category(&row))
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("Categoria não encontrada"))?;

    Ok(HttpResponse::Ok().json(updated))
}

pub async fn delete_category(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;

    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id.into_inner())
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Categoria não encontrada"));
    }

    Ok(HttpResponse::NoContent().finish())
}

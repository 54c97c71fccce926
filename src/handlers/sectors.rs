use actix_web::{web, HttpRequest, HttpResponse};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::auth::authenticate;
use crate::errors::ApiError;
use crate::models::{CreateSector, Sector, UpdateSector};

const SECTOR_COLUMNS: &str = "id, name, description, created_at, updated_at";

fn map_sector(row: &PgRow) -> Sector {
    Sector {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub async fn get_sectors(
    pool: web::Data<PgPool>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;

    let sectors = sqlx::query(&format!(
        "SELECT {SECTOR_COLUMNS} FROM sectors ORDER BY name"
    ))
    .map(|row: PgRow| map_sector(&row))
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(sectors))
}

pub async fn get_sector(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;

    let sector = sqlx::query(&format!(
        "SELECT {SECTOR_COLUMNS} FROM sectors WHERE id = $1"
    ))
    .bind(id.into_inner())
    .map(|row: PgRow| map_sector(&row))
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("Setor não encontrado"))?;

    Ok(HttpResponse::Ok().json(sector))
}

pub async fn create_sector(
    pool: web::Data<PgPool>,
    sector: web::Json<CreateSector>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;

    if sector.name.trim().is_empty() {
        return Err(ApiError::validation("Nome é obrigatório"));
    }

    let existing: (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM sectors WHERE LOWER(name) = LOWER($1))")
            .bind(&sector.name)
            .fetch_one(pool.get_ref())
            .await?;
    if existing.0 {
        return Err(ApiError::validation("Setor já cadastrado"));
    }

    let created = sqlx::query(&format!(
        "INSERT INTO sectors (id, name, description) VALUES (gen_random_uuid(), $1, $2) \
         RETURNING {SECTOR_COLUMNS}"
    ))
    .bind(&sector.name)
    .bind(&sector.description)
    .map(|row: PgRow| map_sector(&row))
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Created().json(created))
}

pub async fn update_sector(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    sector: web::Json<UpdateSector>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;
    let sector_id = id.into_inner();

    let updated = sqlx::query(&format!(
        "UPDATE sectors SET name = COALESCE($1, name), \
         description = COALESCE($2, description), updated_at = NOW() \
         WHERE id = $3 RETURNING {SECTOR_COLUMNS}"
    ))
    .bind(&sector.name)
    .bind(&sector.description)
    .bind(sector_id)
    .map(|row: PgRow| map_sector(&row))
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("Setor não encontrado"))?;

    Ok(HttpResponse::Ok().json(updated))
}

pub async fn delete_sector(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;

    let result = sqlx::query("DELETE FROM sectors WHERE id = $1")
        .bind(id.into_inner())
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Setor não encontrado"));
    }

    Ok(HttpResponse::NoContent().finish())
}

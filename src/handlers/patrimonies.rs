use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

use crate::audit::{detail_value, record_log};
use crate::auth::authenticate;
use crate::errors::ApiError;
use crate::models::{AssetStatus, CreatePatrimony, Patrimony, PatrimonyQuery, UpdatePatrimony};

pub(crate) const PATRIMONY_COLUMNS: &str = "id, plate, name, description, category_id, \
     sector_id, responsible_id, acquisition_date, value, status, created_by, \
     created_at, updated_at";

// Valores DECIMAL chegam como BigDecimal; converte com tolerância a
// colunas antigas armazenadas como float.
pub(crate) fn convert_to_f64(row: &PgRow, column: &str) -> f64 {
    if let Ok(bd) = row.try_get::<sqlx::types::BigDecimal, _>(column) {
        if let Ok(val) = bd.to_string().parse::<f64>() {
            return val;
        }
    }
    if let Ok(Some(bd)) = row.try_get::<Option<sqlx::types::BigDecimal>, _>(column) {
        if let Ok(val) = bd.to_string().parse::<f64>() {
            return val;
        }
    }
    if let Ok(val) = row.try_get::<f64, _>(column) {
        return val;
    }
    if let Ok(Some(val)) = row.try_get::<Option<f64>, _>(column) {
        return val;
    }
    0.0
}

pub(crate) fn map_patrimony(row: &PgRow) -> Patrimony {
    let status: String = row.get("status");
    Patrimony {
        id: row.get("id"),
        plate: row.get("plate"),
        name: row.get("name"),
        description: row.get("description"),
        category_id: row.get("category_id"),
        sector_id: row.get("sector_id"),
        responsible_id: row.get("responsible_id"),
        acquisition_date: row.get("acquisition_date"),
        value: convert_to_f64(row, "value"),
        status: AssetStatus::parse(&status).unwrap_or(AssetStatus::Active),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(crate) async fn fetch_patrimony<'e, E>(
    executor: E,
    id: Uuid,
) -> Result<Option<Patrimony>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(&format!(
        "SELECT {PATRIMONY_COLUMNS} FROM patrimonies WHERE id = $1"
    ))
    .bind(id)
    .map(|row: PgRow| map_patrimony(&row))
    .fetch_optional(executor)
    .await
}

pub async fn get_patrimonies(
    pool: web::Data<PgPool>,
    query: web::Query<PatrimonyQuery>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;

    let patrimonies = sqlx::query(&format!(
        "SELECT {PATRIMONY_COLUMNS} FROM patrimonies \
         WHERE ($1::uuid IS NULL OR sector_id = $1) \
           AND ($2::uuid IS NULL OR category_id = $2) \
           AND ($3::varchar IS NULL OR status = $3) \
         ORDER BY created_at DESC"
    ))
    .bind(query.sector_id)
    .bind(query.category_id)
    .bind(query.status.map(|s| s.as_str()))
    .map(|row: PgRow| map_patrimony(&row))
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(patrimonies))
}

pub async fn get_patrimony(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;

    let patrimony = fetch_patrimony(pool.get_ref(), id.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Patrimônio não encontrado"))?;

    Ok(HttpResponse::Ok().json(patrimony))
}

pub async fn create_patrimony(
    pool: web::Data<PgPool>,
    patrimony: web::Json<CreatePatrimony>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;

    if patrimony.plate.trim().is_empty() {
        return Err(ApiError::validation("Plate é obrigatório"));
    }
    if patrimony.name.trim().is_empty() {
        return Err(ApiError::validation("Name é obrigatório"));
    }
    if patrimony.value < 0.0 {
        return Err(ApiError::validation("Value não pode ser negativo"));
    }

    let status = patrimony.status.unwrap_or(AssetStatus::Active);

    let record_id = sqlx::query(
        "INSERT INTO patrimonies (id, plate, name, description, category_id, sector_id, \
         responsible_id, acquisition_date, value, status, created_by) \
         VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING id",
    )
    .bind(&patrimony.plate)
    .bind(&patrimony.name)
    .bind(&patrimony.description)
    .bind(patrimony.category_id)
    .bind(patrimony.sector_id)
    .bind(patrimony.responsible_id)
    .bind(patrimony.acquisition_date)
    .bind(patrimony.value)
    .bind(status.as_str())
    .bind(user.id)
    .map(|row: PgRow| row.get::<Uuid, _>("id"))
    .fetch_one(pool.get_ref())
    .await
    .map_err(|e| {
        if e.to_string().contains("duplicate key") {
            ApiError::validation("Plate já cadastrada")
        } else {
            ApiError::from(e)
        }
    })?;

    let created = fetch_patrimony(pool.get_ref(), record_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Patrimônio não encontrado"))?;

    record_log(
        pool.get_ref(),
        "Criação de Patrimônio",
        "patrimonies",
        Some(created.id),
        Some(user.id),
        detail_value(&json!({
            "plate": created.plate,
            "name": created.name,
            "sector_id": created.sector_id,
            "value": created.value,
        })),
    )
    .await;

    Ok(HttpResponse::Created().json(created))
}

pub async fn update_patrimony(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    patrimony: web::Json<UpdatePatrimony>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;
    let patrimony_id = id.into_inner();

    let existing = fetch_patrimony(pool.get_ref(), patrimony_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Patrimônio não encontrado"))?;

    // A baixa é o único caminho que retira um patrimônio de circulação
    if patrimony.status == Some(AssetStatus::WrittenOff)
        && existing.status != AssetStatus::WrittenOff
    {
        return Err(ApiError::validation(
            "Status written_off só é atribuído pelo fluxo de baixa",
        ));
    }

    let plate = patrimony.plate.clone().unwrap_or(existing.plate);
    let name = patrimony.name.clone().unwrap_or(existing.name);
    let description = patrimony.description.clone().or(existing.description);
    let category_id = patrimony.category_id.or(existing.category_id);
    let sector_id = patrimony.sector_id.or(existing.sector_id);
    let responsible_id = patrimony.responsible_id.or(existing.responsible_id);
    let acquisition_date = patrimony.acquisition_date.or(existing.acquisition_date);
    let value = patrimony.value.unwrap_or(existing.value);
    let status = patrimony.status.unwrap_or(existing.status);

    sqlx::query(
        "UPDATE patrimonies SET plate = $1, name = $2, description = $3, category_id = $4, \
         sector_id = $5, responsible_id = $6, acquisition_date = $7, value = $8, \
         status = $9, updated_at = NOW() WHERE id = $10",
    )
    .bind(&plate)
    .bind(&name)
    .bind(&description)
    .bind(category_id)
    .bind(sector_id)
    .bind(responsible_id)
    .bind(acquisition_date)
    .bind(value)
    .bind(status.as_str())
    .bind(patrimony_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        if e.to_string().contains("duplicate key") {
            ApiError::validation("Plate já cadastrada")
        } else {
            ApiError::from(e)
        }
    })?;

    let updated = fetch_patrimony(pool.get_ref(), patrimony_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Patrimônio não encontrado"))?;

    record_log(
        pool.get_ref(),
        "Atualização de Patrimônio",
        "patrimonies",
        Some(patrimony_id),
        Some(user.id),
        detail_value(&json!({
            "plate": updated.plate,
            "status": updated.status,
            "sector_id": updated.sector_id,
        })),
    )
    .await;

    Ok(HttpResponse::Ok().json(updated))
}

pub async fn delete_patrimony(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;
    let patrimony_id = id.into_inner();

    let result = sqlx::query("DELETE FROM patrimonies WHERE id = $1")
        .bind(patrimony_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Patrimônio não encontrado"));
    }

    record_log(
        pool.get_ref(),
        "Exclusão de Patrimônio",
        "patrimonies",
        Some(patrimony_id),
        Some(user.id),
        detail_value(&json!({
            "mensagem": format!("Patrimônio {patrimony_id} excluído")
        })),
    )
    .await;

    Ok(HttpResponse::Ok().json("Patrimônio excluído com sucesso"))
}

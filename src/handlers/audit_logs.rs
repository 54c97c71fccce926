use actix_web::{web, HttpRequest, HttpResponse};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::auth::authenticate;
use crate::errors::ApiError;
use crate::models::{AuditLog, AuditLogQuery};

const LOG_COLUMNS: &str = "id, action, entity, entity_id, user_id, details, created_at";

fn map_log(row: &PgRow) -> AuditLog {
    AuditLog {
        id: row.get("id"),
        action: row.get("action"),
        entity: row.get("entity"),
        entity_id: row.get("entity_id"),
        user_id: row.get("user_id"),
        details: row.get("details"),
        created_at: row.get("created_at"),
    }
}

pub async fn get_audit_logs(
    pool: web::Data<PgPool>,
    query: web::Query<AuditLogQuery>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;

    let limit = query.limit.unwrap_or(100).clamp(1, 500);

    let logs = sqlx::query(&format!(
        "SELECT {LOG_COLUMNS} FROM audit_logs \
         WHERE ($1::varchar IS NULL OR entity = $1) \
           AND ($2::uuid IS NULL OR entity_id = $2) \
         ORDER BY created_at DESC LIMIT $3"
    ))
    .bind(&query.entity)
    .bind(query.entity_id)
    .bind(limit)
    .map(|row: PgRow| map_log(&row))
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(logs))
}

pub async fn get_audit_log(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;

    let log = sqlx::query(&format!("SELECT {LOG_COLUMNS} FROM audit_logs WHERE id = $1"))
        .bind(id.into_inner())
        .map(|row: PgRow| map_log(&row))
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| ApiError::not_found("Log não encontrado"))?;

    Ok(HttpResponse::Ok().json(log))
}

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};
use tracing::info;
use uuid::Uuid;

use crate::audit::{detail_value, record_log};
use crate::auth::authenticate;
use crate::errors::ApiError;
use crate::models::{
    ApproveWriteOff, AssetStatus, CreateWriteOff, RejectWriteOff, WriteOff, WriteOffQuery,
    WriteOffStatus,
};
use crate::permissions::{authorize, WorkflowAction};

use super::patrimonies::fetch_patrimony;

const WRITE_OFF_COLUMNS: &str = "id, patrimony_id, write_off_type, reason, requested_by, \
     document_path, approved_by, approval_date, approval_notes, rejected_by, rejection_date, \
     rejection_reason, created_at, updated_at";

fn map_write_off(row: &PgRow) -> WriteOff {
    WriteOff {
        id: row.get("id"),
        patrimony_id: row.get("patrimony_id"),
        write_off_type: row.get("write_off_type"),
        reason: row.get("reason"),
        requested_by: row.get("requested_by"),
        document_path: row.get("document_path"),
        approved_by: row.get("approved_by"),
        approval_date: row.get("approval_date"),
        approval_notes: row.get("approval_notes"),
        rejected_by: row.get("rejected_by"),
        rejection_date: row.get("rejection_date"),
        rejection_reason: row.get("rejection_reason"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

async fn fetch_write_off<'e, E>(executor: E, id: Uuid) -> Result<Option<WriteOff>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(&format!(
        "SELECT {WRITE_OFF_COLUMNS} FROM write_offs WHERE id = $1"
    ))
    .bind(id)
    .map(|row: PgRow| map_write_off(&row))
    .fetch_optional(executor)
    .await
}

/// Solicita a baixa de um patrimônio. O patrimônio não é tocado até a
/// aprovação.
pub async fn request_write_off(
    pool: web::Data<PgPool>,
    write_off: web::Json<CreateWriteOff>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;

    if write_off.write_off_type.trim().is_empty() {
        return Err(ApiError::validation("Tipo de baixa é obrigatório"));
    }

    let mut tx = pool.begin().await?;

    let patrimony = fetch_patrimony(&mut *tx, write_off.patrimony_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Patrimônio não encontrado"))?;

    if patrimony.status == AssetStatus::WrittenOff {
        return Err(ApiError::conflict("Este patrimônio já foi baixado"));
    }

    let write_off_id = sqlx::query(
        "INSERT INTO write_offs (id, patrimony_id, write_off_type, reason, requested_by, \
         document_path) VALUES (gen_random_uuid(), $1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(write_off.patrimony_id)
    .bind(&write_off.write_off_type)
    .bind(&write_off.reason)
    .bind(user.id)
    .bind(&write_off.document_path)
    .map(|row: PgRow| row.get::<Uuid, _>("id"))
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(%write_off_id, patrimony_id = %write_off.patrimony_id, "baixa solicitada");

    record_log(
        pool.get_ref(),
        "Baixa de Patrimônio",
        "write_offs",
        Some(write_off_id),
        Some(user.id),
        detail_value(&json!({
            "patrimonio_id": write_off.patrimony_id,
            "tipo": write_off.write_off_type,
            "motivo": write_off.reason,
            "documento": write_off.document_path,
        })),
    )
    .await;

    let created = fetch_write_off(pool.get_ref(), write_off_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Baixa não encontrada"))?;

    Ok(HttpResponse::Created().json(created))
}

/// Aprova uma baixa pendente e marca o patrimônio como baixado, na mesma
/// transação. Restrito a administradores.
pub async fn approve_write_off(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    body: web::Json<ApproveWriteOff>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;
    let write_off_id = id.into_inner();

    authorize(&user, &WorkflowAction::DecideWriteOff)?;

    let mut tx = pool.begin().await?;

    let write_off = fetch_write_off(&mut *tx, write_off_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Baixa não encontrada"))?;

    if write_off.is_decided() {
        return Err(ApiError::conflict("Baixa já foi decidida"));
    }

    let result = sqlx::query(
        "UPDATE write_offs SET approved_by = $1, approval_date = NOW(), approval_notes = $2, \
         updated_at = NOW() \
         WHERE id = $3 AND approved_by IS NULL AND rejected_by IS NULL",
    )
    .bind(user.id)
    .bind(&body.notes)
    .bind(write_off_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Baixa já foi decidida"));
    }

    sqlx::query("UPDATE patrimonies SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(AssetStatus::WrittenOff.as_str())
        .bind(write_off.patrimony_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(%write_off_id, patrimony_id = %write_off.patrimony_id, "baixa aprovada");

    record_log(
        pool.get_ref(),
        "Aprovação de Baixa",
        "write_offs",
        Some(write_off_id),
        Some(user.id),
        detail_value(&json!({
            "patrimonio_id": write_off.patrimony_id,
            "status_patrimonio": AssetStatus::WrittenOff,
            "observacoes": body.notes,
        })),
    )
    .await;

    let approved = fetch_write_off(pool.get_ref(), write_off_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Baixa não encontrada"))?;

    Ok(HttpResponse::Ok().json(approved))
}

/// Rejeita uma baixa pendente. O patrimônio permanece como está.
pub async fn reject_write_off(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    body: web::Json<RejectWriteOff>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;
    let write_off_id = id.into_inner();

    authorize(&user, &WorkflowAction::DecideWriteOff)?;

    if body.rejection_reason.trim().is_empty() {
        return Err(ApiError::validation("Motivo de rejeição é obrigatório"));
    }

    let mut tx = pool.begin().await?;

    let write_off = fetch_write_off(&mut *tx, write_off_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Baixa não encontrada"))?;

    if write_off.is_decided() {
        return Err(ApiError::conflict("Baixa já foi decidida"));
    }

    let result = sqlx::query(
        "UPDATE write_offs SET rejected_by = $1, rejection_date = NOW(), \
         rejection_reason = $2, updated_at = NOW() \
         WHERE id = $3 AND approved_by IS NULL AND rejected_by IS NULL",
    )
    .bind(user.id)
    .bind(&body.rejection_reason)
    .bind(write_off_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Baixa já foi decidida"));
    }

    tx.commit().await?;

    info!(%write_off_id, "baixa rejeitada");

    record_log(
        pool.get_ref(),
        "Rejeição de Baixa",
        "write_offs",
        Some(write_off_id),
        Some(user.id),
        detail_value(&json!({
            "patrimonio_id": write_off.patrimony_id,
            "motivo_rejeicao": body.rejection_reason,
        })),
    )
    .await;

    let rejected = fetch_write_off(pool.get_ref(), write_off_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Baixa não encontrada"))?;

    Ok(HttpResponse::Ok().json(rejected))
}

pub async fn get_write_offs(
    pool: web::Data<PgPool>,
    query: web::Query<WriteOffQuery>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;

    let status_clause = match query.status {
        Some(WriteOffStatus::Pending) => " AND approved_by IS NULL AND rejected_by IS NULL",
        Some(WriteOffStatus::Approved) => " AND approved_by IS NOT NULL",
        Some(WriteOffStatus::Rejected) => " AND rejected_by IS NOT NULL",
        None => "",
    };

    let write_offs = sqlx::query(&format!(
        "SELECT {WRITE_OFF_COLUMNS} FROM write_offs \
         WHERE ($1::uuid IS NULL OR patrimony_id = $1){status_clause} \
         ORDER BY created_at DESC"
    ))
    .bind(query.patrimony_id)
    .map(|row: PgRow| map_write_off(&row))
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(write_offs))
}

pub async fn get_write_off(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;

    let write_off = fetch_write_off(pool.get_ref(), id.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Baixa não encontrada"))?;

    Ok(HttpResponse::Ok().json(write_off))
}

/// Exclui uma baixa ainda pendente. Baixas decididas permanecem como
/// registro histórico.
pub async fn delete_write_off(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;
    let write_off_id = id.into_inner();

    let mut tx = pool.begin().await?;

    let write_off = fetch_write_off(&mut *tx, write_off_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Baixa não encontrada"))?;

    if write_off.is_decided() {
        return Err(ApiError::conflict("Baixa decidida não pode ser excluída"));
    }

    sqlx::query("DELETE FROM write_offs WHERE id = $1")
        .bind(write_off_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    record_log(
        pool.get_ref(),
        "Exclusão de Baixa",
        "write_offs",
        Some(write_off_id),
        Some(user.id),
        detail_value(&json!({
            "mensagem": format!("Baixa {write_off_id} removida")
        })),
    )
    .await;

    Ok(HttpResponse::NoContent().finish())
}

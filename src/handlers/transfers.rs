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
    ApproveTransfer, CreateTransfer, RejectTransfer, Transfer, TransferQuery, TransferStatus, User,
};
use crate::permissions::{authorize, WorkflowAction};

use super::patrimonies::fetch_patrimony;

const TRANSFER_COLUMNS: &str = "id, patrimony_id, origin_sector_id, destination_sector_id, \
     origin_responsible_id, destination_responsible_id, requested_by, reason, approved_by, \
     approval_date, approval_notes, rejection_reason, effectuated, effectuation_date, \
     created_at, updated_at";

fn map_transfer(row: &PgRow) -> Transfer {
    Transfer {
        id: row.get("id"),
        patrimony_id: row.get("patrimony_id"),
        origin_sector_id: row.get("origin_sector_id"),
        destination_sector_id: row.get("destination_sector_id"),
        origin_responsible_id: row.get("origin_responsible_id"),
        destination_responsible_id: row.get("destination_responsible_id"),
        requested_by: row.get("requested_by"),
        reason: row.get("reason"),
        approved_by: row.get("approved_by"),
        approval_date: row.get("approval_date"),
        approval_notes: row.get("approval_notes"),
        rejection_reason: row.get("rejection_reason"),
        effectuated: row.get("effectuated"),
        effectuation_date: row.get("effectuation_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

async fn fetch_transfer<'e, E>(executor: E, id: Uuid) -> Result<Option<Transfer>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(&format!(
        "SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = $1"
    ))
    .bind(id)
    .map(|row: PgRow| map_transfer(&row))
    .fetch_optional(executor)
    .await
}

/// Solicita a transferência de custódia de um patrimônio.
///
/// Não mexe no patrimônio: a custódia só muda na efetivação. No máximo uma
/// transferência em aberto (sem decisão) pode existir por patrimônio.
pub async fn request_transfer(
    pool: web::Data<PgPool>,
    transfer: web::Json<CreateTransfer>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;

    let mut tx = pool.begin().await?;

    let patrimony = fetch_patrimony(&mut *tx, transfer.patrimony_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Patrimônio não encontrado"))?;

    authorize(&user, &WorkflowAction::RequestTransfer { patrimony: &patrimony })?;

    // Transferência sem efeito não é aceita
    let sector_changes = transfer.destination_sector_id.is_some()
        && transfer.destination_sector_id != patrimony.sector_id;
    let responsible_changes = transfer.destination_responsible_id.is_some()
        && transfer.destination_responsible_id != patrimony.responsible_id;
    if !sector_changes && !responsible_changes {
        return Err(ApiError::validation(
            "Destino igual à custódia atual do patrimônio",
        ));
    }

    let open_exists: (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM transfers WHERE patrimony_id = $1 \
         AND approved_by IS NULL AND rejection_reason IS NULL)",
    )
    .bind(transfer.patrimony_id)
    .fetch_one(&mut *tx)
    .await?;

    if open_exists.0 {
        return Err(ApiError::conflict(
            "Já existe uma transferência em aberto para este patrimônio",
        ));
    }

    let origin_sector_id = transfer.origin_sector_id.or(patrimony.sector_id);
    let origin_responsible_id = transfer
        .origin_responsible_id
        .or(patrimony.responsible_id);

    let transfer_id = sqlx::query(
        "INSERT INTO transfers (id, patrimony_id, origin_sector_id, destination_sector_id, \
         origin_responsible_id, destination_responsible_id, requested_by, reason) \
         VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6, $7) RETURNING id",
    )
    .bind(transfer.patrimony_id)
    .bind(origin_sector_id)
    .bind(transfer.destination_sector_id)
    .bind(origin_responsible_id)
    .bind(transfer.destination_responsible_id)
    .bind(user.id)
    .bind(&transfer.reason)
    .map(|row: PgRow| row.get::<Uuid, _>("id"))
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(%transfer_id, patrimony_id = %transfer.patrimony_id, "transferência solicitada");

    record_log(
        pool.get_ref(),
        "Solicitação de Transferência",
        "transfers",
        Some(transfer_id),
        Some(user.id),
        detail_value(&json!({
            "patrimonio_id": transfer.patrimony_id,
            "setor_origem": origin_sector_id,
            "setor_destino": transfer.destination_sector_id,
            "responsavel_origem": origin_responsible_id,
            "responsavel_destino": transfer.destination_responsible_id,
            "motivo": transfer.reason,
        })),
    )
    .await;

    let created = fetch_transfer(pool.get_ref(), transfer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Transferência não encontrada"))?;

    Ok(HttpResponse::Created().json(created))
}

/// Aprova uma transferência pendente. Com `effectuate = true`, encadeia a
/// efetivação na sequência, com a mesma identidade do aprovador.
pub async fn approve_transfer(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    body: web::Json<ApproveTransfer>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;
    let transfer_id = id.into_inner();

    let mut tx = pool.begin().await?;

    let transfer = fetch_transfer(&mut *tx, transfer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Transferência não encontrada"))?;

    if transfer.is_decided() {
        return Err(ApiError::conflict("Transferência já foi decidida"));
    }

    authorize(&user, &WorkflowAction::DecideTransfer { transfer: &transfer })?;

    // Guarda de corrida: a decisão só entra se ninguém decidiu antes
    let result = sqlx::query(
        "UPDATE transfers SET approved_by = $1, approval_date = NOW(), approval_notes = $2, \
         updated_at = NOW() \
         WHERE id = $3 AND approved_by IS NULL AND rejection_reason IS NULL",
    )
    .bind(user.id)
    .bind(&body.notes)
    .bind(transfer_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Transferência já foi decidida"));
    }

    tx.commit().await?;

    info!(%transfer_id, approver = %user.id, "transferência aprovada");

    record_log(
        pool.get_ref(),
        "Aprovação de Transferência",
        "transfers",
        Some(transfer_id),
        Some(user.id),
        detail_value(&json!({
            "patrimonio_id": transfer.patrimony_id,
            "observacoes": body.notes,
            "efetivacao_imediata": body.effectuate.unwrap_or(false),
        })),
    )
    .await;

    if body.effectuate.unwrap_or(false) {
        let effectuated = do_effectuate(pool.get_ref(), transfer_id, &user).await?;
        return Ok(HttpResponse::Ok().json(effectuated));
    }

    let approved = fetch_transfer(pool.get_ref(), transfer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Transferência não encontrada"))?;

    Ok(HttpResponse::Ok().json(approved))
}

/// Rejeita uma transferência pendente. O patrimônio nunca é alterado e uma
/// transferência rejeitada não pode mais ser aprovada nem efetivada.
pub async fn reject_transfer(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    body: web::Json<RejectTransfer>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;
    let transfer_id = id.into_inner();

    if body.rejection_reason.trim().is_empty() {
        return Err(ApiError::validation("Motivo de rejeição é obrigatório"));
    }

    let mut tx = pool.begin().await?;

    let transfer = fetch_transfer(&mut *tx, transfer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Transferência não encontrada"))?;

    if transfer.is_decided() {
        return Err(ApiError::conflict("Transferência já foi decidida"));
    }

    authorize(&user, &WorkflowAction::DecideTransfer { transfer: &transfer })?;

    let result = sqlx::query(
        "UPDATE transfers SET rejection_reason = $1, approval_date = NOW(), updated_at = NOW() \
         WHERE id = $2 AND approved_by IS NULL AND rejection_reason IS NULL",
    )
    .bind(&body.rejection_reason)
    .bind(transfer_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Transferência já foi decidida"));
    }

    tx.commit().await?;

    info!(%transfer_id, "transferência rejeitada");

    record_log(
        pool.get_ref(),
        "Rejeição de Transferência",
        "transfers",
        Some(transfer_id),
        Some(user.id),
        detail_value(&json!({
            "patrimonio_id": transfer.patrimony_id,
            "motivo_rejeicao": body.rejection_reason,
        })),
    )
    .await;

    let rejected = fetch_transfer(pool.get_ref(), transfer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Transferência não encontrada"))?;

    Ok(HttpResponse::Ok().json(rejected))
}

/// Efetiva uma transferência aprovada, copiando a custódia de destino para
/// o patrimônio. Não é idempotente: repetir a chamada retorna Conflict.
pub async fn effectuate_transfer(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;
    let transfer = do_effectuate(pool.get_ref(), id.into_inner(), &user).await?;
    Ok(HttpResponse::Ok().json(transfer))
}

async fn do_effectuate(
    pool: &PgPool,
    transfer_id: Uuid,
    user: &User,
) -> Result<Transfer, ApiError> {
    let mut tx = pool.begin().await?;

    let transfer = fetch_transfer(&mut *tx, transfer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Transferência não encontrada"))?;

    let patrimony = fetch_patrimony(&mut *tx, transfer.patrimony_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Patrimônio não encontrado"))?;

    match transfer.status() {
        TransferStatus::Rejected => {
            return Err(ApiError::conflict("Transferência foi rejeitada"));
        }
        TransferStatus::Pending => {
            return Err(ApiError::conflict("Transferência ainda não foi aprovada"));
        }
        TransferStatus::Effectuated => {
            return Err(ApiError::conflict("Transferência já foi efetivada"));
        }
        TransferStatus::Approved => {}
    }

    authorize(user, &WorkflowAction::EffectuateTransfer)?;

    let result = sqlx::query(
        "UPDATE transfers SET effectuated = TRUE, effectuation_date = NOW(), updated_at = NOW() \
         WHERE id = $1 AND approved_by IS NOT NULL AND rejection_reason IS NULL \
           AND effectuated = FALSE",
    )
    .bind(transfer_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Transferência já foi efetivada"));
    }

    // Só campos de destino informados alteram a custódia
    sqlx::query(
        "UPDATE patrimonies SET sector_id = COALESCE($1, sector_id), \
         responsible_id = COALESCE($2, responsible_id), updated_at = NOW() WHERE id = $3",
    )
    .bind(transfer.destination_sector_id)
    .bind(transfer.destination_responsible_id)
    .bind(patrimony.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(%transfer_id, patrimony_id = %patrimony.id, "transferência efetivada");

    record_log(
        pool,
        "Efetivação de Transferência",
        "patrimonies",
        Some(patrimony.id),
        Some(user.id),
        detail_value(&json!({
            "transferencia_id": transfer_id,
            "setor_destino": transfer.destination_sector_id,
            "responsavel_destino": transfer.destination_responsible_id,
        })),
    )
    .await;

    fetch_transfer(pool, transfer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Transferência não encontrada"))
}

pub async fn get_transfers(
    pool: web::Data<PgPool>,
    query: web::Query<TransferQuery>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;

    let status_clause = match query.status {
        Some(TransferStatus::Pending) => {
            " AND approved_by IS NULL AND rejection_reason IS NULL"
        }
        Some(TransferStatus::Approved) => {
            " AND approved_by IS NOT NULL AND effectuated = FALSE"
        }
        Some(TransferStatus::Rejected) => " AND rejection_reason IS NOT NULL",
        Some(TransferStatus::Effectuated) => " AND effectuated = TRUE",
        None => "",
    };

    let transfers = sqlx::query(&format!(
        "SELECT {TRANSFER_COLUMNS} FROM transfers \
         WHERE ($1::uuid IS NULL OR patrimony_id = $1){status_clause} \
         ORDER BY created_at DESC"
    ))
    .bind(query.patrimony_id)
    .map(|row: PgRow| map_transfer(&row))
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(transfers))
}

pub async fn get_transfer(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;

    let transfer = fetch_transfer(pool.get_ref(), id.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Transferência não encontrada"))?;

    Ok(HttpResponse::Ok().json(transfer))
}

/// Exclui uma transferência ainda não efetivada.
pub async fn delete_transfer(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;
    let transfer_id = id.into_inner();

    let mut tx = pool.begin().await?;

    let transfer = fetch_transfer(&mut *tx, transfer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Transferência não encontrada"))?;

    if transfer.effectuated {
        return Err(ApiError::conflict(
            "Transferência efetivada não pode ser excluída",
        ));
    }

    sqlx::query("DELETE FROM transfers WHERE id = $1")
        .bind(transfer_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    record_log(
        pool.get_ref(),
        "Exclusão de Transferência",
        "transfers",
        Some(transfer_id),
        Some(user.id),
        detail_value(&json!({
            "mensagem": format!("Transferência {transfer_id} removida")
        })),
    )
    .await;

    Ok(HttpResponse::NoContent().finish())
}

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

use crate::audit::{detail_value, record_log};
use crate::auth::authenticate;
use crate::errors::ApiError;
use crate::models::{
    AddItem, BulkAddItems, BulkAddResult, CreateSession, FinalizeSession, InventoryItem,
    InventorySession, InventoryStats, ItemSituation, ReviewItem, ScopeType, SessionQuery,
    SessionStatus, SessionWithItems, UpdateSession,
};

const SESSION_COLUMNS: &str = "id, title, description, scope_type, sector_id, category_id, \
     responsible_id, status, start_date, end_date, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, session_id, patrimony_id, situation, notes, reviewed_by, \
     review_date, created_at, updated_at";

fn map_session(row: &PgRow) -> InventorySession {
    let scope_type: String = row.get("scope_type");
    let status: String = row.get("status");
    InventorySession {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        scope_type: ScopeType::parse(&scope_type).unwrap_or(ScopeType::General),
        sector_id: row.get("sector_id"),
        category_id: row.get("category_id"),
        responsible_id: row.get("responsible_id"),
        status: SessionStatus::parse(&status).unwrap_or(SessionStatus::InProgress),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn map_item(row: &PgRow) -> InventoryItem {
    let situation: String = row.get("situation");
    InventoryItem {
        id: row.get("id"),
        session_id: row.get("session_id"),
        patrimony_id: row.get("patrimony_id"),
        situation: ItemSituation::parse(&situation).unwrap_or(ItemSituation::Pending),
        notes: row.get("notes"),
        reviewed_by: row.get("reviewed_by"),
        review_date: row.get("review_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

async fn fetch_session<'e, E>(
    executor: E,
    id: Uuid,
) -> Result<Option<InventorySession>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(&format!(
        "SELECT {SESSION_COLUMNS} FROM inventory_sessions WHERE id = $1"
    ))
    .bind(id)
    .map(|row: PgRow| map_session(&row))
    .fetch_optional(executor)
    .await
}

async fn fetch_items<'e, E>(executor: E, session_id: Uuid) -> Result<Vec<InventoryItem>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(&format!(
        "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE session_id = $1 ORDER BY created_at"
    ))
    .bind(session_id)
    .map(|row: PgRow| map_item(&row))
    .fetch_all(executor)
    .await
}

// Separa os ids realmente novos dos já presentes, preservando a ordem do
// pedido e colapsando repetições dentro dele.
fn partition_new_ids(requested: &[Uuid], existing: &HashSet<Uuid>) -> (Vec<Uuid>, usize) {
    let mut seen = existing.clone();
    let mut new_ids = Vec::new();
    let mut already_present = 0;
    for id in requested {
        if seen.insert(*id) {
            new_ids.push(*id);
        } else {
            already_present += 1;
        }
    }
    (new_ids, already_present)
}

fn ensure_in_progress(session: &InventorySession) -> Result<(), ApiError> {
    if session.status != SessionStatus::InProgress {
        return Err(ApiError::conflict("Sessão de inventário não está em andamento"));
    }
    Ok(())
}

/// Cria uma sessão de inventário e materializa, na mesma transação, um item
/// pendente por patrimônio dentro da abrangência. O recorte é fixado na
/// criação: patrimônios adicionados ao setor/categoria depois não entram.
pub async fn create_session(
    pool: web::Data<PgPool>,
    session: web::Json<CreateSession>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;

    if session.title.trim().is_empty() {
        return Err(ApiError::validation("Título é obrigatório"));
    }

    let mut tx = pool.begin().await?;

    // Valida o filtro de abrangência conforme o tipo
    let (sector_id, category_id) = match session.scope_type {
        ScopeType::General => (None, None),
        ScopeType::BySector => {
            let sector_id = session
                .sector_id
                .ok_or_else(|| ApiError::validation("sector_id é obrigatório para by_sector"))?;
            let exists: (bool,) =
                sqlx::query_as("SELECT EXISTS(SELECT 1 FROM sectors WHERE id = $1)")
                    .bind(sector_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if !exists.0 {
                return Err(ApiError::not_found("Setor não encontrado"));
            }
            (Some(sector_id), None)
        }
        ScopeType::ByCategory => {
            let category_id = session
                .category_id
                .ok_or_else(|| ApiError::validation("category_id é obrigatório para by_category"))?;
            let exists: (bool,) =
                sqlx::query_as("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
                    .bind(category_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if !exists.0 {
                return Err(ApiError::not_found("Categoria não encontrada"));
            }
            (None, Some(category_id))
        }
    };

    let responsible_id = session.responsible_id.unwrap_or(user.id);

    let session_id = sqlx::query(
        "INSERT INTO inventory_sessions (id, title, description, scope_type, sector_id, \
         category_id, responsible_id) \
         VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind(&session.title)
    .bind(&session.description)
    .bind(session.scope_type.as_str())
    .bind(sector_id)
    .bind(category_id)
    .bind(responsible_id)
    .map(|row: PgRow| row.get::<Uuid, _>("id"))
    .fetch_one(&mut *tx)
    .await?;

    let snapshot = sqlx::query(
        "INSERT INTO inventory_items (id, session_id, patrimony_id, situation) \
         SELECT gen_random_uuid(), $1, p.id, 'pending' FROM patrimonies p \
         WHERE ($2::uuid IS NULL OR p.sector_id = $2) \
           AND ($3::uuid IS NULL OR p.category_id = $3)",
    )
    .bind(session_id)
    .bind(sector_id)
    .bind(category_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let item_count = snapshot.rows_affected();
    info!(%session_id, item_count, "sessão de inventário criada");

    record_log(
        pool.get_ref(),
        "Criação de Inventário",
        "inventory_sessions",
        Some(session_id),
        Some(user.id),
        detail_value(&json!({
            "titulo": session.title,
            "abrangencia": session.scope_type,
            "setor_id": sector_id,
            "categoria_id": category_id,
            "itens_gerados": item_count,
        })),
    )
    .await;

    let created = fetch_session(pool.get_ref(), session_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Inventário não encontrado"))?;
    let items = fetch_items(pool.get_ref(), session_id).await?;

    Ok(HttpResponse::Created().json(SessionWithItems {
        session: created,
        items,
    }))
}

pub async fn get_sessions(
    pool: web::Data<PgPool>,
    query: web::Query<SessionQuery>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;

    let sessions = sqlx::query(&format!(
        "SELECT {SESSION_COLUMNS} FROM inventory_sessions \
         WHERE ($1::varchar IS NULL OR status = $1) \
           AND ($2::varchar IS NULL OR scope_type = $2) \
         ORDER BY created_at DESC"
    ))
    .bind(query.status.map(|s| s.as_str()))
    .bind(query.scope_type.map(|s| s.as_str()))
    .map(|row: PgRow| map_session(&row))
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(sessions))
}

pub async fn get_session(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;
    let session_id = id.into_inner();

    let session = fetch_session(pool.get_ref(), session_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Inventário não encontrado"))?;
    let items = fetch_items(pool.get_ref(), session_id).await?;

    Ok(HttpResponse::Ok().json(SessionWithItems { session, items }))
}

/// Atualiza metadados da sessão. Sessões concluídas ou canceladas são
/// imutáveis.
pub async fn update_session(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    body: web::Json<UpdateSession>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;
    let session_id = id.into_inner();

    let mut tx = pool.begin().await?;

    let session = fetch_session(&mut *tx, session_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Inventário não encontrado"))?;

    if session.status != SessionStatus::InProgress {
        return Err(ApiError::validation(
            "Sessão concluída ou cancelada não pode ser alterada",
        ));
    }

    let title = body.title.clone().unwrap_or(session.title);
    let description = body.description.clone().or(session.description);
    let responsible_id = body.responsible_id.unwrap_or(session.responsible_id);

    sqlx::query(
        "UPDATE inventory_sessions SET title = $1, description = $2, responsible_id = $3, \
         updated_at = NOW() WHERE id = $4",
    )
    .bind(&title)
    .bind(&description)
    .bind(responsible_id)
    .bind(session_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    record_log(
        pool.get_ref(),
        "Atualização de Inventário",
        "inventory_sessions",
        Some(session_id),
        Some(user.id),
        detail_value(&json!({ "titulo": title })),
    )
    .await;

    let updated = fetch_session(pool.get_ref(), session_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Inventário não encontrado"))?;

    Ok(HttpResponse::Ok().json(updated))
}

/// Exclui a sessão e, por composição, todos os seus itens.
pub async fn delete_session(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;
    let session_id = id.into_inner();

    let result = sqlx::query("DELETE FROM inventory_sessions WHERE id = $1")
        .bind(session_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Inventário não encontrado"));
    }

    record_log(
        pool.get_ref(),
        "Exclusão de Inventário",
        "inventory_sessions",
        Some(session_id),
        Some(user.id),
        detail_value(&json!({
            "mensagem": format!("Inventário {session_id} excluído")
        })),
    )
    .await;

    Ok(HttpResponse::NoContent().finish())
}

/// Acrescenta um patrimônio à sessão em andamento.
pub async fn add_item(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    body: web::Json<AddItem>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;
    let session_id = id.into_inner();

    let mut tx = pool.begin().await?;

    let session = fetch_session(&mut *tx, session_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Inventário não encontrado"))?;
    ensure_in_progress(&session)?;

    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM patrimonies WHERE id = $1)")
        .bind(body.patrimony_id)
        .fetch_one(&mut *tx)
        .await?;
    if !exists.0 {
        return Err(ApiError::not_found("Patrimônio não encontrado"));
    }

    let duplicate: (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM inventory_items WHERE session_id = $1 AND patrimony_id = $2)",
    )
    .bind(session_id)
    .bind(body.patrimony_id)
    .fetch_one(&mut *tx)
    .await?;
    if duplicate.0 {
        return Err(ApiError::conflict("Patrimônio já está neste inventário"));
    }

    let situation = body.situation.unwrap_or(ItemSituation::Pending);

    let item = sqlx::query(&format!(
        "INSERT INTO inventory_items (id, session_id, patrimony_id, situation, notes) \
         VALUES (gen_random_uuid(), $1, $2, $3, $4) RETURNING {ITEM_COLUMNS}"
    ))
    .bind(session_id)
    .bind(body.patrimony_id)
    .bind(situation.as_str())
    .bind(&body.notes)
    .map(|row: PgRow| map_item(&row))
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    record_log(
        pool.get_ref(),
        "Registro de Inventário",
        "inventory_items",
        Some(item.id),
        Some(user.id),
        detail_value(&json!({
            "inventario_id": session_id,
            "patrimonio_id": body.patrimony_id,
            "situacao": situation,
        })),
    )
    .await;

    Ok(HttpResponse::Created().json(item))
}

/// Acrescenta vários patrimônios de uma vez. Ids já presentes na sessão são
/// ignorados sem erro; apenas os itens realmente criados são retornados.
pub async fn bulk_add_items(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    body: web::Json<BulkAddItems>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;
    let session_id = id.into_inner();

    if body.patrimony_ids.is_empty() {
        return Err(ApiError::validation("Lista de patrimônios vazia"));
    }

    let mut tx = pool.begin().await?;

    let session = fetch_session(&mut *tx, session_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Inventário não encontrado"))?;
    ensure_in_progress(&session)?;

    // Todos os ids referenciados precisam existir
    let known: Vec<Uuid> = sqlx::query("SELECT id FROM patrimonies WHERE id = ANY($1)")
        .bind(&body.patrimony_ids)
        .map(|row: PgRow| row.get::<Uuid, _>("id"))
        .fetch_all(&mut *tx)
        .await?;
    let known: HashSet<Uuid> = known.into_iter().collect();
    let missing: Vec<String> = body
        .patrimony_ids
        .iter()
        .filter(|id| !known.contains(id))
        .map(|id| id.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::not_found(format!(
            "Patrimônios não encontrados: {}",
            missing.join(", ")
        )));
    }

    let existing: Vec<Uuid> =
        sqlx::query("SELECT patrimony_id FROM inventory_items WHERE session_id = $1")
            .bind(session_id)
            .map(|row: PgRow| row.get::<Uuid, _>("patrimony_id"))
            .fetch_all(&mut *tx)
            .await?;
    let existing: HashSet<Uuid> = existing.into_iter().collect();

    let (new_ids, already_present) = partition_new_ids(&body.patrimony_ids, &existing);

    let mut created = Vec::with_capacity(new_ids.len());
    for patrimony_id in &new_ids {
        let item = sqlx::query(&format!(
            "INSERT INTO inventory_items (id, session_id, patrimony_id, situation) \
             VALUES (gen_random_uuid(), $1, $2, 'pending') RETURNING {ITEM_COLUMNS}"
        ))
        .bind(session_id)
        .bind(patrimony_id)
        .map(|row: PgRow| map_item(&row))
        .fetch_one(&mut *tx)
        .await?;
        created.push(item);
    }

    tx.commit().await?;

    info!(
        %session_id,
        requested = body.patrimony_ids.len(),
        created = created.len(),
        already_present,
        "itens adicionados em lote"
    );

    record_log(
        pool.get_ref(),
        "Adição de Itens ao Inventário",
        "inventory_sessions",
        Some(session_id),
        Some(user.id),
        detail_value(&json!({
            "solicitados": body.patrimony_ids.len(),
            "criados": created.len(),
            "ja_presentes": already_present,
        })),
    )
    .await;

    Ok(HttpResponse::Created().json(BulkAddResult {
        requested: body.patrimony_ids.len(),
        already_present,
        created,
    }))
}

/// Registra a conferência de um item. Revisor e data de revisão são sempre
/// carimbados, mesmo quando a situação informada é igual à atual.
pub async fn review_item(
    pool: web::Data<PgPool>,
    path: web::Path<(Uuid, Uuid)>,
    body: web::Json<ReviewItem>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;
    let (session_id, item_id) = path.into_inner();

    let mut tx = pool.begin().await?;

    let session = fetch_session(&mut *tx, session_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Inventário não encontrado"))?;
    ensure_in_progress(&session)?;

    let item = sqlx::query(&format!(
        "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1 AND session_id = $2"
    ))
    .bind(item_id)
    .bind(session_id)
    .map(|row: PgRow| map_item(&row))
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Item de inventário não encontrado"))?;

    let situation = body.situation.unwrap_or(item.situation);
    let notes = body.notes.clone().or(item.notes);

    let reviewed = sqlx::query(&format!(
        "UPDATE inventory_items SET situation = $1, notes = $2, reviewed_by = $3, \
         review_date = NOW(), updated_at = NOW() WHERE id = $4 RETURNING {ITEM_COLUMNS}"
    ))
    .bind(situation.as_str())
    .bind(&notes)
    .bind(user.id)
    .bind(item_id)
    .map(|row: PgRow| map_item(&row))
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    record_log(
        pool.get_ref(),
        "Conferência de Item de Inventário",
        "inventory_items",
        Some(item_id),
        Some(user.id),
        detail_value(&json!({
            "inventario_id": session_id,
            "patrimonio_id": reviewed.patrimony_id,
            "situacao": reviewed.situation,
        })),
    )
    .await;

    Ok(HttpResponse::Ok().json(reviewed))
}

pub async fn remove_item(
    pool: web::Data<PgPool>,
    path: web::Path<(Uuid, Uuid)>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;
    let (session_id, item_id) = path.into_inner();

    let mut tx = pool.begin().await?;

    let session = fetch_session(&mut *tx, session_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Inventário não encontrado"))?;
    ensure_in_progress(&session)?;

    let result = sqlx::query("DELETE FROM inventory_items WHERE id = $1 AND session_id = $2")
        .bind(item_id)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Item de inventário não encontrado"));
    }

    tx.commit().await?;

    record_log(
        pool.get_ref(),
        "Remoção de Item de Inventário",
        "inventory_items",
        Some(item_id),
        Some(user.id),
        detail_value(&json!({ "inventario_id": session_id })),
    )
    .await;

    Ok(HttpResponse::NoContent().finish())
}

/// Conclui a sessão. Transição terminal; as notas de fechamento ficam só no
/// log de auditoria.
pub async fn finalize_session(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    body: web::Json<FinalizeSession>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;
    let session_id = id.into_inner();

    let session = close_session(pool.get_ref(), session_id, SessionStatus::Completed).await?;

    record_log(
        pool.get_ref(),
        "Finalização de Inventário",
        "inventory_sessions",
        Some(session_id),
        Some(user.id),
        detail_value(&json!({
            "titulo": session.title,
            "observacoes": body.notes,
        })),
    )
    .await;

    Ok(HttpResponse::Ok().json(session))
}

/// Cancela a sessão. Transição terminal.
pub async fn cancel_session(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;
    let session_id = id.into_inner();

    let session = close_session(pool.get_ref(), session_id, SessionStatus::Cancelled).await?;

    record_log(
        pool.get_ref(),
        "Cancelamento de Inventário",
        "inventory_sessions",
        Some(session_id),
        Some(user.id),
        detail_value(&json!({ "titulo": session.title })),
    )
    .await;

    Ok(HttpResponse::Ok().json(session))
}

async fn close_session(
    pool: &PgPool,
    session_id: Uuid,
    target: SessionStatus,
) -> Result<InventorySession, ApiError> {
    let mut tx = pool.begin().await?;

    fetch_session(&mut *tx, session_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Inventário não encontrado"))?;

    // Guarda de corrida: só fecha quem ainda está em andamento
    let result = sqlx::query(
        "UPDATE inventory_sessions SET status = $1, end_date = NOW(), updated_at = NOW() \
         WHERE id = $2 AND status = 'in_progress'",
    )
    .bind(target.as_str())
    .bind(session_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Sessão de inventário não está em andamento"));
    }

    tx.commit().await?;

    info!(%session_id, status = target.as_str(), "sessão de inventário encerrada");

    fetch_session(pool, session_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Inventário não encontrado"))
}

/// Totais por situação de conferência. Situações sem itens reportam 0.
pub async fn session_stats(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;
    let session_id = id.into_inner();

    fetch_session(pool.get_ref(), session_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Inventário não encontrado"))?;

    let rows: Vec<(String, i64)> = sqlx::query(
        "SELECT situation, COUNT(*) AS count FROM inventory_items \
         WHERE session_id = $1 GROUP BY situation",
    )
    .bind(session_id)
    .map(|row: PgRow| (row.get::<String, _>("situation"), row.get::<i64, _>("count")))
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(InventoryStats::from_rows(&rows)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_skips_existing_and_duplicates() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let existing: HashSet<Uuid> = [a].into_iter().collect();

        let (new_ids, already_present) = partition_new_ids(&[a, b, b, c], &existing);
        assert_eq!(new_ids, vec![b, c]);
        assert_eq!(already_present, 2);
    }

    #[test]
    fn partition_with_nothing_new() {
        let a = Uuid::new_v4();
        let existing: HashSet<Uuid> = [a].into_iter().collect();
        let (new_ids, already_present) = partition_new_ids(&[a, a], &existing);
        assert!(new_ids.is_empty());
        assert_eq!(already_present, 2);
    }
}

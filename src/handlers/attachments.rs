use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::TryStreamExt;
use serde::Deserialize;
use serde_json::json;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

use crate::audit::{detail_value, record_log};
use crate::auth::authenticate;
use crate::config::AppConfig;
use crate::errors::ApiError;
use crate::models::{Attachment, AttachmentQuery};

const ATTACHMENT_COLUMNS: &str = "id, patrimony_id, write_off_id, file_path, original_name, \
     description, uploaded_by, created_at";

const ALLOWED_EXTENSIONS: [&str; 8] = ["pdf", "jpg", "jpeg", "png", "doc", "docx", "xls", "xlsx"];

const MAX_FILE_SIZE: usize = 10 * 1024 * 1024; // 10MB

fn map_attachment(row: &PgRow) -> Attachment {
    Attachment {
        id: row.get("id"),
        patrimony_id: row.get("patrimony_id"),
        write_off_id: row.get("write_off_id"),
        file_path: row.get("file_path"),
        original_name: row.get("original_name"),
        description: row.get("description"),
        uploaded_by: row.get("uploaded_by"),
        created_at: row.get("created_at"),
    }
}

// Extensão minúscula do arquivo, se estiver na lista permitida.
fn allowed_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())?
        .to_lowercase();
    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Some(ext)
    } else {
        None
    }
}

#[derive(Deserialize)]
pub struct AttachmentUpload {
    pub patrimony_id: Option<Uuid>,
    pub write_off_id: Option<Uuid>,
    pub description: Option<String>,
}

/// Upload de anexo vinculado a um patrimônio OU a uma baixa (nunca ambos).
pub async fn upload_attachment(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    query: web::Query<AttachmentUpload>,
    mut payload: Multipart,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;

    match (query.patrimony_id, query.write_off_id) {
        (Some(_), Some(_)) => {
            return Err(ApiError::validation(
                "Anexo não pode ser vinculado a patrimônio e baixa ao mesmo tempo",
            ));
        }
        (None, None) => {
            return Err(ApiError::validation(
                "Informe patrimony_id ou write_off_id para vincular o anexo",
            ));
        }
        _ => {}
    }

    if let Some(patrimony_id) = query.patrimony_id {
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM patrimonies WHERE id = $1)")
                .bind(patrimony_id)
                .fetch_one(pool.get_ref())
                .await?;
        if !exists.0 {
            return Err(ApiError::not_found("Patrimônio não encontrado"));
        }
    }
    if let Some(write_off_id) = query.write_off_id {
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM write_offs WHERE id = $1)")
                .bind(write_off_id)
                .fetch_one(pool.get_ref())
                .await?;
        if !exists.0 {
            return Err(ApiError::not_found("Baixa não encontrada"));
        }
    }

    let upload_dir = format!("{}/anexos", config.upload_dir);
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .map_err(|e| ApiError::validation(format!("Erro ao criar diretório de anexos: {e}")))?;

    while let Ok(Some(mut field)) = payload.try_next().await {
        let filename = field
            .content_disposition()
            .get_filename()
            .unwrap_or("documento.pdf")
            .to_string();

        let extension = allowed_extension(&filename).ok_or_else(|| {
            ApiError::validation(format!(
                "Tipo de arquivo não permitido. Extensões válidas: {}",
                ALLOWED_EXTENSIONS.join(", ")
            ))
        })?;

        let new_filename = format!("{}.{}", Uuid::new_v4(), extension);
        let filepath = format!("{upload_dir}/{new_filename}");

        let mut file = File::create(&filepath)
            .await
            .map_err(|e| ApiError::validation(format!("Erro ao salvar anexo: {e}")))?;

        let mut total_bytes = 0usize;
        while let Ok(Some(chunk)) = field.try_next().await {
            total_bytes += chunk.len();
            if total_bytes > MAX_FILE_SIZE {
                drop(file);
                let _ = tokio::fs::remove_file(&filepath).await;
                return Err(ApiError::validation("Arquivo muito grande. Máximo: 10MB"));
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| ApiError::validation(format!("Erro ao salvar anexo: {e}")))?;
        }

        let file_path = format!("/uploads/anexos/{new_filename}");

        let attachment = sqlx::query(&format!(
            "INSERT INTO attachments (id, patrimony_id, write_off_id, file_path, \
             original_name, description, uploaded_by) \
             VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6) RETURNING {ATTACHMENT_COLUMNS}"
        ))
        .bind(query.patrimony_id)
        .bind(query.write_off_id)
        .bind(&file_path)
        .bind(&filename)
        .bind(&query.description)
        .bind(user.id)
        .map(|row: PgRow| map_attachment(&row))
        .fetch_one(pool.get_ref())
        .await?;

        record_log(
            pool.get_ref(),
            "Envio de Anexo",
            "attachments",
            Some(attachment.id),
            Some(user.id),
            detail_value(&json!({
                "patrimonio_id": query.patrimony_id,
                "baixa_id": query.write_off_id,
                "arquivo": filename,
                "tamanho": total_bytes,
            })),
        )
        .await;

        return Ok(HttpResponse::Created().json(attachment));
    }

    Err(ApiError::validation("Nenhum arquivo fornecido"))
}

pub async fn get_attachments(
    pool: web::Data<PgPool>,
    query: web::Query<AttachmentQuery>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;

    let attachments = sqlx::query(&format!(
        "SELECT {ATTACHMENT_COLUMNS} FROM attachments \
         WHERE ($1::uuid IS NULL OR patrimony_id = $1) \
           AND ($2::uuid IS NULL OR write_off_id = $2) \
         ORDER BY created_at DESC"
    ))
    .bind(query.patrimony_id)
    .bind(query.write_off_id)
    .map(|row: PgRow| map_attachment(&row))
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(attachments))
}

pub async fn delete_attachment(
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;
    let attachment_id = id.into_inner();

    let attachment = sqlx::query(&format!(
        "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE id = $1"
    ))
    .bind(attachment_id)
    .map(|row: PgRow| map_attachment(&row))
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("Anexo não encontrado"))?;

    sqlx::query("DELETE FROM attachments WHERE id = $1")
        .bind(attachment_id)
        .execute(pool.get_ref())
        .await?;

    // Remoção do arquivo é melhor-esforço; a linha já saiu do banco
    let disk_path = attachment
        .file_path
        .replace("/uploads", &config.upload_dir);
    if let Err(e) = tokio::fs::remove_file(&disk_path).await {
        warn!("falha ao remover arquivo de anexo {disk_path}: {e}");
    }

    record_log(
        pool.get_ref(),
        "Exclusão de Anexo",
        "attachments",
        Some(attachment_id),
        Some(user.id),
        detail_value(&json!({ "arquivo": attachment.original_name })),
    )
    .await;

    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_allowlist() {
        assert_eq!(allowed_extension("nota.pdf"), Some("pdf".to_string()));
        assert_eq!(allowed_extension("FOTO.JPG"), Some("jpg".to_string()));
        assert_eq!(allowed_extension("planilha.xlsx"), Some("xlsx".to_string()));
        assert_eq!(allowed_extension("script.sh"), None);
        assert_eq!(allowed_extension("sem_extensao"), None);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Registro imutável de uma ação. A tabela é apenas-acréscimo: nenhum
/// caminho de código atualiza ou remove linhas dela.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AuditLog {
    pub id: Uuid,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct AuditLogQuery {
    pub entity: Option<String>,
    pub entity_id: Option<Uuid>,
    pub limit: Option<i64>,
}

/// Anexo de arquivo vinculado a um patrimônio ou a uma baixa.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Attachment {
    pub id: Uuid,
    pub patrimony_id: Option<Uuid>,
    pub write_off_id: Option<Uuid>,
    pub file_path: String,
    pub original_name: String,
    pub description: Option<String>,
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct AttachmentQuery {
    pub patrimony_id: Option<Uuid>,
    pub write_off_id: Option<Uuid>,
}

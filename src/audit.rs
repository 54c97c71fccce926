use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

/// Registra uma ação no log de auditoria.
///
/// A escrita é deliberadamente desacoplada da transação principal do
/// chamador: roda depois do commit, em operação própria, e uma falha aqui
/// é registrada no log operacional e suprimida. O rastro de auditoria pode
/// ter lacunas sob falha, mas nunca bloqueia a operação de negócio.
pub async fn record_log(
    pool: &PgPool,
    action: &str,
    entity: &str,
    entity_id: Option<Uuid>,
    user_id: Option<Uuid>,
    details: Option<serde_json::Value>,
) {
    let result = sqlx::query(
        "INSERT INTO audit_logs (id, action, entity, entity_id, user_id, details) \
         VALUES (gen_random_uuid(), $1, $2, $3, $4, $5)",
    )
    .bind(action)
    .bind(entity)
    .bind(entity_id)
    .bind(user_id)
    .bind(details)
    .execute(pool)
    .await;

    if let Err(e) = result {
        tracing::warn!(action, entity, "falha ao gravar log de auditoria: {e}");
    }
}

/// Serializa um payload de detalhes para JSON.
///
/// Mapas e sequências são percorridos recursivamente pelo serde; datas
/// (chrono) viram strings ISO-8601; valores monetários já chegam como f64
/// na borda de mapeamento de linhas. Um payload não serializável é
/// descartado com aviso em vez de derrubar o registro.
pub fn detail_value<T: Serialize>(value: &T) -> Option<serde_json::Value> {
    match serde_json::to_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("detalhes de auditoria não serializáveis: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn datetimes_become_iso_8601_strings() {
        let moment = Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 0).unwrap();
        let value = detail_value(&json!({ "data_aprovacao": moment })).unwrap();
        let rendered = value["data_aprovacao"].as_str().unwrap();
        assert!(rendered.starts_with("2024-03-15T12:30:00"));
    }

    #[test]
    fn nested_maps_and_sequences_recurse() {
        let value = detail_value(&json!({
            "alteracoes": { "setor_destino_id": null, "motivo": "remanejamento" },
            "itens": [1, 2, 3],
        }))
        .unwrap();
        assert_eq!(value["alteracoes"]["motivo"], "remanejamento");
        assert_eq!(value["itens"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn scalars_pass_through_unchanged() {
        let value = detail_value(&json!({ "valor": 1250.5, "quantidade": 4 })).unwrap();
        assert_eq!(value["valor"].as_f64(), Some(1250.5));
        assert_eq!(value["quantidade"].as_i64(), Some(4));
    }
}

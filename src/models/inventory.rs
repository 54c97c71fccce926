use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Abrangência de uma sessão de inventário. `BySector` e `ByCategory`
/// exigem o filtro correspondente na criação.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeType {
    General,
    BySector,
    ByCategory,
}

impl ScopeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeType::General => "general",
            ScopeType::BySector => "by_sector",
            ScopeType::ByCategory => "by_category",
        }
    }

    pub fn parse(s: &str) -> Option<ScopeType> {
        match s {
            "general" => Some(ScopeType::General),
            "by_sector" => Some(ScopeType::BySector),
            "by_category" => Some(ScopeType::ByCategory),
            _ => None,
        }
    }
}

/// Status da sessão. `Completed` e `Cancelled` são terminais.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<SessionStatus> {
        match s {
            "in_progress" => Some(SessionStatus::InProgress),
            "completed" => Some(SessionStatus::Completed),
            "cancelled" => Some(SessionStatus::Cancelled),
            _ => None,
        }
    }
}

/// Situação de conferência de um item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemSituation {
    Pending,
    Found,
    NotFound,
    Discrepancy,
    Reviewed,
}

impl ItemSituation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemSituation::Pending => "pending",
            ItemSituation::Found => "found",
            ItemSituation::NotFound => "not_found",
            ItemSituation::Discrepancy => "discrepancy",
            ItemSituation::Reviewed => "reviewed",
        }
    }

    pub fn parse(s: &str) -> Option<ItemSituation> {
        match s {
            "pending" => Some(ItemSituation::Pending),
            "found" => Some(ItemSituation::Found),
            "not_found" => Some(ItemSituation::NotFound),
            "discrepancy" => Some(ItemSituation::Discrepancy),
            "reviewed" => Some(ItemSituation::Reviewed),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct InventorySession {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub scope_type: ScopeType,
    pub sector_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub responsible_id: Uuid,
    pub status: SessionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct InventoryItem {
    pub id: Uuid,
    pub session_id: Uuid,
    pub patrimony_id: Uuid,
    pub situation: ItemSituation,
    pub notes: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub review_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sessão com seus itens, como retornada pelo GET de detalhe.
#[derive(Serialize, Debug)]
pub struct SessionWithItems {
    #[serde(flatten)]
    pub session: InventorySession,
    pub items: Vec<InventoryItem>,
}

#[derive(Deserialize, Debug)]
pub struct CreateSession {
    pub title: String,
    pub description: Option<String>,
    pub scope_type: ScopeType,
    pub sector_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub responsible_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct UpdateSession {
    pub title: Option<String>,
    pub description: Option<String>,
    pub responsible_id: Option<Uuid>,
}

#[derive(Deserialize, Debug)]
pub struct AddItem {
    pub patrimony_id: Uuid,
    pub situation: Option<ItemSituation>,
    pub notes: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct BulkAddItems {
    pub patrimony_ids: Vec<Uuid>,
}

#[derive(Serialize, Debug)]
pub struct BulkAddResult {
    pub created: Vec<InventoryItem>,
    pub requested: usize,
    pub already_present: usize,
}

#[derive(Deserialize, Debug)]
pub struct ReviewItem {
    pub situation: Option<ItemSituation>,
    pub notes: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct FinalizeSession {
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct SessionQuery {
    pub status: Option<SessionStatus>,
    pub scope_type: Option<ScopeType>,
}

/// Totais por situação. Situações sem itens reportam 0, nunca ausência.
#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct InventoryStats {
    pub total_itens: i64,
    pub pendentes: i64,
    pub encontrados: i64,
    pub nao_encontrados: i64,
    pub divergencias: i64,
    pub revisados: i64,
}

impl InventoryStats {
    /// Agrega as linhas de `GROUP BY situation` em contadores fixos.
    pub fn from_rows(rows: &[(String, i64)]) -> InventoryStats {
        let mut stats = InventoryStats {
            total_itens: 0,
            pendentes: 0,
            encontrados: 0,
            nao_encontrados: 0,
            divergencias: 0,
            revisados: 0,
        };
        for (situation, count) in rows {
            stats.total_itens += count;
            match ItemSituation::parse(situation) {
                Some(ItemSituation::Pending) => stats.pendentes += count,
                Some(ItemSituation::Found) => stats.encontrados += count,
                Some(ItemSituation::NotFound) => stats.nao_encontrados += count,
                Some(ItemSituation::Discrepancy) => stats.divergencias += count,
                Some(ItemSituation::Reviewed) => stats.revisados += count,
                None => {}
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip() {
        for scope in [ScopeType::General, ScopeType::BySector, ScopeType::ByCategory] {
            assert_eq!(ScopeType::parse(scope.as_str()), Some(scope));
        }
        for status in [
            SessionStatus::InProgress,
            SessionStatus::Completed,
            SessionStatus::Cancelled,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        for situation in [
            ItemSituation::Pending,
            ItemSituation::Found,
            ItemSituation::NotFound,
            ItemSituation::Discrepancy,
            ItemSituation::Reviewed,
        ] {
            assert_eq!(ItemSituation::parse(situation.as_str()), Some(situation));
        }
    }

    #[test]
    fn stats_of_fresh_session_are_all_pending() {
        let stats = InventoryStats::from_rows(&[("pending".to_string(), 7)]);
        assert_eq!(stats.total_itens, 7);
        assert_eq!(stats.pendentes, 7);
        assert_eq!(stats.encontrados, 0);
        assert_eq!(stats.nao_encontrados, 0);
        assert_eq!(stats.divergencias, 0);
        assert_eq!(stats.revisados, 0);
    }

    #[test]
    fn stats_aggregate_mixed_situations() {
        let rows = vec![
            ("found".to_string(), 3),
            ("not_found".to_string(), 1),
            ("discrepancy".to_string(), 2),
            ("pending".to_string(), 4),
        ];
        let stats = InventoryStats::from_rows(&rows);
        assert_eq!(stats.total_itens, 10);
        assert_eq!(stats.encontrados, 3);
        assert_eq!(stats.nao_encontrados, 1);
        assert_eq!(stats.divergencias, 2);
        assert_eq!(stats.pendentes, 4);
        assert_eq!(stats.revisados, 0);
    }

    #[test]
    fn stats_of_empty_session_report_zeroes() {
        let stats = InventoryStats::from_rows(&[]);
        assert_eq!(stats.total_itens, 0);
        assert_eq!(stats.pendentes, 0);
    }
}

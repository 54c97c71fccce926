use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Estado derivado de uma transferência. Não é persistido: decorre dos
/// campos de decisão e efetivação, na ordem efetivada > rejeitada >
/// aprovada > pendente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Approved,
    Rejected,
    Effectuated,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Approved => "approved",
            TransferStatus::Rejected => "rejected",
            TransferStatus::Effectuated => "effectuated",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Transfer {
    pub id: Uuid,
    pub patrimony_id: Uuid,
    pub origin_sector_id: Option<Uuid>,
    pub destination_sector_id: Option<Uuid>,
    pub origin_responsible_id: Option<Uuid>,
    pub destination_responsible_id: Option<Uuid>,
    pub requested_by: Option<Uuid>,
    pub reason: Option<String>,
    pub approved_by: Option<Uuid>,
    pub approval_date: Option<DateTime<Utc>>,
    pub approval_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub effectuated: bool,
    pub effectuation_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transfer {
    pub fn status(&self) -> TransferStatus {
        if self.effectuated {
            TransferStatus::Effectuated
        } else if self.rejection_reason.is_some() {
            TransferStatus::Rejected
        } else if self.approved_by.is_some() {
            TransferStatus::Approved
        } else {
            TransferStatus::Pending
        }
    }

    /// Uma transferência decidida (aprovada ou rejeitada) não aceita nova
    /// decisão.
    pub fn is_decided(&self) -> bool {
        self.approved_by.is_some() || self.rejection_reason.is_some()
    }
}

#[derive(Deserialize, Debug)]
pub struct CreateTransfer {
    pub patrimony_id: Uuid,
    pub origin_sector_id: Option<Uuid>,
    pub destination_sector_id: Option<Uuid>,
    pub origin_responsible_id: Option<Uuid>,
    pub destination_responsible_id: Option<Uuid>,
    pub reason: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ApproveTransfer {
    pub notes: Option<String>,
    /// Quando verdadeiro, encadeia a efetivação na mesma chamada,
    /// com a identidade do aprovador.
    pub effectuate: Option<bool>,
}

#[derive(Deserialize, Debug)]
pub struct RejectTransfer {
    pub rejection_reason: String,
}

#[derive(Deserialize)]
pub struct TransferQuery {
    pub patrimony_id: Option<Uuid>,
    pub status: Option<TransferStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_transfer() -> Transfer {
        Transfer {
            id: Uuid::new_v4(),
            patrimony_id: Uuid::new_v4(),
            origin_sector_id: Some(Uuid::new_v4()),
            destination_sector_id: Some(Uuid::new_v4()),
            origin_responsible_id: None,
            destination_responsible_id: None,
            requested_by: Some(Uuid::new_v4()),
            reason: Some("remanejamento".to_string()),
            approved_by: None,
            approval_date: None,
            approval_notes: None,
            rejection_reason: None,
            effectuated: false,
            effectuation_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn fresh_transfer_is_pending() {
        let t = base_transfer();
        assert_eq!(t.status(), TransferStatus::Pending);
        assert!(!t.is_decided());
    }

    #[test]
    fn approved_then_effectuated() {
        let mut t = base_transfer();
        t.approved_by = Some(Uuid::new_v4());
        t.approval_date = Some(Utc::now());
        assert_eq!(t.status(), TransferStatus::Approved);
        assert!(t.is_decided());

        t.effectuated = true;
        t.effectuation_date = Some(Utc::now());
        assert_eq!(t.status(), TransferStatus::Effectuated);
    }

    #[test]
    fn rejection_excludes_approval() {
        let mut t = base_transfer();
        t.rejection_reason = Some("sem justificativa".to_string());
        t.approval_date = Some(Utc::now());
        assert_eq!(t.status(), TransferStatus::Rejected);
        assert!(t.is_decided());
        // aprovado_por permanece nulo em uma rejeição
        assert!(t.approved_by.is_none());
    }
}

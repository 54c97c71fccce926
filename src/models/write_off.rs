use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Estado derivado de uma baixa, a partir dos campos de decisão.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOffStatus {
    Pending,
    Approved,
    Rejected,
}

impl WriteOffStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteOffStatus::Pending => "pending",
            WriteOffStatus::Approved => "approved",
            WriteOffStatus::Rejected => "rejected",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WriteOff {
    pub id: Uuid,
    pub patrimony_id: Uuid,
    pub write_off_type: String,
    pub reason: Option<String>,
    pub requested_by: Option<Uuid>,
    pub document_path: Option<String>,
    pub approved_by: Option<Uuid>,
    pub approval_date: Option<DateTime<Utc>>,
    pub approval_notes: Option<String>,
    pub rejected_by: Option<Uuid>,
    pub rejection_date: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WriteOff {
    pub fn status(&self) -> WriteOffStatus {
        if self.rejected_by.is_some() {
            WriteOffStatus::Rejected
        } else if self.approved_by.is_some() {
            WriteOffStatus::Approved
        } else {
            WriteOffStatus::Pending
        }
    }

    pub fn is_decided(&self) -> bool {
        self.approved_by.is_some() || self.rejected_by.is_some()
    }
}

#[derive(Deserialize, Debug)]
pub struct CreateWriteOff {
    pub patrimony_id: Uuid,
    pub write_off_type: String,
    pub reason: Option<String>,
    pub document_path: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ApproveWriteOff {
    pub notes: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct RejectWriteOff {
    pub rejection_reason: String,
}

#[derive(Deserialize)]
pub struct WriteOffQuery {
    pub patrimony_id: Option<Uuid>,
    pub status: Option<WriteOffStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_write_off() -> WriteOff {
        WriteOff {
            id: Uuid::new_v4(),
            patrimony_id: Uuid::new_v4(),
            write_off_type: "obsolescência".to_string(),
            reason: Some("equipamento sem conserto".to_string()),
            requested_by: Some(Uuid::new_v4()),
            document_path: None,
            approved_by: None,
            approval_date: None,
            approval_notes: None,
            rejected_by: None,
            rejection_date: None,
            rejection_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn fresh_write_off_is_pending() {
        assert_eq!(base_write_off().status(), WriteOffStatus::Pending);
    }

    #[test]
    fn approval_and_rejection_are_exclusive() {
        let mut w = base_write_off();
        w.approved_by = Some(Uuid::new_v4());
        assert_eq!(w.status(), WriteOffStatus::Approved);
        assert!(w.is_decided());

        let mut w = base_write_off();
        w.rejected_by = Some(Uuid::new_v4());
        w.rejection_reason = Some("patrimônio recuperável".to_string());
        assert_eq!(w.status(), WriteOffStatus::Rejected);
        assert!(w.approved_by.is_none());
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status de um patrimônio. Persistido como texto; `WrittenOff` é terminal
/// e só é atribuído pela aprovação de uma baixa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Active,
    Inactive,
    Maintenance,
    WrittenOff,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Active => "active",
            AssetStatus::Inactive => "inactive",
            AssetStatus::Maintenance => "maintenance",
            AssetStatus::WrittenOff => "written_off",
        }
    }

    pub fn parse(s: &str) -> Option<AssetStatus> {
        match s {
            "active" => Some(AssetStatus::Active),
            "inactive" => Some(AssetStatus::Inactive),
            "maintenance" => Some(AssetStatus::Maintenance),
            "written_off" => Some(AssetStatus::WrittenOff),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Patrimony {
    pub id: Uuid,
    pub plate: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub sector_id: Option<Uuid>,
    pub responsible_id: Option<Uuid>,
    pub acquisition_date: Option<NaiveDate>,
    pub value: f64,
    pub status: AssetStatus,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
pub struct CreatePatrimony {
    pub plate: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub sector_id: Option<Uuid>,
    pub responsible_id: Option<Uuid>,
    pub acquisition_date: Option<NaiveDate>,
    pub value: f64,
    pub status: Option<AssetStatus>,
}

#[derive(Deserialize)]
pub struct UpdatePatrimony {
    pub plate: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub sector_id: Option<Uuid>,
    pub responsible_id: Option<Uuid>,
    pub acquisition_date: Option<NaiveDate>,
    pub value: Option<f64>,
    pub status: Option<AssetStatus>,
}

#[derive(Deserialize)]
pub struct PatrimonyQuery {
    pub sector_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub status: Option<AssetStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for status in [
            AssetStatus::Active,
            AssetStatus::Inactive,
            AssetStatus::Maintenance,
            AssetStatus::WrittenOff,
        ] {
            assert_eq!(AssetStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AssetStatus::parse("broken"), None);
    }

    #[test]
    fn status_serializes_as_stored_text() {
        assert_eq!(
            serde_json::to_string(&AssetStatus::WrittenOff).unwrap(),
            "\"written_off\""
        );
    }
}

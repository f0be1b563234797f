use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, Set};
use serde::{Deserialize, Serialize};

/// Per-schedule A/B test lifecycle. Created when the test pool is first
/// queued; the winner is recorded once `test_end_at` has passed.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "campaign_ab_state")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub workspace_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub schedule_id: String,
    pub status: String, // "testing" | "winner_selected"
    pub test_end_at: i64, // Unix epoch microseconds
    pub winner_subject: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::campaign_schedules::Entity",
        from = "Column::ScheduleId",
        to = "super::campaign_schedules::Column::Id"
    )]
    CampaignSchedule,
}

impl Related<super::campaign_schedules::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CampaignSchedule.def()
    }
}

impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        let now = chrono::Utc::now().timestamp_micros();
        Self {
            status: Set(AbStatus::Testing.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..ActiveModelTrait::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbStatus {
    Testing,
    WinnerSelected,
}

impl std::fmt::Display for AbStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbStatus::Testing => write!(f, "testing"),
            AbStatus::WinnerSelected => write!(f, "winner_selected"),
        }
    }
}

impl From<String> for AbStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "winner_selected" => AbStatus::WinnerSelected,
            _ => AbStatus::Testing,
        }
    }
}

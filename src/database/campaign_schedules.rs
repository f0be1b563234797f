use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "campaign_schedules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub workspace_id: String,
    pub campaign_id: String,
    pub status: String,
    pub mode: String, // "best_time" | "fixed_time"
    pub window_start: String, // "HH:MM"
    pub window_end: String,   // "HH:MM"
    pub timezone: Option<String>,
    pub next_run_at: i64, // Unix epoch microseconds
    pub ab_enabled: bool,
    pub ab_subject_a: Option<String>,
    pub ab_subject_b: Option<String>,
    pub ab_subject_c: Option<String>,
    pub ab_test_fraction: f64, // clamped to [0.05, 0.30]
    pub ab_wait_minutes: i32,
    pub ab_metric: String, // "opens" | "clicks"
    pub segment_json: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::campaigns::Entity",
        from = "Column::CampaignId",
        to = "super::campaigns::Column::Id"
    )]
    Campaign,
}

impl Related<super::campaigns::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campaign.def()
    }
}

impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        let now = chrono::Utc::now().timestamp_micros();
        Self {
            id: Set(Uuid::now_v7().to_string()),
            status: Set(ScheduleStatus::Active.to_string()),
            mode: Set("fixed_time".to_string()),
            window_start: Set("09:00".to_string()),
            window_end: Set("17:00".to_string()),
            next_run_at: Set(now),
            ab_enabled: Set(false),
            ab_test_fraction: Set(0.2),
            ab_wait_minutes: Set(60),
            ab_metric: Set("opens".to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..ActiveModelTrait::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleStatus {
    Active,
    Completed,
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleStatus::Active => write!(f, "active"),
            ScheduleStatus::Completed => write!(f, "completed"),
        }
    }
}

impl From<String> for ScheduleStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "completed" => ScheduleStatus::Completed,
            _ => ScheduleStatus::Active,
        }
    }
}

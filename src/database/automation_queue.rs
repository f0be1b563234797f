use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Due-time work queue for the automation engine. At-least-once: items
/// are claimed queued -> processing with an attempts increment, and a
/// crash between the claim and `done` re-delivers the step.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "automation_queue")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub workspace_id: String,
    pub run_id: String,
    pub automation_id: String,
    pub contact_id: String,
    pub step_id: String,
    pub execute_at: i64, // Unix epoch microseconds
    pub status: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub payload: Option<String>, // JSON payload for special item types
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::automation_runs::Entity",
        from = "Column::RunId",
        to = "super::automation_runs::Column::Id"
    )]
    AutomationRun,
}

impl Related<super::automation_runs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AutomationRun.def()
    }
}

impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        let now = chrono::Utc::now().timestamp_micros();
        Self {
            id: Set(Uuid::now_v7().to_string()),
            execute_at: Set(now),
            status: Set(QueueStatus::Queued.to_string()),
            attempts: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..ActiveModelTrait::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueStatus::Queued => write!(f, "queued"),
            QueueStatus::Processing => write!(f, "processing"),
            QueueStatus::Done => write!(f, "done"),
            QueueStatus::Failed => write!(f, "failed"),
        }
    }
}

impl From<String> for QueueStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "processing" => QueueStatus::Processing,
            "done" => QueueStatus::Done,
            "failed" => QueueStatus::Failed,
            _ => QueueStatus::Queued,
        }
    }
}

use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::automation::steps::AutomationStep;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "automations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub status: String, // "Draft" | "Running" | "Paused"
    pub steps: String,  // JSON array of AutomationStep, admin-UI owned
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::automation_runs::Entity")]
    AutomationRuns,
}

impl Related<super::automation_runs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AutomationRuns.def()
    }
}

impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        let now = chrono::Utc::now().timestamp_micros();
        Self {
            id: Set(Uuid::now_v7().to_string()),
            status: Set(AutomationStatus::Draft.to_string()),
            steps: Set("[]".to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..ActiveModelTrait::default()
        }
    }
}

impl Model {
    /// Parse the persisted step list. The JSON is written by admin UIs,
    /// so a row that fails to parse is logged and treated as empty.
    pub fn parsed_steps(&self) -> Vec<AutomationStep> {
        match serde_json::from_str(&self.steps) {
            Ok(steps) => steps,
            Err(e) => {
                tracing::error!("Automation {} has unparseable steps: {}", self.id, e);
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutomationStatus {
    Draft,
    Running,
    Paused,
}

impl std::fmt::Display for AutomationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AutomationStatus::Draft => write!(f, "Draft"),
            AutomationStatus::Running => write!(f, "Running"),
            AutomationStatus::Paused => write!(f, "Paused"),
        }
    }
}

impl From<String> for AutomationStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Running" => AutomationStatus::Running,
            "Paused" => AutomationStatus::Paused,
            _ => AutomationStatus::Draft,
        }
    }
}

use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outbound send queue. Rows move queued -> processing -> sent | failed;
/// `(workspace_id, schedule_id, to_email)` is unique when schedule_id is
/// set, which is what makes the campaign scheduler re-runnable.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "email_sends")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub workspace_id: String,
    pub campaign_id: String,
    pub contact_id: Option<String>,
    pub to_email: String,
    pub from_email: Option<String>,
    pub subject: String,
    pub status: String,
    pub execute_at: i64, // Unix epoch microseconds
    pub sent_at: Option<i64>,
    pub opened_at: Option<i64>,  // first-write-wins
    pub clicked_at: Option<i64>, // first-write-wins
    pub provider_message_id: Option<String>,
    pub schedule_id: Option<String>,
    pub ab_variant: Option<String>,
    pub is_test: bool,
    pub meta: String, // JSON bag, carries body/source/error strings
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
    #[sea_orm(
        belongs_to = "super::contacts::Entity",
        from = "Column::ContactId",
        to = "super::contacts::Column::Id"
    )]
    Contact,
}

impl Related<super::campaigns::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campaign.def()
    }
}

impl Related<super::contacts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contact.def()
    }
}

impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        let now = chrono::Utc::now().timestamp_micros();
        Self {
            id: Set(Uuid::now_v7().to_string()),
            status: Set(SendStatus::Queued.to_string()),
            execute_at: Set(now),
            is_test: Set(false),
            meta: Set("{}".to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..ActiveModelTrait::default()
        }
    }
}

impl Model {
    pub fn meta_value(&self) -> serde_json::Value {
        serde_json::from_str(&self.meta).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendStatus {
    Queued,
    Processing,
    Sent,
    Failed,
}

impl std::fmt::Display for SendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendStatus::Queued => write!(f, "queued"),
            SendStatus::Processing => write!(f, "processing"),
            SendStatus::Sent => write!(f, "sent"),
            SendStatus::Failed => write!(f, "failed"),
        }
    }
}

impl From<String> for SendStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "processing" => SendStatus::Processing,
            "sent" => SendStatus::Sent,
            "failed" => SendStatus::Failed,
            _ => SendStatus::Queued,
        }
    }
}

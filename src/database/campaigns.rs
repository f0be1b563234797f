use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Well-known campaign name backing ad-hoc bulk blasts; one exists per
/// workspace and is created on first use.
pub const BULK_EMAIL_NAME: &str = "bulk_email";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "campaigns")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub email_blocks: String, // JSON array of block objects
    pub status: String,
    pub sent_count: i32,
    pub open_count: i32,
    pub click_count: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::email_sends::Entity")]
    EmailSends,
}

impl Related<super::email_sends::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailSends.def()
    }
}

impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        let now = chrono::Utc::now().timestamp_micros();
        Self {
            id: Set(Uuid::now_v7().to_string()),
            email_blocks: Set("[]".to_string()),
            status: Set(CampaignStatus::Draft.to_string()),
            sent_count: Set(0),
            open_count: Set(0),
            click_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..ActiveModelTrait::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sent,
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::Draft => write!(f, "Draft"),
            CampaignStatus::Scheduled => write!(f, "Scheduled"),
            CampaignStatus::Sent => write!(f, "Sent"),
        }
    }
}

impl From<String> for CampaignStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Scheduled" => CampaignStatus::Scheduled,
            "Sent" => CampaignStatus::Sent,
            _ => CampaignStatus::Draft,
        }
    }
}

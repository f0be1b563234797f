use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "contacts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub workspace_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub status: String,
    pub unsubscribed: bool,
    pub bounced: bool,
    pub spam_complaint: bool,
    pub lifecycle_stage: Option<String>,
    pub temperature: String,
    pub tags: String,  // JSON array of strings
    pub lists: String, // JSON array of strings
    pub lead_score: i32,
    pub best_send_hour: Option<i32>,
    pub best_send_minute: Option<i32>,
    pub best_send_updated_at: Option<i64>,
    pub timezone: Option<String>,
    pub open_count: i32,
    pub click_count: i32,
    pub last_open_at: Option<i64>,  // Unix epoch microseconds
    pub last_click_at: Option<i64>, // Unix epoch microseconds
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::contact_events::Entity")]
    ContactEvents,
}

impl Related<super::contact_events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ContactEvents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        let now = chrono::Utc::now().timestamp_micros();
        Self {
            id: Set(Uuid::now_v7().to_string()),
            status: Set(ContactStatus::Subscribed.to_string()),
            unsubscribed: Set(false),
            bounced: Set(false),
            spam_complaint: Set(false),
            temperature: Set("cold".to_string()),
            tags: Set("[]".to_string()),
            lists: Set("[]".to_string()),
            lead_score: Set(0),
            open_count: Set(0),
            click_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..ActiveModelTrait::default()
        }
    }
}

impl Model {
    /// A contact may receive email iff it is subscribed and has never
    /// unsubscribed, bounced, or complained.
    pub fn is_eligible(&self) -> bool {
        self.status == ContactStatus::Subscribed.to_string()
            && !self.unsubscribed
            && !self.bounced
            && !self.spam_complaint
    }

    pub fn tag_list(&self) -> Vec<String> {
        serde_json::from_str(&self.tags).unwrap_or_default()
    }

    pub fn list_memberships(&self) -> Vec<String> {
        serde_json::from_str(&self.lists).unwrap_or_default()
    }
}

/// Temperature derived from the lead score.
pub fn temperature_for_score(score: i32) -> &'static str {
    if score >= 50 {
        "hot"
    } else if score >= 20 {
        "warm"
    } else {
        "cold"
    }
}

/// Clamp a raw score into the stored 0..=100 range.
pub fn clamp_score(score: i64) -> i32 {
    score.clamp(0, 100) as i32
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactStatus {
    Subscribed,
    Unsubscribed,
    Bounced,
    Pending,
}

impl std::fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContactStatus::Subscribed => write!(f, "Subscribed"),
            ContactStatus::Unsubscribed => write!(f, "Unsubscribed"),
            ContactStatus::Bounced => write!(f, "Bounced"),
            ContactStatus::Pending => write!(f, "Pending"),
        }
    }
}

impl From<String> for ContactStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Unsubscribed" => ContactStatus::Unsubscribed,
            "Bounced" => ContactStatus::Bounced,
            "Pending" => ContactStatus::Pending,
            _ => ContactStatus::Subscribed,
        }
    }
}

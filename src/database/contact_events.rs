use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only event log. Events are the sole input to lead scoring,
/// best-time learning, and automation trigger matching.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "contact_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub workspace_id: String,
    pub contact_id: String,
    pub event_type: String,
    pub occurred_at: i64, // Unix epoch microseconds, cursor ordering key
    pub campaign_id: Option<String>,
    pub meta: String, // JSON bag
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::contacts::Entity",
        from = "Column::ContactId",
        to = "super::contacts::Column::Id"
    )]
    Contact,
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
            occurred_at: Set(now),
            meta: Set("{}".to_string()),
            created_at: Set(now),
            ..ActiveModelTrait::default()
        }
    }
}

impl Model {
    pub fn meta_value(&self) -> serde_json::Value {
        serde_json::from_str(&self.meta).unwrap_or(serde_json::Value::Null)
    }
}

pub mod event_type {
    pub const EMAIL_OPEN: &str = "email_open";
    pub const LINK_CLICK: &str = "link_click";
    pub const FORM_SUBMITTED: &str = "form_submitted";
    pub const PAGE_VISITED: &str = "page_visited";
    pub const TAG_ADDED: &str = "tag_added";
    pub const TAG_REMOVED: &str = "tag_removed";
    pub const LIST_JOINED: &str = "list_joined";
    pub const LIST_LEFT: &str = "list_left";
    pub const PURCHASE: &str = "purchase";
    pub const PURCHASE_UPGRADED: &str = "purchase_upgraded";
    pub const PURCHASE_CANCELLED: &str = "purchase_cancelled";
    pub const EMAIL_QUEUED: &str = "email_queued";
    pub const AUTOMATION_UPDATE_FIELD: &str = "automation_update_field";
}

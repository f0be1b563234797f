use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "workspace_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub workspace_id: String,
    pub company_name: Option<String>,
    pub default_from_email: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        let now = chrono::Utc::now().timestamp_micros();
        Self {
            created_at: Set(now),
            updated_at: Set(now),
            ..ActiveModelTrait::default()
        }
    }
}

/// Sender identity for a workspace, falling back to the process-wide
/// defaults when no settings row exists.
pub async fn sender_for<C: ConnectionTrait>(
    db: &C,
    workspace_id: &str,
    config: &crate::config::Config,
) -> Result<(String, String), DbErr> {
    let settings = Entity::find_by_id(workspace_id.to_string()).one(db).await?;
    let company_name = settings
        .as_ref()
        .and_then(|s| s.company_name.clone())
        .unwrap_or_else(|| config.default_from_name.clone());
    let from_email = settings
        .and_then(|s| s.default_from_email)
        .unwrap_or_else(|| config.default_from_email.clone());
    Ok((company_name, from_email))
}

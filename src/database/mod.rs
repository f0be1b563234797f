pub mod automation_queue;
pub mod automation_runs;
pub mod automations;
pub mod campaign_ab_state;
pub mod campaign_schedules;
pub mod campaigns;
pub mod contact_events;
pub mod contacts;
pub mod email_sends;
pub mod event_cursors;
pub mod migrator;
pub mod workspace_settings;

use sea_orm::{ColumnTrait, Database, DatabaseConnection, DbErr, EntityTrait, QuerySelect};
use sea_orm_migration::MigratorTrait;

/// Connect and bring the schema up to date. Tests pass `sqlite::memory:`
/// and get a ready database.
pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;
    migrator::Migrator::up(&db, None).await?;
    Ok(db)
}

/// Workspaces the background loops should service: every workspace that
/// owns contacts, plus the single-tenant default.
pub async fn list_workspaces(db: &DatabaseConnection) -> Result<Vec<String>, DbErr> {
    let mut workspaces: Vec<String> = contacts::Entity::find()
        .select_only()
        .column(contacts::Column::WorkspaceId)
        .distinct()
        .into_tuple()
        .all(db)
        .await?;
    if !workspaces.iter().any(|ws| ws == crate::config::DEFAULT_WORKSPACE) {
        workspaces.push(crate::config::DEFAULT_WORKSPACE.to_string());
    }
    Ok(workspaces)
}

/// Find the well-known bulk campaign for a workspace, creating it on
/// first use.
pub async fn ensure_bulk_campaign(
    db: &DatabaseConnection,
    workspace_id: &str,
) -> Result<campaigns::Model, DbErr> {
    use sea_orm::{ActiveModelBehavior, ActiveModelTrait, QueryFilter, Set};

    let existing = campaigns::Entity::find()
        .filter(campaigns::Column::WorkspaceId.eq(workspace_id))
        .filter(campaigns::Column::Name.eq(campaigns::BULK_EMAIL_NAME))
        .one(db)
        .await?;
    if let Some(campaign) = existing {
        return Ok(campaign);
    }

    let mut campaign = campaigns::ActiveModel::new();
    campaign.workspace_id = Set(workspace_id.to_string());
    campaign.name = Set(campaigns::BULK_EMAIL_NAME.to_string());
    campaign.insert(db).await
}

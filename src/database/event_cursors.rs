use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use serde::{Deserialize, Serialize};

/// Per-workspace, per-consumer high-water mark over `contact_events`.
/// `last_occurred_at` is monotonically non-decreasing; a consumer that
/// crashes mid-batch re-reads from the old mark and must tolerate
/// duplicate effects.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "event_cursors")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub workspace_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub consumer_id: String,
    pub last_occurred_at: i64, // Unix epoch microseconds
    pub last_event_id: Option<String>,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub mod consumer {
    pub const LEAD_SCORE: &str = "lead_score";
    pub const BEST_TIME: &str = "best_time";
    pub const AUTOMATION_EVENTS: &str = "automation_events";
}

/// Load a consumer's cursor, starting from zero when none exists yet.
pub async fn load<C: ConnectionTrait>(
    db: &C,
    workspace_id: &str,
    consumer_id: &str,
) -> Result<(i64, Option<String>), DbErr> {
    let cursor = Entity::find_by_id((workspace_id.to_string(), consumer_id.to_string()))
        .one(db)
        .await?;
    Ok(cursor
        .map(|c| (c.last_occurred_at, c.last_event_id))
        .unwrap_or((0, None)))
}

/// Advance a cursor to the given `(occurred_at, event_id)` mark. The mark
/// never moves backwards.
pub async fn advance<C: ConnectionTrait>(
    db: &C,
    workspace_id: &str,
    consumer_id: &str,
    occurred_at: i64,
    event_id: &str,
) -> Result<(), DbErr> {
    let now = chrono::Utc::now().timestamp_micros();
    let existing = Entity::find_by_id((workspace_id.to_string(), consumer_id.to_string()))
        .one(db)
        .await?;

    match existing {
        Some(cursor) if cursor.last_occurred_at > occurred_at => Ok(()),
        Some(cursor) => {
            let mut update: ActiveModel = cursor.into();
            update.last_occurred_at = Set(occurred_at);
            update.last_event_id = Set(Some(event_id.to_string()));
            update.updated_at = Set(now);
            update.update(db).await?;
            Ok(())
        }
        None => {
            let cursor = ActiveModel {
                workspace_id: Set(workspace_id.to_string()),
                consumer_id: Set(consumer_id.to_string()),
                last_occurred_at: Set(occurred_at),
                last_event_id: Set(Some(event_id.to_string())),
                updated_at: Set(now),
            };
            cursor.insert(db).await?;
            Ok(())
        }
    }
}

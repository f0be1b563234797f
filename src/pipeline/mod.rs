pub mod best_time;
pub mod lead_score;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};

use crate::database::contact_events;
use crate::error::Result;

/// Counters returned by the cursor consumers, mirrored into worker
/// endpoint responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerOutcome {
    pub processed_events: usize,
    pub updated_contacts: usize,
}

/// Fetch the next window of events past a cursor mark, strictly ordered
/// by `occurred_at` ascending. `event_type` narrows the scan for
/// consumers that only care about one type.
pub(crate) async fn events_after(
    db: &DatabaseConnection,
    workspace_id: &str,
    last_occurred_at: i64,
    event_type: Option<&str>,
    limit: u64,
) -> Result<Vec<contact_events::Model>> {
    let mut query = contact_events::Entity::find()
        .filter(contact_events::Column::WorkspaceId.eq(workspace_id))
        .filter(contact_events::Column::OccurredAt.gt(last_occurred_at));
    if let Some(event_type) = event_type {
        query = query.filter(contact_events::Column::EventType.eq(event_type));
    }
    let events = query
        .order_by_asc(contact_events::Column::OccurredAt)
        .order_by_asc(contact_events::Column::Id)
        .limit(limit)
        .all(db)
        .await?;
    Ok(events)
}

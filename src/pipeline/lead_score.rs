use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::collections::HashMap;

use crate::database::contact_events::{self, event_type};
use crate::database::contacts::{self, clamp_score, temperature_for_score};
use crate::database::event_cursors::{self, consumer};
use crate::error::Result;
use crate::pipeline::{events_after, ConsumerOutcome};

pub const MAX_LEAD_SCORE_LIMIT: u64 = 500;

/// Apply the scoring rules to one window of new events. Deltas are
/// aggregated per contact across the batch before the clamp, so a batch
/// cannot bounce a contact off the 0/100 walls between events. The
/// cursor advances only after every patch landed; re-processing after a
/// crash may over-count once, which is accepted.
pub async fn run(
    db: &DatabaseConnection,
    workspace_id: &str,
    limit: u64,
) -> Result<ConsumerOutcome> {
    let (last_occurred_at, _) =
        event_cursors::load(db, workspace_id, consumer::LEAD_SCORE).await?;
    let events = events_after(
        db,
        workspace_id,
        last_occurred_at,
        None,
        limit.min(MAX_LEAD_SCORE_LIMIT),
    )
    .await?;

    if events.is_empty() {
        return Ok(ConsumerOutcome::default());
    }

    let mut deltas: HashMap<String, i64> = HashMap::new();
    for event in &events {
        let delta = score_delta(&event.event_type, &event.meta_value());
        if delta != 0 {
            *deltas.entry(event.contact_id.clone()).or_insert(0) += delta;
        }
    }

    let mut updated_contacts = 0;
    for (contact_id, delta) in deltas {
        let Some(contact) = contacts::Entity::find_by_id(contact_id.clone())
            .one(db)
            .await?
        else {
            tracing::warn!("Scored events reference missing contact {}", contact_id);
            continue;
        };

        let new_score = clamp_score(contact.lead_score as i64 + delta);
        let now = chrono::Utc::now().timestamp_micros();
        let mut update: contacts::ActiveModel = contact.into();
        update.lead_score = Set(new_score);
        update.temperature = Set(temperature_for_score(new_score).to_string());
        update.updated_at = Set(now);
        update.update(db).await?;
        updated_contacts += 1;
    }

    if let Some(last) = events.last() {
        event_cursors::advance(
            db,
            workspace_id,
            consumer::LEAD_SCORE,
            last.occurred_at,
            &last.id,
        )
        .await?;
    }

    tracing::debug!(
        "Lead score pass for {}: {} events, {} contacts",
        workspace_id,
        events.len(),
        updated_contacts
    );
    Ok(ConsumerOutcome {
        processed_events: events.len(),
        updated_contacts,
    })
}

/// Score delta for one event.
pub fn score_delta(kind: &str, meta: &serde_json::Value) -> i64 {
    match kind {
        event_type::EMAIL_OPEN => 1,
        event_type::LINK_CLICK => {
            let url = meta.get("url").and_then(|u| u.as_str()).unwrap_or("");
            if url.contains("pricing") || url.contains("checkout") {
                5
            } else {
                3
            }
        }
        event_type::FORM_SUBMITTED => {
            let form = meta.get("form").and_then(|f| f.as_str()).unwrap_or("");
            if form.contains("webinar") {
                10
            } else {
                4
            }
        }
        event_type::PURCHASE => 15,
        event_type::PURCHASE_UPGRADED => 10,
        event_type::PURCHASE_CANCELLED => -10,
        _ => 0,
    }
}

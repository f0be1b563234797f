use chrono::{DateTime, TimeZone, Timelike};
use chrono_tz::Tz;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::collections::HashMap;

use crate::database::contact_events::{self, event_type};
use crate::database::contacts;
use crate::database::event_cursors::{self, consumer};
use crate::error::Result;
use crate::pipeline::{events_after, ConsumerOutcome};

pub const MAX_BEST_TIME_LIMIT: u64 = 500;

/// Learn per-contact send slots from open events. Each open is converted
/// to the contact's local clock, bucketed to a quarter hour, and the
/// most-opened bucket wins (first-seen breaks ties). The histogram spans
/// the new batch only; older opens are not re-read.
pub async fn run(
    db: &DatabaseConnection,
    workspace_id: &str,
    limit: u64,
) -> Result<ConsumerOutcome> {
    let (last_occurred_at, _) = event_cursors::load(db, workspace_id, consumer::BEST_TIME).await?;
    let events = events_after(
        db,
        workspace_id,
        last_occurred_at,
        Some(event_type::EMAIL_OPEN),
        limit.min(MAX_BEST_TIME_LIMIT),
    )
    .await?;

    if events.is_empty() {
        return Ok(ConsumerOutcome::default());
    }

    // Opens grouped per contact, in batch order.
    let mut opens_by_contact: HashMap<String, Vec<i64>> = HashMap::new();
    let mut contact_order: Vec<String> = Vec::new();
    for event in &events {
        if !opens_by_contact.contains_key(&event.contact_id) {
            contact_order.push(event.contact_id.clone());
        }
        opens_by_contact
            .entry(event.contact_id.clone())
            .or_default()
            .push(event.occurred_at);
    }

    let mut updated_contacts = 0;
    for contact_id in contact_order {
        let Some(contact) = contacts::Entity::find_by_id(contact_id.clone())
            .one(db)
            .await?
        else {
            tracing::warn!("Open events reference missing contact {}", contact_id);
            continue;
        };

        let tz: Tz = contact
            .timezone
            .as_deref()
            .and_then(|name| name.parse().ok())
            .unwrap_or(chrono_tz::UTC);

        let opens = &opens_by_contact[&contact_id];
        let Some((hour, minute)) = best_slot(opens, tz) else {
            continue;
        };

        let now = chrono::Utc::now().timestamp_micros();
        let mut update: contacts::ActiveModel = contact.into();
        update.best_send_hour = Set(Some(hour as i32));
        update.best_send_minute = Set(Some(minute as i32));
        update.best_send_updated_at = Set(Some(now));
        update.updated_at = Set(now);
        update.update(db).await?;
        updated_contacts += 1;
    }

    if let Some(last) = events.last() {
        event_cursors::advance(
            db,
            workspace_id,
            consumer::BEST_TIME,
            last.occurred_at,
            &last.id,
        )
        .await?;
    }

    Ok(ConsumerOutcome {
        processed_events: events.len(),
        updated_contacts,
    })
}

/// Argmax over the `(hour, bucket)` histogram, ties broken by the bucket
/// seen first.
fn best_slot(open_micros: &[i64], tz: Tz) -> Option<(u32, u32)> {
    let mut counts: HashMap<(u32, u32), u32> = HashMap::new();
    let mut seen_order: Vec<(u32, u32)> = Vec::new();

    for &micros in open_micros {
        let Some(utc) = DateTime::from_timestamp_micros(micros) else {
            continue;
        };
        let local = tz.from_utc_datetime(&utc.naive_utc());
        let slot = (local.hour(), minute_bucket(local.minute()));
        if !counts.contains_key(&slot) {
            seen_order.push(slot);
        }
        *counts.entry(slot).or_insert(0) += 1;
    }

    let mut best: Option<((u32, u32), u32)> = None;
    for slot in seen_order {
        let count = counts[&slot];
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((slot, count)),
        }
    }
    best.map(|(slot, _)| slot)
}

/// Nearest of {0, 15, 30, 45}; a round up to 60 lands back on 45.
fn minute_bucket(minute: u32) -> u32 {
    let bucket = ((minute as f64 / 15.0).round() as u32) * 15;
    if bucket >= 60 {
        45
    } else {
        bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minute_buckets() {
        assert_eq!(minute_bucket(0), 0);
        assert_eq!(minute_bucket(7), 0);
        assert_eq!(minute_bucket(8), 15);
        assert_eq!(minute_bucket(22), 15);
        assert_eq!(minute_bucket(23), 30);
        assert_eq!(minute_bucket(44), 45);
        assert_eq!(minute_bucket(53), 45);
        assert_eq!(minute_bucket(59), 45);
    }

    #[test]
    fn argmax_prefers_most_frequent_slot() {
        // Two opens at 09:00-ish UTC, one at 14:30
        let opens = vec![
            utc_micros(2026, 3, 2, 9, 2),
            utc_micros(2026, 3, 3, 9, 5),
            utc_micros(2026, 3, 4, 14, 31),
        ];
        assert_eq!(best_slot(&opens, chrono_tz::UTC), Some((9, 0)));
    }

    #[test]
    fn ties_break_by_first_seen() {
        let opens = vec![utc_micros(2026, 3, 2, 8, 0), utc_micros(2026, 3, 2, 16, 0)];
        assert_eq!(best_slot(&opens, chrono_tz::UTC), Some((8, 0)));
    }

    #[test]
    fn respects_contact_timezone() {
        // 14:00 UTC is 09:00 in New York (EST, winter)
        let opens = vec![utc_micros(2026, 1, 5, 14, 0)];
        assert_eq!(
            best_slot(&opens, "America/New_York".parse().unwrap()),
            Some((9, 0))
        );
    }

    fn utc_micros(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> i64 {
        chrono::NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
            .and_utc()
            .timestamp_micros()
    }
}

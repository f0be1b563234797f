use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::database::campaign_ab_state::{self, AbStatus};
use crate::database::campaign_schedules::{self, ScheduleStatus};
use crate::database::campaigns;
use crate::database::contacts;
use crate::database::email_sends;
use crate::error::Result;
use crate::segment;

pub const MAX_SCHEDULES: u64 = 10;
pub const MAX_RECIPIENTS: u64 = 1000;

const MIN_TEST_FRACTION: f64 = 0.05;
const MAX_TEST_FRACTION: f64 = 0.30;

/// Process due campaign schedules. Every queued row goes through the
/// `(workspace_id, schedule_id, to_email)` upsert, so overlapping cron
/// fires converge on the same send set instead of double-sending.
pub async fn run(
    db: &DatabaseConnection,
    workspace_id: &str,
    limit_schedules: u64,
    limit_recipients: u64,
) -> Result<usize> {
    let now = Utc::now();
    let due = campaign_schedules::Entity::find()
        .filter(campaign_schedules::Column::WorkspaceId.eq(workspace_id))
        .filter(campaign_schedules::Column::Status.eq(ScheduleStatus::Active.to_string()))
        .filter(campaign_schedules::Column::NextRunAt.lte(now.timestamp_micros()))
        .order_by_asc(campaign_schedules::Column::NextRunAt)
        .limit(limit_schedules.min(MAX_SCHEDULES))
        .all(db)
        .await?;

    let mut processed = 0;
    for schedule in due {
        match process_schedule(db, &schedule, limit_recipients.min(MAX_RECIPIENTS), now).await {
            Ok(()) => processed += 1,
            Err(e) => {
                tracing::error!("Schedule {} failed: {}", schedule.id, e);
            }
        }
    }
    Ok(processed)
}

async fn process_schedule(
    db: &DatabaseConnection,
    schedule: &campaign_schedules::Model,
    limit_recipients: u64,
    now: DateTime<Utc>,
) -> Result<()> {
    let Some(campaign) = campaigns::Entity::find_by_id(schedule.campaign_id.clone())
        .one(db)
        .await?
    else {
        tracing::warn!(
            "Schedule {} references missing campaign {}, completing it",
            schedule.id,
            schedule.campaign_id
        );
        complete_schedule(db, &schedule.id).await?;
        return Ok(());
    };

    let recipients = eligible_recipients(db, schedule, limit_recipients).await?;
    if recipients.is_empty() {
        tracing::info!("Schedule {} matched no eligible recipients", schedule.id);
        complete_schedule(db, &schedule.id).await?;
        return Ok(());
    }

    let variants = ab_variants(schedule);
    if schedule.ab_enabled && variants.len() >= 2 {
        process_ab_schedule(db, schedule, &recipients, &variants, now).await
    } else {
        let subject = campaign
            .subject
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| campaign.name.clone());
        for contact in &recipients {
            let execute_at = compute_execute_at(schedule, contact, now);
            upsert_send(db, schedule, contact, &subject, execute_at, None, false).await?;
        }
        tracing::info!(
            "Schedule {} queued {} recipients",
            schedule.id,
            recipients.len()
        );
        complete_schedule(db, &schedule.id).await
    }
}

/// A/B lifecycle: queue the test pool first, and only pick a winner on a
/// later pass once the wait window has elapsed. The test pool is always
/// created strictly before any winner row.
async fn process_ab_schedule(
    db: &DatabaseConnection,
    schedule: &campaign_schedules::Model,
    recipients: &[contacts::Model],
    variants: &[(String, String)],
    now: DateTime<Utc>,
) -> Result<()> {
    let fraction = schedule
        .ab_test_fraction
        .clamp(MIN_TEST_FRACTION, MAX_TEST_FRACTION);
    let test_size = ((recipients.len() as f64) * fraction).ceil() as usize;
    let test_size = test_size.clamp(1, recipients.len());
    let (test_pool, rest) = recipients.split_at(test_size);

    let state = campaign_ab_state::Entity::find_by_id((
        schedule.workspace_id.clone(),
        schedule.id.clone(),
    ))
    .one(db)
    .await?;

    // Queue (or re-queue, idempotently) the test pool.
    for (i, contact) in test_pool.iter().enumerate() {
        let (variant, subject) = &variants[i % variants.len()];
        let execute_at = compute_execute_at(schedule, contact, now);
        upsert_send(db, schedule, contact, subject, execute_at, Some(variant), true).await?;
    }

    let state = match state {
        Some(state) => state,
        None => {
            let test_end_at =
                now.timestamp_micros() + (schedule.ab_wait_minutes as i64) * 60 * 1_000_000;
            let mut new_state = campaign_ab_state::ActiveModel::new();
            new_state.workspace_id = Set(schedule.workspace_id.clone());
            new_state.schedule_id = Set(schedule.id.clone());
            new_state.test_end_at = Set(test_end_at);
            new_state.insert(db).await?;
            tracing::info!(
                "Schedule {} entered A/B testing with {} test sends across {} variants",
                schedule.id,
                test_pool.len(),
                variants.len()
            );
            // The winner pass happens on a later invocation.
            return Ok(());
        }
    };

    let winner_subject = match campaign_ab_state::AbStatus::from(state.status.clone()) {
        AbStatus::WinnerSelected => state.winner_subject.clone().unwrap_or_default(),
        AbStatus::Testing => {
            if now.timestamp_micros() < state.test_end_at {
                tracing::debug!(
                    "Schedule {} still in A/B wait window",
                    schedule.id
                );
                return Ok(());
            }
            let winner = select_winner(db, schedule, variants).await?;
            let now_micros = now.timestamp_micros();
            let mut update: campaign_ab_state::ActiveModel = state.into();
            update.status = Set(AbStatus::WinnerSelected.to_string());
            update.winner_subject = Set(Some(winner.clone()));
            update.updated_at = Set(now_micros);
            update.update(db).await?;
            winner
        }
    };

    for contact in rest {
        let execute_at = compute_execute_at(schedule, contact, now);
        upsert_send(db, schedule, contact, &winner_subject, execute_at, None, false).await?;
    }
    tracing::info!(
        "Schedule {} queued {} winner sends with subject {:?}",
        schedule.id,
        rest.len(),
        winner_subject
    );
    complete_schedule(db, &schedule.id).await
}

/// Count opens/clicks over the test sends and pick the best variant.
/// Ties break A < B < C; exposure time is deliberately not weighted.
async fn select_winner(
    db: &DatabaseConnection,
    schedule: &campaign_schedules::Model,
    variants: &[(String, String)],
) -> Result<String> {
    let test_sends = email_sends::Entity::find()
        .filter(email_sends::Column::WorkspaceId.eq(schedule.workspace_id.clone()))
        .filter(email_sends::Column::ScheduleId.eq(schedule.id.clone()))
        .filter(email_sends::Column::IsTest.eq(true))
        .all(db)
        .await?;

    let by_clicks = schedule.ab_metric == "clicks";
    let mut best: Option<(&str, &str, usize)> = None;
    for (variant, subject) in variants {
        let score = test_sends
            .iter()
            .filter(|send| send.ab_variant.as_deref() == Some(variant.as_str()))
            .filter(|send| {
                if by_clicks {
                    send.clicked_at.is_some()
                } else {
                    send.opened_at.is_some()
                }
            })
            .count();
        match best {
            Some((_, _, best_score)) if score <= best_score => {}
            _ => best = Some((variant.as_str(), subject.as_str(), score)),
        }
    }

    let (variant, subject, score) = best.unwrap_or(("A", "", 0));
    tracing::info!(
        "Schedule {} A/B winner: variant {} ({} {})",
        schedule.id,
        variant,
        score,
        schedule.ab_metric
    );
    Ok(subject.to_string())
}

/// Non-empty subject variants in A/B/C order.
fn ab_variants(schedule: &campaign_schedules::Model) -> Vec<(String, String)> {
    [
        ("A", &schedule.ab_subject_a),
        ("B", &schedule.ab_subject_b),
        ("C", &schedule.ab_subject_c),
    ]
    .into_iter()
    .filter_map(|(variant, subject)| {
        subject
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| (variant.to_string(), s.to_string()))
    })
    .collect()
}

async fn eligible_recipients(
    db: &DatabaseConnection,
    schedule: &campaign_schedules::Model,
    limit: u64,
) -> Result<Vec<contacts::Model>> {
    let candidates = contacts::Entity::find()
        .filter(contacts::Column::WorkspaceId.eq(schedule.workspace_id.clone()))
        .filter(contacts::Column::Status.eq(contacts::ContactStatus::Subscribed.to_string()))
        .filter(contacts::Column::Unsubscribed.eq(false))
        .filter(contacts::Column::Bounced.eq(false))
        .filter(contacts::Column::SpamComplaint.eq(false))
        .order_by_asc(contacts::Column::Id)
        .limit(limit)
        .all(db)
        .await?;

    let segment = segment::parse(schedule.segment_json.as_deref());
    Ok(candidates
        .into_iter()
        .filter(|contact| match &segment {
            Some(segment) => segment::matches(segment, contact),
            None => true,
        })
        .collect())
}

/// Per-recipient send time. The target hour/minute is applied on the UTC
/// clock (the source's known shortcut): past targets roll to tomorrow,
/// and targets outside the window snap to the window start.
fn compute_execute_at(
    schedule: &campaign_schedules::Model,
    contact: &contacts::Model,
    now: DateTime<Utc>,
) -> i64 {
    let window_start = parse_hhmm(&schedule.window_start).unwrap_or((9, 0));
    let window_end = parse_hhmm(&schedule.window_end).unwrap_or((17, 0));

    let (mut hour, mut minute) = if schedule.mode == "best_time" {
        match (contact.best_send_hour, contact.best_send_minute) {
            (Some(h), Some(m)) if (0..=23).contains(&h) && (0..=59).contains(&m) => {
                (h as u32, m as u32)
            }
            _ => window_start,
        }
    } else {
        window_start
    };

    let target_minutes = hour * 60 + minute;
    let start_minutes = window_start.0 * 60 + window_start.1;
    let end_minutes = window_end.0 * 60 + window_end.1;
    if target_minutes < start_minutes || target_minutes > end_minutes {
        (hour, minute) = window_start;
    }

    let today_target = now
        .date_naive()
        .and_hms_opt(hour, minute, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(now);
    let execute = if today_target <= now {
        today_target + Duration::days(1)
    } else {
        today_target
    };
    execute.timestamp_micros()
}

fn parse_hhmm(value: &str) -> Option<(u32, u32)> {
    let (h, m) = value.split_once(':')?;
    let h: u32 = h.trim().parse().ok()?;
    let m: u32 = m.trim().parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some((h, m))
}

/// Insert-or-update keyed on the schedule's unique recipient index.
async fn upsert_send(
    db: &DatabaseConnection,
    schedule: &campaign_schedules::Model,
    contact: &contacts::Model,
    subject: &str,
    execute_at: i64,
    ab_variant: Option<&str>,
    is_test: bool,
) -> Result<()> {
    let mut send = email_sends::ActiveModel::new();
    send.workspace_id = Set(schedule.workspace_id.clone());
    send.campaign_id = Set(schedule.campaign_id.clone());
    send.contact_id = Set(Some(contact.id.clone()));
    send.to_email = Set(contact.email.clone());
    send.subject = Set(subject.to_string());
    send.execute_at = Set(execute_at);
    send.schedule_id = Set(Some(schedule.id.clone()));
    send.ab_variant = Set(ab_variant.map(|v| v.to_string()));
    send.is_test = Set(is_test);
    send.meta = Set(serde_json::json!({"source": "schedule"}).to_string());

    email_sends::Entity::insert(send)
        .on_conflict(
            OnConflict::columns([
                email_sends::Column::WorkspaceId,
                email_sends::Column::ScheduleId,
                email_sends::Column::ToEmail,
            ])
            .update_columns([
                email_sends::Column::Subject,
                email_sends::Column::ExecuteAt,
                email_sends::Column::AbVariant,
                email_sends::Column::IsTest,
                email_sends::Column::UpdatedAt,
            ])
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(())
}

async fn complete_schedule(db: &DatabaseConnection, schedule_id: &str) -> Result<()> {
    let now = Utc::now().timestamp_micros();
    campaign_schedules::Entity::update_many()
        .col_expr(
            campaign_schedules::Column::Status,
            Expr::value(ScheduleStatus::Completed.to_string()),
        )
        .col_expr(campaign_schedules::Column::UpdatedAt, Expr::value(now))
        .filter(campaign_schedules::Column::Id.eq(schedule_id))
        .exec(db)
        .await?;
    Ok(())
}

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::automation::steps::{
    ActionConfig, ActionKind, AutomationStep, CmpOp, ConditionConfig, ConditionKind, StepGraph,
};
use crate::config::Config;
use crate::database::automation_queue::{self, QueueStatus};
use crate::database::automation_runs::{self, RunStatus};
use crate::database::automations;
use crate::database::contact_events::{self, event_type};
use crate::database::contacts;
use crate::database::email_sends;
use crate::error::{FlowmailError, Result};

pub const MAX_EXECUTION_BATCH: u64 = 25;

const MICROS_PER_DAY: i64 = 86_400 * 1_000_000;

/// Drain due automation queue items, oldest first. Each item is claimed
/// (queued -> processing, attempts + 1), the step it points at is
/// interpreted, and the successor is enqueued. A crash between the claim
/// and the final `done` re-delivers the step; the side effects tolerate
/// that duplication rather than losing steps.
pub async fn run(
    db: &DatabaseConnection,
    config: &Config,
    workspace_id: &str,
    batch: u64,
) -> Result<usize> {
    let now = chrono::Utc::now().timestamp_micros();
    let due = automation_queue::Entity::find()
        .filter(automation_queue::Column::WorkspaceId.eq(workspace_id))
        .filter(automation_queue::Column::Status.eq(QueueStatus::Queued.to_string()))
        .filter(automation_queue::Column::ExecuteAt.lte(now))
        .order_by_asc(automation_queue::Column::ExecuteAt)
        .limit(batch.min(MAX_EXECUTION_BATCH))
        .all(db)
        .await?;

    let mut processed = 0;
    for item in due {
        if !claim(db, &item.id).await? {
            continue;
        }

        match execute_item(db, config, &item).await {
            Ok(()) => {
                finish_item(db, &item.id, QueueStatus::Done, None).await?;
                processed += 1;
            }
            Err(e) => {
                tracing::error!("Automation queue item {} failed: {}", item.id, e);
                let message = e.to_string();
                finish_item(db, &item.id, QueueStatus::Failed, Some(&message)).await?;
                // Best effort: surface the failure on the run as well.
                if let Err(run_err) = fail_run(db, &item.run_id, &message).await {
                    tracing::error!("Could not mark run {} failed: {}", item.run_id, run_err);
                }
                processed += 1;
            }
        }
    }

    Ok(processed)
}

async fn claim(db: &DatabaseConnection, item_id: &str) -> Result<bool> {
    let now = chrono::Utc::now().timestamp_micros();
    let result = automation_queue::Entity::update_many()
        .col_expr(
            automation_queue::Column::Status,
            Expr::value(QueueStatus::Processing.to_string()),
        )
        .col_expr(
            automation_queue::Column::Attempts,
            Expr::col(automation_queue::Column::Attempts).add(1),
        )
        .col_expr(automation_queue::Column::UpdatedAt, Expr::value(now))
        .filter(automation_queue::Column::Id.eq(item_id))
        .filter(automation_queue::Column::Status.eq(QueueStatus::Queued.to_string()))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

async fn finish_item(
    db: &DatabaseConnection,
    item_id: &str,
    status: QueueStatus,
    error: Option<&str>,
) -> Result<()> {
    let now = chrono::Utc::now().timestamp_micros();
    let mut update = automation_queue::Entity::update_many()
        .col_expr(
            automation_queue::Column::Status,
            Expr::value(status.to_string()),
        )
        .col_expr(automation_queue::Column::UpdatedAt, Expr::value(now));
    if let Some(error) = error {
        update = update.col_expr(automation_queue::Column::LastError, Expr::value(error));
    }
    update
        .filter(automation_queue::Column::Id.eq(item_id))
        .exec(db)
        .await?;
    Ok(())
}

async fn fail_run(db: &DatabaseConnection, run_id: &str, error: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp_micros();
    automation_runs::Entity::update_many()
        .col_expr(
            automation_runs::Column::Status,
            Expr::value(RunStatus::Failed.to_string()),
        )
        .col_expr(automation_runs::Column::FinishedAt, Expr::value(now))
        .col_expr(automation_runs::Column::LastError, Expr::value(error))
        .col_expr(automation_runs::Column::UpdatedAt, Expr::value(now))
        .filter(automation_runs::Column::Id.eq(run_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Interpret the step a queue item points at and enqueue its successor.
async fn execute_item(
    db: &DatabaseConnection,
    config: &Config,
    item: &automation_queue::Model,
) -> Result<()> {
    let automation = automations::Entity::find_by_id(item.automation_id.clone())
        .one(db)
        .await?
        .ok_or_else(|| FlowmailError::AutomationNotFound(item.automation_id.clone()))?;
    let graph = StepGraph::new(automation.parsed_steps());
    let step = graph
        .get(&item.step_id)
        .ok_or_else(|| FlowmailError::StepNotFound {
            automation_id: item.automation_id.clone(),
            step_id: item.step_id.clone(),
        })?;
    let contact = contacts::Entity::find_by_id(item.contact_id.clone())
        .one(db)
        .await?;

    let now = chrono::Utc::now().timestamp_micros();
    let (successor, execute_at) = match step {
        AutomationStep::Trigger { .. } => {
            // Triggers are matched by the scanner; one landing here is a
            // stale pointer and simply falls through to its successor.
            (graph.successor_of(step), now)
        }
        AutomationStep::Wait { config: wait, .. } => {
            let delay = (wait.days * MICROS_PER_DAY as f64) as i64;
            (graph.successor_of(step), now + delay.max(0))
        }
        AutomationStep::Condition { config: cond, .. } => {
            let contact = contact
                .as_ref()
                .ok_or_else(|| FlowmailError::InvalidInput(format!(
                    "Run {} references missing contact {}",
                    item.run_id, item.contact_id
                )))?;
            let pass = eval_condition(cond, contact, now);
            let target = if pass {
                cond.next_yes.as_deref()
            } else {
                cond.next_no.as_deref()
            };
            (graph.branch_target(target), now)
        }
        AutomationStep::Action { config: action, .. } => {
            let contact = contact
                .as_ref()
                .ok_or_else(|| FlowmailError::InvalidInput(format!(
                    "Run {} references missing contact {}",
                    item.run_id, item.contact_id
                )))?;
            perform_action(db, config, item, action, contact).await?;
            (graph.successor_of(step), now)
        }
    };

    match successor {
        Some(next_step) => {
            let mut queued = automation_queue::ActiveModel::new();
            queued.workspace_id = Set(item.workspace_id.clone());
            queued.run_id = Set(item.run_id.clone());
            queued.automation_id = Set(item.automation_id.clone());
            queued.contact_id = Set(item.contact_id.clone());
            queued.step_id = Set(next_step.id().to_string());
            queued.execute_at = Set(execute_at);
            queued.insert(db).await?;

            automation_runs::Entity::update_many()
                .col_expr(
                    automation_runs::Column::CurrentStepId,
                    Expr::value(next_step.id().to_string()),
                )
                .col_expr(automation_runs::Column::UpdatedAt, Expr::value(now))
                .filter(automation_runs::Column::Id.eq(item.run_id.clone()))
                .exec(db)
                .await?;
        }
        None => {
            automation_runs::Entity::update_many()
                .col_expr(
                    automation_runs::Column::Status,
                    Expr::value(RunStatus::Completed.to_string()),
                )
                .col_expr(automation_runs::Column::FinishedAt, Expr::value(now))
                .col_expr(automation_runs::Column::UpdatedAt, Expr::value(now))
                .filter(automation_runs::Column::Id.eq(item.run_id.clone()))
                .exec(db)
                .await?;
            tracing::info!("Automation run {} completed", item.run_id);
        }
    }

    Ok(())
}

fn eval_condition(cond: &ConditionConfig, contact: &contacts::Model, now_micros: i64) -> bool {
    match cond.kind {
        ConditionKind::LeadScore => {
            let target = cond
                .value
                .as_ref()
                .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
                .unwrap_or(0.0);
            let op = cond.op.unwrap_or(CmpOp::Gt);
            op.compare(contact.lead_score as f64, target)
        }
        ConditionKind::LifecycleStage => {
            let want = cond
                .value
                .as_ref()
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .trim()
                .to_lowercase();
            let have = contact
                .lifecycle_stage
                .as_deref()
                .unwrap_or("")
                .trim()
                .to_lowercase();
            have == want
        }
        ConditionKind::LastOpenDays => match contact.last_open_at {
            // Never opened counts as "stale enough".
            None => true,
            Some(last_open) => {
                let days_since = (now_micros - last_open) / MICROS_PER_DAY;
                days_since as f64 >= cond.days.unwrap_or(0.0)
            }
        },
        ConditionKind::HasTag => {
            let Some(want) = cond.tag.as_deref().filter(|t| !t.trim().is_empty()) else {
                return true;
            };
            let want = want.trim().to_lowercase();
            contact.tag_list().iter().any(|tag| {
                let tag = tag.trim().to_lowercase();
                tag == want || tag.contains(&want)
            })
        }
    }
}

async fn perform_action(
    db: &DatabaseConnection,
    config: &Config,
    item: &automation_queue::Model,
    action: &ActionConfig,
    contact: &contacts::Model,
) -> Result<()> {
    match action.kind {
        ActionKind::SendEmail => send_email_action(db, item, action, contact).await,
        ActionKind::UpdateField => update_field_action(db, item, action, contact).await,
        ActionKind::Notify => notify_action(db, config, item, action, contact).await,
    }
}

/// Queue an automation email for the contact. The send reuses the
/// automation id as its campaign id so reporting can group by source.
async fn send_email_action(
    db: &DatabaseConnection,
    item: &automation_queue::Model,
    action: &ActionConfig,
    contact: &contacts::Model,
) -> Result<()> {
    if !contact.is_eligible() {
        tracing::info!(
            "Skipping automation email for ineligible contact {}",
            contact.id
        );
        return Ok(());
    }

    let now = chrono::Utc::now().timestamp_micros();
    let meta = serde_json::json!({
        "source": "automation",
        "automation_id": item.automation_id,
        "step_id": item.step_id,
        "body": action.body.clone().unwrap_or_default(),
    });

    let mut send = email_sends::ActiveModel::new();
    send.workspace_id = Set(item.workspace_id.clone());
    send.campaign_id = Set(item.automation_id.clone());
    send.contact_id = Set(Some(contact.id.clone()));
    send.to_email = Set(contact.email.clone());
    send.subject = Set(action.subject.clone().unwrap_or_default());
    send.execute_at = Set(now);
    send.meta = Set(meta.to_string());
    send.insert(db).await?;

    let mut event = contact_events::ActiveModel::new();
    event.workspace_id = Set(item.workspace_id.clone());
    event.contact_id = Set(contact.id.clone());
    event.event_type = Set(event_type::EMAIL_QUEUED.to_string());
    event.campaign_id = Set(Some(item.automation_id.clone()));
    event.meta = Set(serde_json::json!({
        "automation_id": item.automation_id,
        "step_id": item.step_id,
    })
    .to_string());
    event.insert(db).await?;

    Ok(())
}

async fn update_field_action(
    db: &DatabaseConnection,
    item: &automation_queue::Model,
    action: &ActionConfig,
    contact: &contacts::Model,
) -> Result<()> {
    let field = action.field.as_deref().unwrap_or("");
    let value = action.value.clone().unwrap_or(serde_json::Value::Null);
    let now = chrono::Utc::now().timestamp_micros();

    let mut update: contacts::ActiveModel = contact.clone().into();
    match field {
        "lifecycle_stage" => {
            update.lifecycle_stage = Set(value.as_str().map(|s| s.to_string()));
        }
        "temperature" => {
            if let Some(v) = value.as_str() {
                update.temperature = Set(v.to_string());
            }
        }
        "status" => {
            if let Some(v) = value.as_str() {
                update.status = Set(v.to_string());
            }
        }
        "lead_score" => {
            let score = value
                .as_i64()
                .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
                .unwrap_or(contact.lead_score as i64);
            let score = contacts::clamp_score(score);
            update.lead_score = Set(score);
            update.temperature = Set(contacts::temperature_for_score(score).to_string());
        }
        "tag" | "list" => {
            let current = if field == "tag" {
                contact.tag_list()
            } else {
                contact.list_memberships()
            };
            let updated = apply_membership_op(current, action.op.as_deref().unwrap_or("add"), &value);
            let serialized = serde_json::to_string(&updated)?;
            if field == "tag" {
                update.tags = Set(serialized);
            } else {
                update.lists = Set(serialized);
            }
        }
        other => {
            return Err(FlowmailError::InvalidInput(format!(
                "update_field does not support field {other:?}"
            )));
        }
    }
    update.updated_at = Set(now);
    update.update(db).await?;

    let mut event = contact_events::ActiveModel::new();
    event.workspace_id = Set(item.workspace_id.clone());
    event.contact_id = Set(contact.id.clone());
    event.event_type = Set(event_type::AUTOMATION_UPDATE_FIELD.to_string());
    event.meta = Set(serde_json::json!({
        "automation_id": item.automation_id,
        "step_id": item.step_id,
        "field": field,
    })
    .to_string());
    event.insert(db).await?;

    Ok(())
}

/// set replaces, add unions, remove filters by normalized equality.
fn apply_membership_op(current: Vec<String>, op: &str, value: &serde_json::Value) -> Vec<String> {
    let incoming: Vec<String> = match value {
        serde_json::Value::String(s) => vec![s.clone()],
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect(),
        _ => Vec::new(),
    };
    let normalize = |s: &str| s.trim().to_lowercase();

    match op {
        "set" => incoming,
        "remove" => {
            let removed: Vec<String> = incoming.iter().map(|s| normalize(s)).collect();
            current
                .into_iter()
                .filter(|existing| !removed.contains(&normalize(existing)))
                .collect()
        }
        // add is the default
        _ => {
            let mut merged = current;
            for item in incoming {
                if !merged.iter().any(|e| normalize(e) == normalize(&item)) {
                    merged.push(item);
                }
            }
            merged
        }
    }
}

/// Insert a team notification send. Keeps the automation id as the
/// campaign id, same as automation emails.
async fn notify_action(
    db: &DatabaseConnection,
    config: &Config,
    item: &automation_queue::Model,
    action: &ActionConfig,
    contact: &contacts::Model,
) -> Result<()> {
    let Some(to_email) = action
        .to
        .clone()
        .or_else(|| config.team_notify_email.clone())
    else {
        tracing::warn!(
            "Notify step {} has no recipient and TEAM_NOTIFY_EMAIL is unset, skipping",
            item.step_id
        );
        return Ok(());
    };

    let now = chrono::Utc::now().timestamp_micros();
    let subject = action
        .subject
        .clone()
        .unwrap_or_else(|| format!("Automation alert for {}", contact.email));
    let body = action.body.clone().unwrap_or_else(|| {
        format!(
            "Contact {} reached step {} of automation {}.",
            contact.email, item.step_id, item.automation_id
        )
    });
    let meta = serde_json::json!({
        "source": "automation_notify",
        "automation_id": item.automation_id,
        "step_id": item.step_id,
        "contact_id": contact.id,
        "body": body,
    });

    let mut send = email_sends::ActiveModel::new();
    send.workspace_id = Set(item.workspace_id.clone());
    send.campaign_id = Set(item.automation_id.clone());
    send.to_email = Set(to_email);
    send.subject = Set(subject);
    send.execute_at = Set(now);
    send.meta = Set(meta.to_string());
    send.insert(db).await?;

    Ok(())
}

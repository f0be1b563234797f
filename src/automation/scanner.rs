use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};

use crate::automation::steps::StepGraph;
use crate::database::automation_queue;
use crate::database::automation_runs;
use crate::database::automations::{self, AutomationStatus};
use crate::database::contact_events;
use crate::database::event_cursors::{self, consumer};
use crate::error::Result;
use crate::pipeline::events_after;

pub const MAX_SCAN_LIMIT: u64 = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub processed_events: usize,
    pub started_runs: usize,
}

/// Match one window of new events against the trigger nodes of every
/// Running automation. Each match starts a run pointed at the trigger's
/// successor and enqueues that successor for immediate execution; a
/// trigger with no successor is skipped.
pub async fn run(db: &DatabaseConnection, workspace_id: &str, limit: u64) -> Result<ScanOutcome> {
    let (last_occurred_at, _) =
        event_cursors::load(db, workspace_id, consumer::AUTOMATION_EVENTS).await?;
    let events = events_after(
        db,
        workspace_id,
        last_occurred_at,
        None,
        limit.min(MAX_SCAN_LIMIT),
    )
    .await?;

    if events.is_empty() {
        return Ok(ScanOutcome::default());
    }

    let running = automations::Entity::find()
        .filter(automations::Column::WorkspaceId.eq(workspace_id))
        .filter(automations::Column::Status.eq(AutomationStatus::Running.to_string()))
        .all(db)
        .await?;
    let graphs: Vec<(automations::Model, StepGraph)> = running
        .into_iter()
        .map(|automation| {
            let graph = StepGraph::new(automation.parsed_steps());
            (automation, graph)
        })
        .collect();

    let mut started_runs = 0;
    for event in &events {
        for (automation, graph) in &graphs {
            for (trigger_step, trigger_config) in graph.triggers() {
                if !trigger_config.matches(event) {
                    continue;
                }
                let Some(successor) = graph.successor_of(trigger_step) else {
                    tracing::debug!(
                        "Trigger {} in automation {} has no successor, skipping",
                        trigger_step.id(),
                        automation.id
                    );
                    continue;
                };

                start_run(
                    db,
                    workspace_id,
                    automation,
                    event,
                    trigger_config.kind.as_str(),
                    successor.id(),
                )
                .await?;
                started_runs += 1;
            }
        }
    }

    if let Some(last) = events.last() {
        event_cursors::advance(
            db,
            workspace_id,
            consumer::AUTOMATION_EVENTS,
            last.occurred_at,
            &last.id,
        )
        .await?;
    }

    tracing::debug!(
        "Trigger scan for {}: {} events, {} runs started",
        workspace_id,
        events.len(),
        started_runs
    );
    Ok(ScanOutcome {
        processed_events: events.len(),
        started_runs,
    })
}

/// Create the run and its first queue item together.
async fn start_run(
    db: &DatabaseConnection,
    workspace_id: &str,
    automation: &automations::Model,
    event: &contact_events::Model,
    trigger_kind: &str,
    first_step_id: &str,
) -> Result<()> {
    let now = chrono::Utc::now().timestamp_micros();
    let meta = serde_json::json!({
        "triggered_by_event_id": event.id,
        "trigger_kind": trigger_kind,
    });

    let txn = db.begin().await?;

    let mut run = automation_runs::ActiveModel::new();
    run.workspace_id = Set(workspace_id.to_string());
    run.automation_id = Set(automation.id.clone());
    run.contact_id = Set(event.contact_id.clone());
    run.current_step_id = Set(Some(first_step_id.to_string()));
    run.meta = Set(meta.to_string());
    let run = run.insert(&txn).await?;

    let mut item = automation_queue::ActiveModel::new();
    item.workspace_id = Set(workspace_id.to_string());
    item.run_id = Set(run.id.clone());
    item.automation_id = Set(automation.id.clone());
    item.contact_id = Set(event.contact_id.clone());
    item.step_id = Set(first_step_id.to_string());
    item.execute_at = Set(now);
    item.insert(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        "Started automation run {} (automation {}, contact {}, trigger {})",
        run.id,
        automation.id,
        event.contact_id,
        trigger_kind
    );
    Ok(())
}

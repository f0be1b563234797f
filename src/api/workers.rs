use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error_response;
use crate::automation::{executor, scanner};
use crate::campaign::scheduler;
use crate::config::workspace_or_default;
use crate::email::delivery::MAX_DELIVERY_BATCH;
use crate::error::FlowmailError;
use crate::pipeline::{best_time, lead_score};
use crate::AppState;

pub const RUNNER_TOKEN_HEADER: &str = "x-flowmail-runner-token";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/email-delivery", post(email_delivery))
        .route("/lead-score", post(lead_score_worker))
        .route("/best-time", post(best_time_worker))
        .route("/automation-scan", post(automation_scan))
        .route("/automation-run", post(automation_run))
        .route("/campaign-schedule", post(campaign_schedule))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub workspace_id: Option<String>,
    pub batch: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitRequest {
    pub workspace_id: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub workspace_id: Option<String>,
    pub limit_schedules: Option<u64>,
    pub limit_recipients: Option<u64>,
}

async fn email_delivery(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let workspace_id = workspace_or_default(request.workspace_id);
    let batch = request.batch.unwrap_or(MAX_DELIVERY_BATCH);
    let processed = state
        .delivery
        .process_due_sends(&workspace_id, batch)
        .await
        .map_err(|e| error_response(e.into()))?;
    Ok(Json(json!({ "ok": true, "processed": processed })))
}

async fn lead_score_worker(
    State(state): State<AppState>,
    Json(request): Json<LimitRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let workspace_id = workspace_or_default(request.workspace_id);
    let limit = request.limit.unwrap_or(lead_score::MAX_LEAD_SCORE_LIMIT);
    let outcome = lead_score::run(&state.db, &workspace_id, limit)
        .await
        .map_err(error_response)?;
    Ok(Json(json!({
        "ok": true,
        "processedEvents": outcome.processed_events,
        "updatedContacts": outcome.updated_contacts,
    })))
}

async fn best_time_worker(
    State(state): State<AppState>,
    Json(request): Json<LimitRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let workspace_id = workspace_or_default(request.workspace_id);
    let limit = request.limit.unwrap_or(best_time::MAX_BEST_TIME_LIMIT);
    let outcome = best_time::run(&state.db, &workspace_id, limit)
        .await
        .map_err(error_response)?;
    Ok(Json(json!({
        "ok": true,
        "processedEvents": outcome.processed_events,
        "updatedContacts": outcome.updated_contacts,
    })))
}

async fn automation_scan(
    State(state): State<AppState>,
    Json(request): Json<LimitRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let workspace_id = workspace_or_default(request.workspace_id);
    let limit = request.limit.unwrap_or(scanner::MAX_SCAN_LIMIT);
    let outcome = scanner::run(&state.db, &workspace_id, limit)
        .await
        .map_err(error_response)?;
    Ok(Json(json!({
        "ok": true,
        "processedEvents": outcome.processed_events,
        "startedRuns": outcome.started_runs,
    })))
}

async fn automation_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BatchRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    check_runner_token(&state, &headers).map_err(error_response)?;

    let workspace_id = workspace_or_default(request.workspace_id);
    let batch = request.batch.unwrap_or(executor::MAX_EXECUTION_BATCH);
    let processed = executor::run(&state.db, &state.config, &workspace_id, batch)
        .await
        .map_err(error_response)?;
    Ok(Json(json!({ "ok": true, "processed": processed })))
}

async fn campaign_schedule(
    State(state): State<AppState>,
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let workspace_id = workspace_or_default(request.workspace_id);
    let limit_schedules = request.limit_schedules.unwrap_or(scheduler::MAX_SCHEDULES);
    let limit_recipients = request
        .limit_recipients
        .unwrap_or(scheduler::MAX_RECIPIENTS);
    let processed = scheduler::run(&state.db, &workspace_id, limit_schedules, limit_recipients)
        .await
        .map_err(error_response)?;
    Ok(Json(json!({ "ok": true, "processed": processed })))
}

/// The automation worker is gated by a pre-shared runner token when one
/// is configured; without configuration the endpoint stays open for
/// single-tenant setups.
fn check_runner_token(state: &AppState, headers: &HeaderMap) -> Result<(), FlowmailError> {
    let Some(expected) = &state.config.runner_token else {
        return Ok(());
    };
    let presented = headers
        .get(RUNNER_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    if presented == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(FlowmailError::Unauthorized(
            "invalid runner token".to_string(),
        ))
    }
}

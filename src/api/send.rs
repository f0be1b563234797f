use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::api::error_response;
use crate::campaign::send::{self, BulkOutcome};
use crate::config::workspace_or_default;
use crate::error::FlowmailError;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/campaign", post(send_campaign))
        .route("/bulk", post(send_bulk))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCampaignRequest {
    pub workspace_id: Option<String>,
    pub campaign_id: Option<String>,
    pub max_recipients: Option<u64>,
    pub page_size: Option<u64>,
    pub segment_json: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkSendRequest {
    pub workspace_id: Option<String>,
    #[validate(length(min = 1, message = "subject is required"))]
    pub subject: String,
    #[validate(length(min = 1, message = "body is required"))]
    pub body: String,
    pub contact_ids: Option<Vec<String>>,
    #[serde(default)]
    pub send_immediately: bool,
}

async fn send_campaign(
    State(state): State<AppState>,
    Json(request): Json<SendCampaignRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let workspace_id = workspace_or_default(request.workspace_id);
    let campaign_id = request
        .campaign_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            error_response(FlowmailError::InvalidInput(
                "campaignId is required".to_string(),
            ))
        })?;

    let outcome = send::send_campaign(
        &state.db,
        &workspace_id,
        &campaign_id,
        request
            .max_recipients
            .unwrap_or(send::MAX_CAMPAIGN_RECIPIENTS),
        request.page_size.unwrap_or(send::MAX_PAGE_SIZE),
        request.segment_json.as_deref(),
        request.dry_run,
    )
    .await
    .map_err(error_response)?;

    if outcome.dry_run {
        Ok(Json(json!({
            "ok": true,
            "dryRun": true,
            "eligible": outcome.eligible,
        })))
    } else {
        Ok(Json(json!({ "ok": true, "queued": outcome.queued })))
    }
}

async fn send_bulk(
    State(state): State<AppState>,
    Json(request): Json<BulkSendRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    request
        .validate()
        .map_err(|e| error_response(FlowmailError::InvalidInput(e.to_string())))?;
    let workspace_id = workspace_or_default(request.workspace_id.clone());

    let outcome = send::send_bulk(
        &state.db,
        &state.config,
        &workspace_id,
        &request.subject,
        &request.body,
        request.contact_ids.as_deref(),
        request.send_immediately,
    )
    .await
    .map_err(error_response)?;

    match outcome {
        BulkOutcome::Queued { queued } => Ok(Json(json!({ "ok": true, "queued": queued }))),
        BulkOutcome::Instant { sent, failed } => Ok(Json(json!({
            "ok": true,
            "mode": "instant",
            "sent": sent,
            "failed": failed,
        }))),
    }
}

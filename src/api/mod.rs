pub mod health;
pub mod send;
pub mod tracking;
pub mod workers;

use axum::http::StatusCode;
use axum::{Json, Router};

use crate::error::FlowmailError;
use crate::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(tracking::routes())
        .nest("/workers", workers::routes())
        .nest("/send", send::routes())
}

/// Map worker/send errors onto the response contract: `{error}` plus a
/// status that tells operators which class of failure they are looking
/// at.
pub(crate) fn error_response(e: FlowmailError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &e {
        FlowmailError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        FlowmailError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        FlowmailError::CampaignNotFound(_)
        | FlowmailError::AutomationNotFound(_)
        | FlowmailError::StepNotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": e.to_string() })))
}

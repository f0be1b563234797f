use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use serde::Deserialize;

use crate::database::contact_events::{self, event_type};
use crate::database::{campaigns, contacts, email_sends};
use crate::error::Result;
use crate::AppState;

const FALLBACK_REDIRECT: &str = "https://example.com";

/// 1x1 transparent GIF served for open tracking.
const TRACKING_PIXEL: [u8; 43] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0xFF, 0xFF,
    0xFF, 0x00, 0x00, 0x00, 0x21, 0xF9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3B,
];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/track/open", get(track_open))
        .route("/track/click", get(track_click))
}

#[derive(Debug, Deserialize)]
pub struct OpenQuery {
    pub sid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClickQuery {
    pub sid: Option<String>,
    pub url: Option<String>,
    pub bid: Option<String>,
}

/// Open pixel. Mail-client prefetchers must never see an error here, so
/// any internal failure is logged and the pixel is served regardless.
async fn track_open(State(state): State<AppState>, Query(query): Query<OpenQuery>) -> Response {
    if let Some(sid) = &query.sid {
        if let Err(e) = record_open(&state.db, sid).await {
            tracing::error!("Open tracking for sid {} failed: {}", sid, e);
        }
    }
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/gif"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        TRACKING_PIXEL.to_vec(),
    )
        .into_response()
}

/// Click redirect. Always answers 302, even for unknown sids.
async fn track_click(State(state): State<AppState>, Query(query): Query<ClickQuery>) -> Response {
    let url = query
        .url
        .clone()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_REDIRECT.to_string());

    if let Some(sid) = &query.sid {
        if let Err(e) = record_click(&state.db, sid, &url, query.bid.as_deref()).await {
            tracing::error!("Click tracking for sid {} failed: {}", sid, e);
        }
    }

    (StatusCode::FOUND, [(header::LOCATION, url)]).into_response()
}

/// First open wins: `opened_at` is written once, and the open event and
/// metric bumps ride along with that first write.
async fn record_open(db: &DatabaseConnection, sid: &str) -> Result<()> {
    let Some(send) = email_sends::Entity::find_by_id(sid.to_string()).one(db).await? else {
        return Ok(());
    };
    if send.opened_at.is_some() {
        return Ok(());
    }

    let now = chrono::Utc::now().timestamp_micros();
    let mut update: email_sends::ActiveModel = send.clone().into();
    update.opened_at = Set(Some(now));
    update.updated_at = Set(now);
    update.update(db).await?;

    bump_campaign_metric(db, &send.campaign_id, Metric::Open, now).await?;

    if let Some(contact_id) = &send.contact_id {
        bump_contact_metric(db, contact_id, Metric::Open, now).await?;

        let mut event = contact_events::ActiveModel::new();
        event.workspace_id = Set(send.workspace_id.clone());
        event.contact_id = Set(contact_id.clone());
        event.event_type = Set(event_type::EMAIL_OPEN.to_string());
        event.campaign_id = Set(Some(send.campaign_id.clone()));
        event.meta = Set(serde_json::json!({ "sid": send.id }).to_string());
        event.insert(db).await?;
    }
    Ok(())
}

/// First click sets `clicked_at` and bumps metrics; every click appends
/// a `link_click` event, because heatmap analysis downstream needs the
/// per-click rows.
async fn record_click(
    db: &DatabaseConnection,
    sid: &str,
    url: &str,
    bid: Option<&str>,
) -> Result<()> {
    let Some(send) = email_sends::Entity::find_by_id(sid.to_string()).one(db).await? else {
        return Ok(());
    };

    let now = chrono::Utc::now().timestamp_micros();
    let first = send.clicked_at.is_none();
    if first {
        let mut update: email_sends::ActiveModel = send.clone().into();
        update.clicked_at = Set(Some(now));
        update.updated_at = Set(now);
        update.update(db).await?;

        bump_campaign_metric(db, &send.campaign_id, Metric::Click, now).await?;
        if let Some(contact_id) = &send.contact_id {
            bump_contact_metric(db, contact_id, Metric::Click, now).await?;
        }
    }

    if let Some(contact_id) = &send.contact_id {
        let mut event = contact_events::ActiveModel::new();
        event.workspace_id = Set(send.workspace_id.clone());
        event.contact_id = Set(contact_id.clone());
        event.event_type = Set(event_type::LINK_CLICK.to_string());
        event.campaign_id = Set(Some(send.campaign_id.clone()));
        event.meta = Set(serde_json::json!({
            "sid": send.id,
            "url": url,
            "bid": bid,
            "first": first,
        })
        .to_string());
        event.insert(db).await?;
    }
    Ok(())
}

enum Metric {
    Open,
    Click,
}

async fn bump_contact_metric(
    db: &DatabaseConnection,
    contact_id: &str,
    metric: Metric,
    now: i64,
) -> Result<()> {
    let mut update = contacts::Entity::update_many();
    update = match metric {
        Metric::Open => update
            .col_expr(
                contacts::Column::OpenCount,
                Expr::col(contacts::Column::OpenCount).add(1),
            )
            .col_expr(contacts::Column::LastOpenAt, Expr::value(now)),
        Metric::Click => update
            .col_expr(
                contacts::Column::ClickCount,
                Expr::col(contacts::Column::ClickCount).add(1),
            )
            .col_expr(contacts::Column::LastClickAt, Expr::value(now)),
    };
    update
        .col_expr(contacts::Column::UpdatedAt, Expr::value(now))
        .filter(contacts::Column::Id.eq(contact_id))
        .exec(db)
        .await?;
    Ok(())
}

async fn bump_campaign_metric(
    db: &DatabaseConnection,
    campaign_id: &str,
    metric: Metric,
    now: i64,
) -> Result<()> {
    let mut update = campaigns::Entity::update_many();
    update = match metric {
        Metric::Open => update.col_expr(
            campaigns::Column::OpenCount,
            Expr::col(campaigns::Column::OpenCount).add(1),
        ),
        Metric::Click => update.col_expr(
            campaigns::Column::ClickCount,
            Expr::col(campaigns::Column::ClickCount).add(1),
        ),
    };
    update
        .col_expr(campaigns::Column::UpdatedAt, Expr::value(now))
        .filter(campaigns::Column::Id.eq(campaign_id))
        .exec(db)
        .await?;
    Ok(())
}

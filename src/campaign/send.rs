use futures::{stream, StreamExt};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::database::campaigns::{self, CampaignStatus};
use crate::database::{contacts, email_sends, ensure_bulk_campaign, workspace_settings};
use crate::email::gateway::ResendClient;
use crate::email::Renderer;
use crate::error::{FlowmailError, Result};
use crate::segment;

pub const MAX_CAMPAIGN_RECIPIENTS: u64 = 10_000;
pub const MAX_PAGE_SIZE: u64 = 1_000;
pub const MAX_INSTANT_RECIPIENTS: usize = 50;
const INSTANT_CONCURRENCY: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct SendCampaignOutcome {
    pub queued: usize,
    pub eligible: usize,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum BulkOutcome {
    Queued { queued: usize },
    Instant { sent: usize, failed: usize },
}

/// Immediate enqueue of one campaign: what the scheduler does, minus the
/// schedule-keyed upsert guard. Callers are responsible for not invoking
/// it twice.
pub async fn send_campaign(
    db: &DatabaseConnection,
    workspace_id: &str,
    campaign_id: &str,
    max_recipients: u64,
    page_size: u64,
    segment_json: Option<&str>,
    dry_run: bool,
) -> Result<SendCampaignOutcome> {
    let campaign = campaigns::Entity::find_by_id(campaign_id.to_string())
        .one(db)
        .await?
        .filter(|c| c.workspace_id == workspace_id)
        .ok_or_else(|| FlowmailError::CampaignNotFound(campaign_id.to_string()))?;

    let max_recipients = max_recipients.min(MAX_CAMPAIGN_RECIPIENTS) as usize;
    let page_size = page_size.min(MAX_PAGE_SIZE).max(1);
    let segment = segment::parse(segment_json);

    let mut recipients: Vec<contacts::Model> = Vec::new();
    let mut offset = 0u64;
    loop {
        let page = contacts::Entity::find()
            .filter(contacts::Column::WorkspaceId.eq(workspace_id))
            .order_by_asc(contacts::Column::Id)
            .offset(offset)
            .limit(page_size)
            .all(db)
            .await?;
        let page_len = page.len() as u64;

        for contact in page {
            if !contact.is_eligible() {
                continue;
            }
            if let Some(segment) = &segment {
                if !segment::matches(segment, &contact) {
                    continue;
                }
            }
            recipients.push(contact);
            if recipients.len() >= max_recipients {
                break;
            }
        }

        if recipients.len() >= max_recipients || page_len < page_size {
            break;
        }
        offset += page_size;
    }

    if dry_run {
        return Ok(SendCampaignOutcome {
            queued: 0,
            eligible: recipients.len(),
            dry_run: true,
        });
    }

    let subject = campaign
        .subject
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| campaign.name.clone());
    let now = chrono::Utc::now().timestamp_micros();
    for contact in &recipients {
        let mut send = email_sends::ActiveModel::new();
        send.workspace_id = Set(workspace_id.to_string());
        send.campaign_id = Set(campaign.id.clone());
        send.contact_id = Set(Some(contact.id.clone()));
        send.to_email = Set(contact.email.clone());
        send.subject = Set(subject.clone());
        send.execute_at = Set(now);
        send.meta = Set(serde_json::json!({"source": "campaign"}).to_string());
        send.insert(db).await?;
    }

    campaigns::Entity::update_many()
        .col_expr(
            campaigns::Column::Status,
            Expr::value(CampaignStatus::Sent.to_string()),
        )
        .col_expr(campaigns::Column::UpdatedAt, Expr::value(now))
        .filter(campaigns::Column::Id.eq(campaign.id.clone()))
        .exec(db)
        .await?;

    tracing::info!(
        "Campaign {} queued {} sends",
        campaign.id,
        recipients.len()
    );
    Ok(SendCampaignOutcome {
        queued: recipients.len(),
        eligible: recipients.len(),
        dry_run: false,
    })
}

/// Ad-hoc blast against the workspace's well-known bulk campaign.
/// Queued mode defers to the delivery worker; instant mode posts through
/// the Resend API with bounded concurrency and records each outcome.
pub async fn send_bulk(
    db: &DatabaseConnection,
    config: &Config,
    workspace_id: &str,
    subject: &str,
    body: &str,
    contact_ids: Option<&[String]>,
    send_immediately: bool,
) -> Result<BulkOutcome> {
    let campaign = ensure_bulk_campaign(db, workspace_id).await?;

    let mut query = contacts::Entity::find()
        .filter(contacts::Column::WorkspaceId.eq(workspace_id));
    if let Some(ids) = contact_ids {
        query = query.filter(contacts::Column::Id.is_in(ids.iter().cloned()));
    }
    let recipients: Vec<contacts::Model> = query
        .order_by_asc(contacts::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .filter(|c| c.is_eligible())
        .collect();

    if !send_immediately {
        let now = chrono::Utc::now().timestamp_micros();
        let meta = serde_json::json!({"source": "bulk", "body": body}).to_string();
        for contact in &recipients {
            let mut send = email_sends::ActiveModel::new();
            send.workspace_id = Set(workspace_id.to_string());
            send.campaign_id = Set(campaign.id.clone());
            send.contact_id = Set(Some(contact.id.clone()));
            send.to_email = Set(contact.email.clone());
            send.subject = Set(subject.to_string());
            send.execute_at = Set(now);
            send.meta = Set(meta.clone());
            send.insert(db).await?;
        }
        return Ok(BulkOutcome::Queued {
            queued: recipients.len(),
        });
    }

    let api_key = config.resend_api_key.as_deref().ok_or_else(|| {
        FlowmailError::Config("RESEND_API_KEY is required for immediate bulk sending".to_string())
    })?;
    if recipients.len() > MAX_INSTANT_RECIPIENTS {
        return Err(FlowmailError::InvalidInput(format!(
            "Immediate bulk sends are capped at {MAX_INSTANT_RECIPIENTS} recipients, got {}",
            recipients.len()
        )));
    }

    let renderer = Arc::new(Renderer::new()?);
    let resend = Arc::new(ResendClient::new(api_key));
    let (company_name, from_email) = workspace_settings::sender_for(db, workspace_id, config).await?;
    let from = format!("\"{company_name}\" <{from_email}>");

    let outcomes: Vec<(contacts::Model, std::result::Result<String, String>)> =
        stream::iter(recipients)
            .map(|contact| {
                let renderer = renderer.clone();
                let resend = resend.clone();
                let from = from.clone();
                let company_name = company_name.clone();
                let subject = subject.to_string();
                let body = body.to_string();
                async move {
                    let mut vars = HashMap::new();
                    vars.insert(
                        "firstName".to_string(),
                        contact.first_name.clone().unwrap_or_default(),
                    );
                    vars.insert(
                        "lastName".to_string(),
                        contact.last_name.clone().unwrap_or_default(),
                    );
                    vars.insert("email".to_string(), contact.email.clone());
                    vars.insert("companyName".to_string(), company_name.clone());
                    vars.insert("senderName".to_string(), company_name);

                    let html = renderer.render_plain(&body, &vars);
                    let rendered_subject = renderer.substitute(&subject, &vars);
                    let result = resend
                        .send(&from, &contact.email, &rendered_subject, &html)
                        .await
                        .map_err(|e| e.to_string());
                    (contact, result)
                }
            })
            .buffer_unordered(INSTANT_CONCURRENCY)
            .collect()
            .await;

    let mut sent = 0;
    let mut failed = 0;
    let now = chrono::Utc::now().timestamp_micros();
    for (contact, result) in outcomes {
        let mut send = email_sends::ActiveModel::new();
        send.workspace_id = Set(workspace_id.to_string());
        send.campaign_id = Set(campaign.id.clone());
        send.contact_id = Set(Some(contact.id.clone()));
        send.to_email = Set(contact.email.clone());
        send.subject = Set(subject.to_string());
        send.execute_at = Set(now);
        match result {
            Ok(message_id) => {
                sent += 1;
                send.status = Set(email_sends::SendStatus::Sent.to_string());
                send.sent_at = Set(Some(now));
                send.provider_message_id = Set(if message_id.is_empty() {
                    None
                } else {
                    Some(message_id)
                });
                send.meta = Set(serde_json::json!({"source": "bulk_instant"}).to_string());
            }
            Err(error) => {
                failed += 1;
                send.status = Set(email_sends::SendStatus::Failed.to_string());
                send.meta = Set(
                    serde_json::json!({"source": "bulk_instant", "error": error}).to_string(),
                );
            }
        }
        send.insert(db).await?;
    }

    tracing::info!(
        "Instant bulk send for {}: {} sent, {} failed",
        workspace_id,
        sent,
        failed
    );
    Ok(BulkOutcome::Instant { sent, failed })
}

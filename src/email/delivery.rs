use governor::{
    clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use sea_orm::sea_query::Expr;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::config::Config;
use crate::database::{campaigns, contacts, email_sends, workspace_settings};
use crate::email::gateway::{MailGateway, OutboundMessage};
use crate::email::render::{parse_blocks, Renderer};
use crate::email::unsubscribe::{self, UnsubscribeClaims};
use crate::email::EmailError;

pub const MAX_DELIVERY_BATCH: u64 = 25;

/// Drains due `email_sends` rows: claim, render, post to the SMTP
/// gateway, and record the outcome. Row outcomes are independent; a
/// failed render or gateway error marks that row failed and the batch
/// moves on. There is no automatic failed -> queued retry.
pub struct DeliveryWorker {
    db: Arc<DatabaseConnection>,
    config: Arc<Config>,
    gateway: MailGateway,
    renderer: Renderer,
    rate_limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl DeliveryWorker {
    pub fn new(db: Arc<DatabaseConnection>, config: Arc<Config>) -> Result<Self, EmailError> {
        let gateway = MailGateway::new(
            &config.mail_gateway_url,
            config.mail_gateway_token.as_deref(),
        );
        let renderer = Renderer::new()?;

        let per_minute = NonZeroU32::new(config.rate_limit_per_minute.max(1))
            .ok_or_else(|| EmailError::config("rate limit must be positive"))?;
        let burst = NonZeroU32::new(config.rate_limit_burst.max(1))
            .ok_or_else(|| EmailError::config("burst limit must be positive"))?;
        let quota = Quota::per_minute(per_minute).allow_burst(burst);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            db,
            config,
            gateway,
            renderer,
            rate_limiter,
        })
    }

    /// Process up to `batch` due sends for one workspace. Returns the
    /// number of rows that reached a terminal status this invocation.
    pub async fn process_due_sends(
        &self,
        workspace_id: &str,
        batch: u64,
    ) -> Result<usize, EmailError> {
        let now = chrono::Utc::now().timestamp_micros();
        let due = email_sends::Entity::find()
            .filter(email_sends::Column::WorkspaceId.eq(workspace_id))
            .filter(email_sends::Column::Status.eq(email_sends::SendStatus::Queued.to_string()))
            .filter(email_sends::Column::ExecuteAt.lte(now))
            .order_by_asc(email_sends::Column::ExecuteAt)
            .limit(batch.min(MAX_DELIVERY_BATCH))
            .all(&*self.db)
            .await?;

        let mut processed = 0;
        for send in due {
            if !self.claim(&send.id).await? {
                // Another invocation got there first.
                continue;
            }

            if self.rate_limiter.check().is_err() {
                tracing::debug!("Send rate limit reached, deferring {} to next tick", send.id);
                self.requeue(&send.id).await?;
                break;
            }

            match self.deliver(&send).await {
                Ok(message_id) => {
                    self.mark_sent(&send, &message_id).await?;
                    processed += 1;
                }
                Err(e) => {
                    tracing::error!("Delivery of send {} failed: {}", send.id, e);
                    self.mark_failed(&send, &e.to_string()).await?;
                    processed += 1;
                }
            }
        }

        Ok(processed)
    }

    /// The per-row claim. A second claimer sees a non-queued row and
    /// moves on.
    async fn claim(&self, send_id: &str) -> Result<bool, EmailError> {
        let now = chrono::Utc::now().timestamp_micros();
        let result = email_sends::Entity::update_many()
            .col_expr(
                email_sends::Column::Status,
                Expr::value(email_sends::SendStatus::Processing.to_string()),
            )
            .col_expr(email_sends::Column::UpdatedAt, Expr::value(now))
            .filter(email_sends::Column::Id.eq(send_id))
            .filter(email_sends::Column::Status.eq(email_sends::SendStatus::Queued.to_string()))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn requeue(&self, send_id: &str) -> Result<(), EmailError> {
        let now = chrono::Utc::now().timestamp_micros();
        email_sends::Entity::update_many()
            .col_expr(
                email_sends::Column::Status,
                Expr::value(email_sends::SendStatus::Queued.to_string()),
            )
            .col_expr(email_sends::Column::UpdatedAt, Expr::value(now))
            .filter(email_sends::Column::Id.eq(send_id))
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    async fn deliver(&self, send: &email_sends::Model) -> Result<String, EmailError> {
        let campaign = campaigns::Entity::find_by_id(send.campaign_id.clone())
            .one(&*self.db)
            .await?;
        let (company_name, default_from) =
            workspace_settings::sender_for(&*self.db, &send.workspace_id, &self.config).await?;

        let contact = match &send.contact_id {
            Some(contact_id) => {
                contacts::Entity::find_by_id(contact_id.clone())
                    .one(&*self.db)
                    .await?
            }
            None => None,
        };

        let vars = self.template_vars(send, contact.as_ref(), &company_name);
        let mut html = self.render_html(send, campaign.as_ref(), &vars);

        if let Some(base_url) = &self.config.public_base_url {
            html = self.renderer.apply_tracking(&html, base_url, &send.id);
            if let (Some(key), Some(contact_id)) =
                (&self.config.unsubscribe_signing_key, &send.contact_id)
            {
                let claims = UnsubscribeClaims::new(&send.workspace_id, contact_id);
                let token = unsubscribe::sign(&claims, key)?;
                html.push_str(&self.renderer.unsubscribe_footer(base_url, &token));
            }
        }

        let from_email = send.from_email.clone().unwrap_or(default_from);
        let subject = self.renderer.substitute(&send.subject, &vars);
        let message = OutboundMessage {
            to: send.to_email.clone(),
            subject,
            html,
            from: Some(format!("\"{company_name}\" <{from_email}>")),
        };

        self.gateway.send(&message).await
    }

    fn template_vars(
        &self,
        send: &email_sends::Model,
        contact: Option<&contacts::Model>,
        company_name: &str,
    ) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert(
            "firstName".to_string(),
            contact
                .and_then(|c| c.first_name.clone())
                .unwrap_or_default(),
        );
        vars.insert(
            "lastName".to_string(),
            contact
                .and_then(|c| c.last_name.clone())
                .unwrap_or_default(),
        );
        vars.insert("email".to_string(), send.to_email.clone());
        vars.insert("companyName".to_string(), company_name.to_string());
        vars.insert("senderName".to_string(), company_name.to_string());
        vars
    }

    fn render_html(
        &self,
        send: &email_sends::Model,
        campaign: Option<&campaigns::Model>,
        vars: &HashMap<String, String>,
    ) -> String {
        if let Some(campaign) = campaign {
            let blocks = parse_blocks(&campaign.email_blocks);
            if !blocks.is_empty() {
                return self.renderer.render_blocks(&blocks, vars);
            }
            if let Some(body) = &campaign.body {
                return self.renderer.render_plain(body, vars);
            }
        }
        // Automation and notify sends carry their body in meta.
        let meta = send.meta_value();
        let body = meta
            .get("body")
            .and_then(|b| b.as_str())
            .unwrap_or_default();
        self.renderer.render_plain(body, vars)
    }

    async fn mark_sent(
        &self,
        send: &email_sends::Model,
        message_id: &str,
    ) -> Result<(), EmailError> {
        let now = chrono::Utc::now().timestamp_micros();
        let mut update: email_sends::ActiveModel = send.clone().into();
        update.status = Set(email_sends::SendStatus::Sent.to_string());
        update.sent_at = Set(Some(now));
        update.provider_message_id = Set(if message_id.is_empty() {
            None
        } else {
            Some(message_id.to_string())
        });
        update.updated_at = Set(now);
        update.update(&*self.db).await?;

        campaigns::Entity::update_many()
            .col_expr(
                campaigns::Column::SentCount,
                Expr::col(campaigns::Column::SentCount).add(1),
            )
            .col_expr(campaigns::Column::UpdatedAt, Expr::value(now))
            .filter(campaigns::Column::Id.eq(send.campaign_id.clone()))
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    async fn mark_failed(&self, send: &email_sends::Model, error: &str) -> Result<(), EmailError> {
        let now = chrono::Utc::now().timestamp_micros();
        let mut meta = send.meta_value();
        if !meta.is_object() {
            meta = serde_json::json!({});
        }
        meta["error"] = serde_json::Value::String(error.to_string());

        let mut update: email_sends::ActiveModel = send.clone().into();
        update.status = Set(email_sends::SendStatus::Failed.to_string());
        update.meta = Set(meta.to_string());
        update.updated_at = Set(now);
        update.update(&*self.db).await?;
        Ok(())
    }
}

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::email::EmailError;

const GATEWAY_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    #[serde(rename = "messageId")]
    message_id: Option<String>,
}

/// Stateless adapter for the HTTP SMTP gateway:
/// `POST {base}/send {to, subject, html, from?} -> {messageId}`.
pub struct MailGateway {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl MailGateway {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(|t| t.to_string()),
        }
    }

    pub async fn send(&self, message: &OutboundMessage) -> Result<String, EmailError> {
        let mut request = self
            .client
            .post(format!("{}/send", self.base_url))
            .json(message)
            .timeout(Duration::from_secs(GATEWAY_TIMEOUT_SECS));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::GatewayError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GatewayResponse = response.json().await.unwrap_or(GatewayResponse {
            message_id: None,
        });
        Ok(parsed.message_id.unwrap_or_default())
    }
}

/// Transactional client for the Resend API, used only by the bulk
/// immediate send path.
pub struct ResendClient {
    client: Client,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    id: Option<String>,
}

impl ResendClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn send(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        html: &str,
    ) -> Result<String, EmailError> {
        let response = self
            .client
            .post("https://api.resend.com/emails")
            .bearer_auth(&self.api_key)
            .json(&ResendRequest {
                from,
                to: vec![to],
                subject,
                html,
            })
            .timeout(Duration::from_secs(GATEWAY_TIMEOUT_SECS))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::GatewayError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ResendResponse = response.json().await.unwrap_or(ResendResponse { id: None });
        Ok(parsed.id.unwrap_or_default())
    }
}

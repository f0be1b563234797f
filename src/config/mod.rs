use crate::error::FlowmailError;
use std::env;

pub const DEFAULT_WORKSPACE: &str = "default";

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub mail_gateway_url: String,
    pub mail_gateway_token: Option<String>,
    pub public_base_url: Option<String>,
    pub unsubscribe_signing_key: Option<String>,
    pub default_from_email: String,
    pub default_from_name: String,
    pub team_notify_email: Option<String>,
    pub runner_token: Option<String>,
    pub resend_api_key: Option<String>,
    pub rate_limit_per_minute: u32,
    pub rate_limit_burst: u32,
    pub ticks: TickConfig,
}

/// Intervals for the background worker loops, in seconds.
#[derive(Clone, Debug)]
pub struct TickConfig {
    pub delivery_secs: u64,
    pub pipeline_secs: u64,
    pub automation_secs: u64,
    pub scheduler_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, FlowmailError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:data/flowmail.db?mode=rwc".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3900".to_string())
            .parse()
            .map_err(|_| FlowmailError::Config("Invalid PORT value".to_string()))?;

        let mail_gateway_url = env::var("MAIL_GATEWAY_URL").map_err(|_| {
            FlowmailError::Config("MAIL_GATEWAY_URL environment variable is required".to_string())
        })?;
        let mail_gateway_token = env::var("MAIL_GATEWAY_TOKEN").ok();

        let public_base_url = env::var("PUBLIC_FUNCTIONS_BASE_URL")
            .ok()
            .map(|url| url.trim_end_matches('/').to_string());
        let unsubscribe_signing_key = env::var("UNSUBSCRIBE_SIGNING_KEY").ok();

        let default_from_email = env::var("DEFAULT_FROM_EMAIL")
            .unwrap_or_else(|_| "hello@flowmail.local".to_string());
        let default_from_name =
            env::var("DEFAULT_FROM_NAME").unwrap_or_else(|_| "FlowMail".to_string());
        let team_notify_email = env::var("TEAM_NOTIFY_EMAIL").ok();

        let runner_token = env::var("FLOWMAIL_RUNNER_TOKEN").ok();
        let resend_api_key = env::var("RESEND_API_KEY").ok();

        let rate_limit_per_minute = env::var("SMTP_RATE_LIMIT_PER_MINUTE")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|_| {
                FlowmailError::Config("Invalid SMTP_RATE_LIMIT_PER_MINUTE value".to_string())
            })?;
        let rate_limit_burst = env::var("SMTP_BURST_LIMIT")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| FlowmailError::Config("Invalid SMTP_BURST_LIMIT value".to_string()))?;

        let ticks = TickConfig {
            delivery_secs: tick_from_env("FM_DELIVERY_TICK_SECS", 5)?,
            pipeline_secs: tick_from_env("FM_PIPELINE_TICK_SECS", 15)?,
            automation_secs: tick_from_env("FM_AUTOMATION_TICK_SECS", 5)?,
            scheduler_secs: tick_from_env("FM_SCHEDULER_TICK_SECS", 60)?,
        };

        // Ensure data directory exists for sqlite databases
        if let Some(db_path_str) = database_url.strip_prefix("sqlite:") {
            if let Some(db_path) = db_path_str.split('?').next() {
                if let Some(parent) = std::path::Path::new(db_path).parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        FlowmailError::Config(format!("Failed to create data directory: {e}"))
                    })?;
                }
            }
        }

        Ok(Config {
            database_url,
            port,
            mail_gateway_url,
            mail_gateway_token,
            public_base_url,
            unsubscribe_signing_key,
            default_from_email,
            default_from_name,
            team_notify_email,
            runner_token,
            resend_api_key,
            rate_limit_per_minute,
            rate_limit_burst,
            ticks,
        })
    }
}

fn tick_from_env(var: &str, default_secs: u64) -> Result<u64, FlowmailError> {
    env::var(var)
        .unwrap_or_else(|_| default_secs.to_string())
        .parse()
        .map_err(|_| FlowmailError::Config(format!("Invalid {var} value")))
}

/// Resolve the workspace for a request, defaulting to the single-tenant
/// `"default"` workspace when callers do not pass one.
pub fn workspace_or_default(workspace_id: Option<String>) -> String {
    match workspace_id {
        Some(ws) if !ws.trim().is_empty() => ws,
        _ => DEFAULT_WORKSPACE.to_string(),
    }
}

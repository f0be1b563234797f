use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowmailError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Email error: {0}")]
    Email(#[from] crate::email::EmailError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Campaign not found: {0}")]
    CampaignNotFound(String),

    #[error("Automation not found: {0}")]
    AutomationNotFound(String),

    #[error("Step not found in automation {automation_id}: {step_id}")]
    StepNotFound {
        automation_id: String,
        step_id: String,
    },
}

pub type Result<T> = std::result::Result<T, FlowmailError>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Mail gateway configuration error: {message}")]
    ConfigError { message: String },

    #[error("Email rendering error: {message}")]
    RenderError { message: String },

    #[error("Mail gateway returned {status}: {body}")]
    GatewayError { status: u16, body: String },

    #[error("Mail gateway request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Unsubscribe token error: {message}")]
    TokenError { message: String },
}

impl EmailError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::RenderError {
            message: message.into(),
        }
    }

    pub fn token(message: impl Into<String>) -> Self {
        Self::TokenError {
            message: message.into(),
        }
    }
}

// Error types shared by the integration and storage layers

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AyumiError>;

#[derive(Debug, Error)]
pub enum AyumiError {
    /// Bad user input; the message is shown as-is
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{service} API error: {message}")]
    Api { service: &'static str, message: String },

    #[error("Firestore error: {0}")]
    Database(String),

    /// Firestore gave up on a transaction because of contention; safe to retry
    #[error("Firestore transaction aborted: {0}")]
    Aborted(String),

    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Chart or heatmap rendering failed
    #[error("Render error: {0}")]
    Render(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AyumiError {
    pub fn api(service: &'static str, message: impl Into<String>) -> Self {
        Self::Api {
            service,
            message: message.into(),
        }
    }

    /// Whether the message is meant for the person who ran the command
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound(_))
    }

    /// Text safe to send back to Discord
    pub fn user_message(&self) -> String {
        if self.is_user_facing() {
            format!("❌ {}", self)
        } else {
            "❌ Something went wrong, please try again later.".to_string()
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AyumiError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Authentication(err.to_string())
    }
}

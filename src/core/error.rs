use std::fmt;

/// Application-wide Result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Main application error type
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Validation errors for business rules (bad payment selection, nothing due)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Financial data that does not reconcile (negative effective fee,
    /// semester total disagreeing with its breakdown). Fatal for the
    /// affected assignment; computation halts instead of guessing.
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// Payment gateway errors (order creation, signature verification)
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// A balance changed between read and write; retryable after re-fetch
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database operation errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

// Helper functions for common error scenarios
impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn data_integrity(msg: impl Into<String>) -> Self {
        AppError::DataIntegrity(msg.into())
    }

    pub fn gateway(msg: impl Into<String>) -> Self {
        AppError::Gateway(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    /// Whether the caller may retry after re-fetching payment status
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }

    /// Message suitable for showing to the payer.
    ///
    /// Validation, gateway and conflict errors carry actionable detail.
    /// Integrity and infrastructure errors indicate a data problem beyond
    /// the payer's control and map to a generic message.
    pub fn user_message(&self) -> UserMessage<'_> {
        UserMessage(self)
    }
}

/// Display adapter for payer-facing error text
pub struct UserMessage<'a>(&'a AppError);

impl fmt::Display for UserMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            AppError::Validation(msg) | AppError::Gateway(msg) | AppError::Conflict(msg) => {
                write!(f, "{}", msg)
            }
            AppError::NotFound(resource) => write!(f, "{} was not found", resource),
            _ => write!(
                f,
                "There is a problem with your fee records. Please contact the administration office."
            ),
        }
    }
}

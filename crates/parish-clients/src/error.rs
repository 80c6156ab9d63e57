//! Client Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

/// Outbound client errors. The provider-specific variants carry the raw
/// response body so operators see what the dependency actually said.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Record store responded with a non-success status
    #[error("record store error: {0}")]
    Store(String),

    /// Email provider responded with a non-success status
    #[error("email provider error: {0}")]
    Email(String),

    /// Payment provider responded with a non-success status
    #[error("payment provider error: {0}")]
    PaymentLink(String),

    /// Transport-level failure
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body did not parse
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

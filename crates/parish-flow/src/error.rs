//! Flow Error Types

use parish_clients::ClientError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, FlowError>;

/// Workflow errors.
#[derive(Error, Debug)]
pub enum FlowError {
    /// Required credentials are missing from the environment
    #[error("configuration error: {0}")]
    Config(String),

    /// Registration record not found after exhausting the retry budget
    #[error("record with {field} \"{value}\" not found after {attempts} attempts")]
    NotFound {
        field: String,
        value: String,
        attempts: u32,
    },

    /// The record exists but carries no email address
    #[error("user email not found in registration record")]
    MissingEmail,

    /// A downstream dependency failed
    #[error(transparent)]
    Client(#[from] ClientError),
}

//! Application State

use std::sync::Arc;

use parish_clients::{AsaasClient, Mailer, NotifySink, RecordStore};
use parish_core::{AppConfig, RetryPolicy};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration read once at startup
    pub config: Arc<AppConfig>,

    /// Registration record store (None if not configured)
    pub store: Option<Arc<dyn RecordStore>>,

    /// Transactional email client (None if not configured)
    pub mailer: Option<Arc<dyn Mailer>>,

    /// Payment-link client (None if not configured)
    pub paylinks: Option<Arc<AsaasClient>>,

    /// Notification sink (no-op when the webhook URL is unset)
    pub sink: Arc<dyn NotifySink>,

    /// Retry policy for lookups racing the intake form's writes
    pub retry: RetryPolicy,
}

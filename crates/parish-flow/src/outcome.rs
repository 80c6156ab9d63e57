//! Workflow Outcome
//!
//! The transient result of a fulfillment run, returned to the HTTP
//! caller and mirrored to the notification sink. Never persisted.

use serde::Serialize;

/// Result of fulfilling one confirmed (or exempt) registration.
///
/// `status_updated` and `email_sent` move independently: the status patch
/// runs exactly once on every path that found the record, even when the
/// email leg fails or is skipped by the sentinel tag.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentOutcome {
    pub success: bool,
    pub error: Option<String>,
    pub status_updated: bool,
    pub email_sent: bool,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
}

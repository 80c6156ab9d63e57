//! # parish-core
//!
//! Domain logic for the church event-registration and payment service:
//! webhook payload normalization, registration-id extraction, price
//! quoting and the retry policy for eventually-consistent record lookups.
//!
//! Everything here is pure or near-pure; the outbound HTTP clients live
//! in `parish-clients` and the orchestration in `parish-flow`.

pub mod config;
pub mod event;
pub mod extract;
pub mod pricing;
pub mod retry;

pub use config::{AppConfig, DonationConfig, EventConfig, StoreSchema};
pub use event::{PaymentEvent, WebhookPayload};
pub use pricing::{BillingType, Quote};
pub use retry::RetryPolicy;

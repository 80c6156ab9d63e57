//! # parish-clients
//!
//! Outbound HTTP capability layer for the registration service: the
//! record store (registration table), the transactional email provider,
//! the payment-link provider and the best-effort team notification sink.
//!
//! Each capability is a trait with an HTTP implementation and an
//! in-memory one, so the flows in `parish-flow` can be exercised without
//! a network.

pub mod error;
pub mod mail;
pub mod notify;
pub mod paylink;
pub mod records;

pub use error::{ClientError, Result};
pub use mail::{Mailer, MemoryMailer, OutboundEmail, ResendMailer};
pub use notify::{MemorySink, NotifySink, PaymentLogEntry, SlackSink};
pub use paylink::{AsaasClient, LinkCallback, PaymentLink, PaymentLinkRequest};
pub use records::{AirtableStore, MemoryRecordStore, Record, RecordStore};

//! # parish-flow
//!
//! The workflows of the registration service, orchestrating the clients
//! from `parish-clients` over the domain logic in `parish-core`:
//!
//! - [`ConfirmationFlow`] - the payment-confirmation webhook workflow:
//!   classify the event, extract the registration id, look up the
//!   record, send the confirmation email at most once, patch the status.
//! - [`RegistrationFlow`] - post-intake emails: the payment-link email
//!   and the exempt-registration fulfillment.
//! - [`LinkFlow`] / [`StoreLinkFlow`] - payment-link generation and
//!   writing the link back onto the registration record.
//!
//! No flow keeps state between invocations; every run is one linear
//! sequence of awaited client calls.

mod lookup;

pub mod confirmation;
pub mod error;
pub mod links;
pub mod outcome;
pub mod registration;

pub use confirmation::{ConfirmationFlow, Disposition};
pub use error::{FlowError, Result};
pub use links::{LinkFlow, StoreLinkFlow};
pub use outcome::FulfillmentOutcome;
pub use registration::{ExemptParams, RegistrationEmailResult, RegistrationFlow, RegistrationParams};

//! Inbound Payment Events
//!
//! The payment provider delivers a polymorphic webhook body: payment
//! fields appear either nested under a `payment` key or at the top level,
//! depending on the event. Normalization produces one canonical
//! [`PaymentEvent`] so the workflow never branches on payload shape.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Payment fields as the provider sends them, nested or top-level.
/// Every field is optional; absent fields never fail deserialization.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaymentFields {
    pub id: Option<String>,
    pub status: Option<String>,
    pub value: Option<Decimal>,
    pub description: Option<String>,
    pub name: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub billing_type: Option<String>,
    pub due_date: Option<String>,
}

/// Raw webhook body.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebhookPayload {
    pub event: Option<String>,
    pub action: Option<String>,
    pub payment: Option<PaymentFields>,
    #[serde(flatten)]
    pub top: PaymentFields,
}

impl WebhookPayload {
    /// Normalize into a canonical event: nested `payment.*` fields win,
    /// top-level fields of the same name are the fallback, absent fields
    /// resolve to `None` or the empty string.
    pub fn normalize(&self) -> PaymentEvent {
        let nested = self.payment.clone().unwrap_or_default();
        let top = &self.top;

        let pick = |a: &Option<String>, b: &Option<String>| a.clone().or_else(|| b.clone());

        PaymentEvent {
            event_type: self
                .event
                .clone()
                .or_else(|| self.action.clone())
                .unwrap_or_default(),
            status: pick(&nested.status, &top.status).unwrap_or_default(),
            amount: nested.value.or(top.value),
            description: pick(&nested.description, &top.description).unwrap_or_default(),
            name: pick(&nested.name, &top.name).unwrap_or_default(),
            payment_id: pick(&nested.id, &top.id),
            customer_name: pick(&nested.customer_name, &top.customer_name),
            customer_email: pick(&nested.customer_email, &top.customer_email),
            billing_type: pick(&nested.billing_type, &top.billing_type),
            due_date: pick(&nested.due_date, &top.due_date),
        }
    }
}

/// Canonical, normalized payment event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PaymentEvent {
    pub event_type: String,
    pub status: String,
    pub amount: Option<Decimal>,
    pub description: String,
    pub name: String,
    pub payment_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub billing_type: Option<String>,
    pub due_date: Option<String>,
}

impl PaymentEvent {
    /// Whether this event represents a confirmed (final or near-final)
    /// payment. Provider semantics: confirmation can arrive either as a
    /// dedicated event type or as a status on a generic event.
    pub fn is_confirmed(&self) -> bool {
        matches!(
            self.event_type.as_str(),
            "PAYMENT_CONFIRMED" | "PAYMENT_RECEIVED"
        ) || matches!(
            self.status.as_str(),
            "CONFIRMED" | "RECEIVED" | "RECEIVED_IN_CASH_OFFLINE"
        )
    }
}

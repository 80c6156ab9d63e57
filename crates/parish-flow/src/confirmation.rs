//! Payment-Confirmation Workflow
//!
//! The webhook workflow for the payment provider: classify the inbound
//! event, recover the registration id from the charge text, look up the
//! registration record, send the confirmation email at most once (guarded
//! by a sentinel tag on the record), patch the record status and report.
//!
//! The lookup and the later patch are not atomic: two near-simultaneous
//! deliveries for the same id can both pass the tag check before either
//! writes the sentinel, so at-most-one-email is best-effort.

use std::sync::Arc;

use parish_clients::{
    Mailer, NotifySink, OutboundEmail, PaymentLogEntry, Record, RecordStore,
};
use parish_core::config::StoreSchema;
use parish_core::event::{PaymentEvent, WebhookPayload};
use parish_core::extract;
use serde_json::{Map, Value};

use crate::error::{FlowError, Result};
use crate::outcome::FulfillmentOutcome;

/// How the workflow disposed of one webhook delivery.
#[derive(Clone, Debug)]
pub enum Disposition {
    /// Intermediate provider event; nothing to do yet
    NotConfirmed { event_type: String, status: String },

    /// Confirmed payment with no registration id: a plain donation
    NotRegistration,

    /// Confirmed registration payment, processed end to end
    Processed {
        inscription_id: String,
        outcome: FulfillmentOutcome,
    },
}

pub struct ConfirmationFlow {
    store: Option<Arc<dyn RecordStore>>,
    mailer: Option<Arc<dyn Mailer>>,
    sink: Arc<dyn NotifySink>,
    schema: StoreSchema,
    sender: String,
}

impl ConfirmationFlow {
    pub fn new(
        store: Option<Arc<dyn RecordStore>>,
        mailer: Option<Arc<dyn Mailer>>,
        sink: Arc<dyn NotifySink>,
        schema: StoreSchema,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            store,
            mailer,
            sink,
            schema,
            sender: sender.into(),
        }
    }

    /// Run the full pipeline for one webhook delivery.
    pub async fn handle(&self, payload: &WebhookPayload) -> Result<Disposition> {
        let event = payload.normalize();

        if !event.is_confirmed() {
            let mut entry = log_entry(&event);
            entry.error = Some("Payment not confirmed yet, skipping".into());
            self.sink.post(&entry).await;

            return Ok(Disposition::NotConfirmed {
                event_type: event.event_type,
                status: event.status,
            });
        }

        let inscription_id = extract::inscription_id(&event.description)
            .or_else(|| extract::inscription_id(&event.name));

        let Some(inscription_id) = inscription_id else {
            // A confirmed payment without a registration id is an
            // ordinary donation: log it and stop.
            self.sink.post(&log_entry(&event)).await;
            return Ok(Disposition::NotRegistration);
        };

        let (Some(store), Some(mailer)) = (self.store.as_deref(), self.mailer.as_deref()) else {
            let mut entry = log_entry(&event);
            entry.inscription_id = Some(inscription_id.clone());
            entry.error = Some("record store or email API key not configured".into());
            self.sink.post(&entry).await;

            return Err(FlowError::Config(
                "record store or email API key not configured".into(),
            ));
        };

        let outcome = self.fulfill(store, mailer, &inscription_id, &event).await?;

        let mut entry = log_entry(&event);
        entry.inscription_id = Some(inscription_id.clone());
        entry.user_name = outcome.user_name.clone();
        entry.user_email = outcome.user_email.clone();
        entry.status_updated = Some(outcome.status_updated);
        entry.email_sent = Some(outcome.email_sent);
        entry.error = outcome.error.clone();
        self.sink.post(&entry).await;

        Ok(Disposition::Processed {
            inscription_id,
            outcome,
        })
    }

    /// Fulfill one confirmed registration payment: email (at most once)
    /// then status patch. The patch runs exactly once on every path that
    /// found the record.
    async fn fulfill(
        &self,
        store: &dyn RecordStore,
        mailer: &dyn Mailer,
        inscription_id: &str,
        event: &PaymentEvent,
    ) -> Result<FulfillmentOutcome> {
        let schema = &self.schema;

        let found = store
            .find_by_field(&schema.table, &schema.search_field, inscription_id)
            .await?;
        let Some(record) = found else {
            return Ok(FulfillmentOutcome {
                success: false,
                error: Some(format!(
                    "record with {} \"{}\" not found",
                    schema.search_field, inscription_id
                )),
                ..FulfillmentOutcome::default()
            });
        };

        let current_tags = record.tags(&schema.tags_field);
        let already_notified = current_tags
            .iter()
            .any(|tag| tag == &schema.payment_email_tag);

        let mut patch = Map::new();
        patch.insert(
            schema.status_field.clone(),
            Value::String(schema.paid_status.clone()),
        );

        let user_name = self.user_name(&record);
        let user_email = record.field_str(&schema.email_field).map(str::to_owned);

        let mut email_sent = false;
        let mut error = None;

        if !already_notified {
            let Some(to) = user_email.clone() else {
                // No address on the record: the status patch still has to
                // land before this reports as a client error.
                store.update(&schema.table, &record.id, patch).await?;

                return Ok(FulfillmentOutcome {
                    success: false,
                    error: Some("user email not found in registration record".into()),
                    status_updated: true,
                    email_sent: false,
                    user_name: Some(user_name),
                    user_email: None,
                });
            };

            let event_name = extract::event_name(&event.description, &event.name)
                .unwrap_or_else(|| "Evento".to_owned());
            let email = confirmation_email(&self.sender, &to, &user_name, &event_name);

            match mailer.send(&email).await {
                Ok(message_id) => {
                    tracing::info!(%message_id, to = %to, "payment confirmation email sent");
                    email_sent = true;

                    // Stage the sentinel tag alongside the status patch,
                    // preserving whatever tags are already there.
                    let mut tags = current_tags;
                    tags.push(schema.payment_email_tag.clone());
                    patch.insert(
                        schema.tags_field.clone(),
                        Value::Array(tags.into_iter().map(Value::String).collect()),
                    );
                }
                Err(send_error) => {
                    // The status patch below still runs; the sentinel tag
                    // is not staged because no email actually went out.
                    tracing::warn!("confirmation email failed: {send_error}");
                    error = Some(send_error.to_string());
                }
            }
        }

        store.update(&schema.table, &record.id, patch).await?;

        Ok(FulfillmentOutcome {
            success: error.is_none(),
            error,
            status_updated: true,
            email_sent,
            user_name: Some(user_name),
            user_email,
        })
    }

    fn user_name(&self, record: &Record) -> String {
        record
            .field_str(&self.schema.name_field)
            .or_else(|| record.field_str(&self.schema.name_field_alt))
            .unwrap_or(&self.schema.fallback_user_name)
            .to_owned()
    }
}

fn log_entry(event: &PaymentEvent) -> PaymentLogEntry {
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_owned());

    PaymentLogEntry {
        event_type: non_empty(&event.event_type),
        status: non_empty(&event.status),
        amount: event.amount,
        billing_type: event.billing_type.clone(),
        description: non_empty(&event.description),
        ..PaymentLogEntry::default()
    }
}

fn confirmation_email(sender: &str, to: &str, user_name: &str, event_name: &str) -> OutboundEmail {
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="color: #2c3e50;">Pagamento Confirmado!</h2>
    <p>Olá <strong>{user_name}</strong>,</p>
    <p>Seu pagamento para o evento <strong>{event_name}</strong> foi confirmado com sucesso!</p>
    <p>Sua inscrição está completa e confirmada.</p>
  </div>
</body>
</html>"#
    );

    OutboundEmail {
        from: sender.to_owned(),
        to: to.to_owned(),
        subject: format!("Pagamento Confirmado - {event_name}"),
        html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parish_clients::{MemoryMailer, MemoryRecordStore, MemorySink};
    use serde_json::json;

    struct Harness {
        store: Arc<MemoryRecordStore>,
        mailer: Arc<MemoryMailer>,
        sink: Arc<MemorySink>,
        flow: ConfirmationFlow,
    }

    fn harness_with(mailer: MemoryMailer) -> Harness {
        let store = Arc::new(MemoryRecordStore::new());
        let mailer = Arc::new(mailer);
        let sink = Arc::new(MemorySink::new());

        let flow = ConfirmationFlow::new(
            Some(store.clone() as Arc<dyn RecordStore>),
            Some(mailer.clone() as Arc<dyn Mailer>),
            sink.clone() as Arc<dyn NotifySink>,
            StoreSchema::default(),
            "igreja@example.com",
        );

        Harness {
            store,
            mailer,
            sink,
            flow,
        }
    }

    fn harness() -> Harness {
        harness_with(MemoryMailer::new())
    }

    fn registration(fields: serde_json::Value) -> Record {
        Record {
            id: "rec1".into(),
            fields: fields.as_object().cloned().unwrap_or_default(),
        }
    }

    fn confirmed_payload(description: &str) -> WebhookPayload {
        serde_json::from_value(json!({
            "event": "PAYMENT_CONFIRMED",
            "payment": { "description": description, "value": 100 }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn confirmed_payment_sends_email_and_marks_paid() {
        let h = harness();
        h.store.insert(registration(json!({
            "Id da Inscrição": "AB12XY",
            "Nome": "Ana",
            "Email": "a@example.com",
        })));

        let payload =
            confirmed_payload("Inscrição de Ana para Acampamento da Igreja (AB12XY)");
        let disposition = h.flow.handle(&payload).await.unwrap();

        let Disposition::Processed {
            inscription_id,
            outcome,
        } = disposition
        else {
            panic!("expected Processed");
        };

        assert_eq!(inscription_id, "AB12XY");
        assert!(outcome.success);
        assert!(outcome.status_updated);
        assert!(outcome.email_sent);
        assert_eq!(outcome.user_email.as_deref(), Some("a@example.com"));

        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@example.com");
        assert_eq!(sent[0].subject, "Pagamento Confirmado - Acampamento");

        let record = h.store.get("rec1").unwrap();
        assert_eq!(record.field_str("Status"), Some("Pago"));
        assert_eq!(record.tags("Tags"), vec!["email-pagamento"]);
        assert_eq!(h.store.updates().len(), 1);
    }

    #[tokio::test]
    async fn sentinel_tag_skips_the_email_but_still_marks_paid() {
        let h = harness();
        h.store.insert(registration(json!({
            "Id da Inscrição": "AB12XY",
            "Nome": "Ana",
            "Email": "a@example.com",
            "Tags": ["email-pagamento"],
        })));

        let payload =
            confirmed_payload("Inscrição de Ana para Acampamento da Igreja (AB12XY)");
        let Disposition::Processed { outcome, .. } = h.flow.handle(&payload).await.unwrap()
        else {
            panic!("expected Processed");
        };

        assert!(outcome.success);
        assert!(outcome.status_updated);
        assert!(!outcome.email_sent);
        assert!(h.mailer.sent().is_empty());

        let record = h.store.get("rec1").unwrap();
        assert_eq!(record.field_str("Status"), Some("Pago"));
        // Tags untouched: no duplicate sentinel.
        assert_eq!(record.tags("Tags"), vec!["email-pagamento"]);
        assert_eq!(h.store.updates().len(), 1);
    }

    #[tokio::test]
    async fn existing_tags_are_preserved_when_staging_the_sentinel() {
        let h = harness();
        h.store.insert(registration(json!({
            "Id da Inscrição": "AB12XY",
            "Email": "a@example.com",
            "Tags": ["email-inscricao"],
        })));

        let payload = confirmed_payload("Inscrição de Ana para Retiro da Igreja (AB12XY)");
        h.flow.handle(&payload).await.unwrap();

        let record = h.store.get("rec1").unwrap();
        assert_eq!(
            record.tags("Tags"),
            vec!["email-inscricao", "email-pagamento"]
        );
    }

    #[tokio::test]
    async fn unconfirmed_event_touches_nothing() {
        let h = harness();
        h.store.insert(registration(json!({
            "Id da Inscrição": "AB12XY",
            "Email": "a@example.com",
        })));

        let payload: WebhookPayload = serde_json::from_value(json!({
            "event": "PAYMENT_PENDING",
            "payment": {
                "status": "PENDING",
                "description": "Inscrição de Ana para Retiro da Igreja (AB12XY)"
            }
        }))
        .unwrap();

        let disposition = h.flow.handle(&payload).await.unwrap();
        assert!(matches!(disposition, Disposition::NotConfirmed { .. }));
        assert!(h.mailer.sent().is_empty());
        assert!(h.store.updates().is_empty());

        // Skip is still mirrored to the sink.
        assert_eq!(h.sink.entries().len(), 1);
        assert!(h.sink.entries()[0].error.as_deref().unwrap().contains("skipping"));
    }

    #[tokio::test]
    async fn donation_without_id_is_logged_and_left_alone() {
        let h = harness();

        let payload = confirmed_payload("Doação espontânea");
        let disposition = h.flow.handle(&payload).await.unwrap();

        assert!(matches!(disposition, Disposition::NotRegistration));
        assert!(h.store.updates().is_empty());
        assert!(h.mailer.sent().is_empty());
        assert_eq!(h.sink.entries().len(), 1);
        assert!(h.sink.entries()[0].inscription_id.is_none());
    }

    #[tokio::test]
    async fn id_is_recovered_from_the_display_name_as_fallback() {
        let h = harness();
        h.store.insert(registration(json!({
            "Id da Inscrição": "CD34ZW",
            "Email": "b@example.com",
        })));

        let payload: WebhookPayload = serde_json::from_value(json!({
            "event": "PAYMENT_RECEIVED",
            "payment": { "name": "Inscrição Retiro: Bia (CD34ZW)" }
        }))
        .unwrap();

        let Disposition::Processed { inscription_id, .. } =
            h.flow.handle(&payload).await.unwrap()
        else {
            panic!("expected Processed");
        };
        assert_eq!(inscription_id, "CD34ZW");
    }

    #[tokio::test]
    async fn missing_credentials_are_a_config_error() {
        let sink = Arc::new(MemorySink::new());
        let flow = ConfirmationFlow::new(
            None,
            None,
            sink.clone() as Arc<dyn NotifySink>,
            StoreSchema::default(),
            "igreja@example.com",
        );

        let payload = confirmed_payload("Inscrição de Ana para Retiro da Igreja (AB12XY)");
        let error = flow.handle(&payload).await.unwrap_err();

        assert!(matches!(error, FlowError::Config(_)));
        // The id still makes it into the audit log.
        assert_eq!(
            sink.entries()[0].inscription_id.as_deref(),
            Some("AB12XY")
        );
    }

    #[tokio::test]
    async fn unknown_id_reports_not_found_without_updates() {
        let h = harness();

        let payload = confirmed_payload("Inscrição de Ana para Retiro da Igreja (ZZ99ZZ)");
        let Disposition::Processed { outcome, .. } = h.flow.handle(&payload).await.unwrap()
        else {
            panic!("expected Processed");
        };

        assert!(!outcome.success);
        assert!(!outcome.status_updated);
        assert!(outcome.error.as_deref().unwrap().contains("ZZ99ZZ"));
        assert!(h.store.updates().is_empty());
    }

    #[tokio::test]
    async fn missing_email_still_marks_paid_exactly_once() {
        let h = harness();
        h.store.insert(registration(json!({
            "Id da Inscrição": "AB12XY",
            "Nome": "Ana",
        })));

        let payload = confirmed_payload("Inscrição de Ana para Retiro da Igreja (AB12XY)");
        let Disposition::Processed { outcome, .. } = h.flow.handle(&payload).await.unwrap()
        else {
            panic!("expected Processed");
        };

        assert!(!outcome.success);
        assert!(outcome.status_updated);
        assert!(!outcome.email_sent);
        assert!(outcome.error.as_deref().unwrap().contains("email"));

        assert_eq!(h.store.updates().len(), 1);
        assert_eq!(h.store.get("rec1").unwrap().field_str("Status"), Some("Pago"));
    }

    #[tokio::test]
    async fn email_failure_still_marks_paid_and_stages_no_tag() {
        let h = harness_with(MemoryMailer::failing("provider down"));
        h.store.insert(registration(json!({
            "Id da Inscrição": "AB12XY",
            "Nome": "Ana",
            "Email": "a@example.com",
        })));

        let payload = confirmed_payload("Inscrição de Ana para Retiro da Igreja (AB12XY)");
        let Disposition::Processed { outcome, .. } = h.flow.handle(&payload).await.unwrap()
        else {
            panic!("expected Processed");
        };

        assert!(!outcome.success);
        assert!(outcome.status_updated);
        assert!(!outcome.email_sent);
        assert!(outcome.error.as_deref().unwrap().contains("provider down"));

        let record = h.store.get("rec1").unwrap();
        assert_eq!(record.field_str("Status"), Some("Pago"));
        // No sentinel: the next delivery may retry the email.
        assert!(record.tags("Tags").is_empty());
        assert_eq!(h.store.updates().len(), 1);
    }

    #[tokio::test]
    async fn second_delivery_after_success_sends_no_second_email() {
        let h = harness();
        h.store.insert(registration(json!({
            "Id da Inscrição": "AB12XY",
            "Nome": "Ana",
            "Email": "a@example.com",
        })));

        let payload =
            confirmed_payload("Inscrição de Ana para Acampamento da Igreja (AB12XY)");

        h.flow.handle(&payload).await.unwrap();
        let Disposition::Processed { outcome, .. } = h.flow.handle(&payload).await.unwrap()
        else {
            panic!("expected Processed");
        };

        assert!(outcome.success);
        assert!(!outcome.email_sent);
        assert_eq!(h.mailer.sent().len(), 1);
        // One status patch per delivery.
        assert_eq!(h.store.updates().len(), 2);
    }

    #[tokio::test]
    async fn final_outcome_is_mirrored_to_the_sink() {
        let h = harness();
        h.store.insert(registration(json!({
            "Id da Inscrição": "AB12XY",
            "Nome": "Ana",
            "Email": "a@example.com",
        })));

        let payload =
            confirmed_payload("Inscrição de Ana para Acampamento da Igreja (AB12XY)");
        h.flow.handle(&payload).await.unwrap();

        let entries = h.sink.entries();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.inscription_id.as_deref(), Some("AB12XY"));
        assert_eq!(entry.user_name.as_deref(), Some("Ana"));
        assert_eq!(entry.status_updated, Some(true));
        assert_eq!(entry.email_sent, Some(true));
        assert!(entry.error.is_none());
    }
}

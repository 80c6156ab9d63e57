//! Post-Intake Registration Flows
//!
//! Runs right after the intake form writes a new row, so the lookup
//! races against the store's write propagation and goes through the
//! retry policy. Both flows share the sentinel-tag guard used by the
//! confirmation workflow, but with the registration tag.

use std::sync::Arc;

use parish_clients::{Mailer, OutboundEmail, RecordStore};
use parish_core::config::StoreSchema;
use parish_core::retry::RetryPolicy;
use serde_json::{Map, Value};

use crate::error::{FlowError, Result};
use crate::lookup::find_with_retry;
use crate::outcome::FulfillmentOutcome;

/// Inputs for the registration (payment-link) email.
#[derive(Clone, Debug)]
pub struct RegistrationParams {
    pub id: String,
    pub name: String,
    pub event: String,
    pub payment_link: String,
}

/// Inputs for fulfilling a payment-exempt registration.
#[derive(Clone, Debug)]
pub struct ExemptParams {
    pub id: String,
    pub name: String,
    pub event: Option<String>,
}

/// What the registration-email flow did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistrationEmailResult {
    /// The record already carried the sentinel tag
    Skipped,
    Sent {
        message_id: String,
        recipient: String,
    },
}

pub struct RegistrationFlow {
    store: Arc<dyn RecordStore>,
    mailer: Arc<dyn Mailer>,
    schema: StoreSchema,
    retry: RetryPolicy,
    sender: String,
}

impl RegistrationFlow {
    pub fn new(
        store: Arc<dyn RecordStore>,
        mailer: Arc<dyn Mailer>,
        schema: StoreSchema,
        retry: RetryPolicy,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            store,
            mailer,
            schema,
            retry,
            sender: sender.into(),
        }
    }

    /// Email the payer their payment link, at most once per registration.
    pub async fn send_registration_email(
        &self,
        params: &RegistrationParams,
    ) -> Result<RegistrationEmailResult> {
        let schema = &self.schema;
        let record =
            find_with_retry(self.store.as_ref(), schema, &self.retry, &params.id).await?;

        let tags = record.tags(&schema.tags_field);
        if tags.iter().any(|tag| tag == &schema.registration_email_tag) {
            tracing::info!(id = %params.id, "registration email already sent, skipping");
            return Ok(RegistrationEmailResult::Skipped);
        }

        let to = record
            .field_str(&schema.email_field)
            .ok_or(FlowError::MissingEmail)?
            .to_owned();

        let email = registration_email(&self.sender, &to, params);
        let message_id = self.mailer.send(&email).await?;
        tracing::info!(%message_id, to = %to, "registration email sent");

        // Best effort: a failed tag write means the next invocation may
        // send a duplicate, which beats failing the whole request after
        // the email already went out.
        let mut tags = tags;
        tags.push(schema.registration_email_tag.clone());
        let mut patch = Map::new();
        patch.insert(
            schema.tags_field.clone(),
            Value::Array(tags.into_iter().map(Value::String).collect()),
        );
        if let Err(error) = self.store.update(&schema.table, &record.id, patch).await {
            tracing::warn!(id = %params.id, "failed to tag registration record: {error}");
        }

        Ok(RegistrationEmailResult::Sent {
            message_id,
            recipient: to,
        })
    }

    /// Fulfill a payment-exempt registration: mark the record exempt and
    /// send the confirmation email, tag-guarded like the paid path.
    pub async fn fulfill_exempt(&self, params: &ExemptParams) -> Result<FulfillmentOutcome> {
        let schema = &self.schema;
        let record =
            find_with_retry(self.store.as_ref(), schema, &self.retry, &params.id).await?;

        let current_tags = record.tags(&schema.tags_field);
        let already_notified = current_tags
            .iter()
            .any(|tag| tag == &schema.registration_email_tag);

        let mut patch = Map::new();
        patch.insert(
            schema.status_field.clone(),
            Value::String(schema.exempt_status.clone()),
        );

        let user_email = record.field_str(&schema.email_field).map(str::to_owned);

        let mut email_sent = false;
        let mut error = None;

        if !already_notified {
            let Some(to) = user_email.clone() else {
                self.store.update(&schema.table, &record.id, patch).await?;

                return Ok(FulfillmentOutcome {
                    success: false,
                    error: Some("user email not found in registration record".into()),
                    status_updated: true,
                    email_sent: false,
                    user_name: Some(params.name.clone()),
                    user_email: None,
                });
            };

            let event_name = params.event.as_deref().unwrap_or("Evento");
            let email = exempt_email(&self.sender, &to, &params.name, event_name);

            match self.mailer.send(&email).await {
                Ok(message_id) => {
                    tracing::info!(%message_id, to = %to, "exempt registration email sent");
                    email_sent = true;

                    let mut tags = current_tags;
                    tags.push(schema.registration_email_tag.clone());
                    patch.insert(
                        schema.tags_field.clone(),
                        Value::Array(tags.into_iter().map(Value::String).collect()),
                    );
                }
                Err(send_error) => {
                    tracing::warn!("exempt registration email failed: {send_error}");
                    error = Some(send_error.to_string());
                }
            }
        }

        self.store.update(&schema.table, &record.id, patch).await?;

        Ok(FulfillmentOutcome {
            success: error.is_none(),
            error,
            status_updated: true,
            email_sent,
            user_name: Some(params.name.clone()),
            user_email,
        })
    }
}

fn registration_email(sender: &str, to: &str, params: &RegistrationParams) -> OutboundEmail {
    let RegistrationParams {
        name,
        event,
        payment_link,
        ..
    } = params;

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="color: #2c3e50;">Inscrição Realizada com Sucesso!</h2>
    <p>Olá <strong>{name}</strong>,</p>
    <p>Sua inscrição para o evento <strong>{event}</strong> foi realizada com sucesso!</p>
    <p>Para confirmar sua participação, realize o pagamento através do link abaixo:</p>
    <p style="text-align: center; margin: 30px 0;">
      <a href="{payment_link}" style="background-color: #27ae60; color: white; padding: 14px 28px; text-decoration: none; border-radius: 5px; font-weight: bold;">Realizar Pagamento</a>
    </p>
    <p>Se o botão não funcionar, copie e cole este link no seu navegador:</p>
    <p><a href="{payment_link}">{payment_link}</a></p>
  </div>
</body>
</html>"#
    );

    OutboundEmail {
        from: sender.to_owned(),
        to: to.to_owned(),
        subject: format!("Inscrição Realizada com Sucesso - {event}"),
        html,
    }
}

fn exempt_email(sender: &str, to: &str, name: &str, event: &str) -> OutboundEmail {
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="color: #2c3e50;">Inscrição Confirmada!</h2>
    <p>Olá <strong>{name}</strong>,</p>
    <p>Sua inscrição para o evento <strong>{event}</strong> foi confirmada!</p>
    <p>Esta inscrição é isenta de pagamento. Nos vemos lá!</p>
  </div>
</body>
</html>"#
    );

    OutboundEmail {
        from: sender.to_owned(),
        to: to.to_owned(),
        subject: format!("Inscrição Confirmada - {event}"),
        html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parish_clients::{MemoryMailer, MemoryRecordStore, Record};
    use serde_json::json;

    struct Harness {
        store: Arc<MemoryRecordStore>,
        mailer: Arc<MemoryMailer>,
        flow: RegistrationFlow,
    }

    fn harness_with(mailer: MemoryMailer) -> Harness {
        let store = Arc::new(MemoryRecordStore::new());
        let mailer = Arc::new(mailer);

        let flow = RegistrationFlow::new(
            store.clone() as Arc<dyn RecordStore>,
            mailer.clone() as Arc<dyn Mailer>,
            StoreSchema::default(),
            RetryPolicy::immediate(),
            "igreja@example.com",
        );

        Harness {
            store,
            mailer,
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

    fn params() -> RegistrationParams {
        RegistrationParams {
            id: "AB12XY".into(),
            name: "Ana".into(),
            event: "Retiro".into(),
            payment_link: "https://pay.example.com/abc".into(),
        }
    }

    #[tokio::test]
    async fn registration_email_sends_and_tags() {
        let h = harness();
        h.store.insert(registration(json!({
            "Id da Inscrição": "AB12XY",
            "Email": "a@example.com",
        })));

        let result = h.flow.send_registration_email(&params()).await.unwrap();
        let RegistrationEmailResult::Sent { recipient, .. } = result else {
            panic!("expected Sent");
        };
        assert_eq!(recipient, "a@example.com");

        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Inscrição Realizada com Sucesso - Retiro");
        assert!(sent[0].html.contains("https://pay.example.com/abc"));

        let record = h.store.get("rec1").unwrap();
        assert_eq!(record.tags("Tags"), vec!["email-inscricao"]);
    }

    #[tokio::test]
    async fn registration_email_is_skipped_when_already_tagged() {
        let h = harness();
        h.store.insert(registration(json!({
            "Id da Inscrição": "AB12XY",
            "Email": "a@example.com",
            "Tags": ["email-inscricao"],
        })));

        let result = h.flow.send_registration_email(&params()).await.unwrap();
        assert_eq!(result, RegistrationEmailResult::Skipped);
        assert!(h.mailer.sent().is_empty());
        assert!(h.store.updates().is_empty());
    }

    #[tokio::test]
    async fn registration_email_requires_an_address() {
        let h = harness();
        h.store
            .insert(registration(json!({ "Id da Inscrição": "AB12XY" })));

        let error = h.flow.send_registration_email(&params()).await.unwrap_err();
        assert!(matches!(error, FlowError::MissingEmail));
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_retries_until_the_row_appears() {
        let store = Arc::new(MemoryRecordStore::new());
        let mailer = Arc::new(MemoryMailer::new());
        let flow = RegistrationFlow::new(
            store.clone() as Arc<dyn RecordStore>,
            mailer.clone() as Arc<dyn Mailer>,
            StoreSchema::default(),
            RetryPolicy::default(),
            "igreja@example.com",
        );

        // The row lands only after the flow has started waiting.
        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_secs(3)).await;
                store.insert(registration(json!({
                    "Id da Inscrição": "AB12XY",
                    "Email": "a@example.com",
                })));
            })
        };

        let result = flow.send_registration_email(&params()).await.unwrap();
        writer.await.unwrap();

        assert!(matches!(result, RegistrationEmailResult::Sent { .. }));
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_row_is_not_found_after_all_attempts() {
        let flow = RegistrationFlow::new(
            Arc::new(MemoryRecordStore::new()) as Arc<dyn RecordStore>,
            Arc::new(MemoryMailer::new()) as Arc<dyn Mailer>,
            StoreSchema::default(),
            RetryPolicy::default(),
            "igreja@example.com",
        );

        let error = flow.send_registration_email(&params()).await.unwrap_err();
        assert!(matches!(error, FlowError::NotFound { attempts: 5, .. }));
    }

    fn exempt_params() -> ExemptParams {
        ExemptParams {
            id: "AB12XY".into(),
            name: "Ana".into(),
            event: Some("Retiro".into()),
        }
    }

    #[tokio::test]
    async fn exempt_fulfillment_marks_status_and_emails() {
        let h = harness();
        h.store.insert(registration(json!({
            "Id da Inscrição": "AB12XY",
            "Email": "a@example.com",
        })));

        let outcome = h.flow.fulfill_exempt(&exempt_params()).await.unwrap();
        assert!(outcome.success);
        assert!(outcome.status_updated);
        assert!(outcome.email_sent);

        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Inscrição Confirmada - Retiro");

        let record = h.store.get("rec1").unwrap();
        assert_eq!(record.field_str("Status"), Some("Isenta"));
        assert_eq!(record.tags("Tags"), vec!["email-inscricao"]);
        assert_eq!(h.store.updates().len(), 1);
    }

    #[tokio::test]
    async fn exempt_fulfillment_defaults_the_event_name() {
        let h = harness();
        h.store.insert(registration(json!({
            "Id da Inscrição": "AB12XY",
            "Email": "a@example.com",
        })));

        let mut params = exempt_params();
        params.event = None;
        h.flow.fulfill_exempt(&params).await.unwrap();

        assert_eq!(h.mailer.sent()[0].subject, "Inscrição Confirmada - Evento");
    }

    #[tokio::test]
    async fn exempt_email_failure_still_marks_the_status() {
        let h = harness_with(MemoryMailer::failing("provider down"));
        h.store.insert(registration(json!({
            "Id da Inscrição": "AB12XY",
            "Email": "a@example.com",
        })));

        let outcome = h.flow.fulfill_exempt(&exempt_params()).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.status_updated);
        assert!(!outcome.email_sent);
        assert!(outcome.error.as_deref().unwrap().contains("provider down"));

        let record = h.store.get("rec1").unwrap();
        assert_eq!(record.field_str("Status"), Some("Isenta"));
        assert!(record.tags("Tags").is_empty());
        assert_eq!(h.store.updates().len(), 1);
    }

    #[tokio::test]
    async fn exempt_fulfillment_skips_the_email_when_tagged() {
        let h = harness();
        h.store.insert(registration(json!({
            "Id da Inscrição": "AB12XY",
            "Email": "a@example.com",
            "Tags": ["email-inscricao"],
        })));

        let outcome = h.flow.fulfill_exempt(&exempt_params()).await.unwrap();
        assert!(outcome.success);
        assert!(!outcome.email_sent);
        assert!(h.mailer.sent().is_empty());
        assert_eq!(
            h.store.get("rec1").unwrap().field_str("Status"),
            Some("Isenta")
        );
    }
}

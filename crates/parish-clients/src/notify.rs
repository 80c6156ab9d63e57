//! Notification Sink
//!
//! Best-effort structured message post to a team chat webhook. The sink
//! never returns an error: an unset URL makes it a no-op and transport
//! failures are logged locally and discarded, so observability can never
//! block or fail a payment flow.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Value, json};

/// Structured payment log entry mirrored to the team channel.
#[derive(Clone, Debug, Default)]
pub struct PaymentLogEntry {
    pub event_type: Option<String>,
    pub status: Option<String>,
    pub amount: Option<Decimal>,
    pub billing_type: Option<String>,
    pub description: Option<String>,
    pub inscription_id: Option<String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub status_updated: Option<bool>,
    pub email_sent: Option<bool>,
    pub error: Option<String>,
}

/// Fire-and-forget notification capability.
#[async_trait]
pub trait NotifySink: Send + Sync {
    /// Post one entry. Implementations swallow every failure.
    async fn post(&self, entry: &PaymentLogEntry);
}

/// Slack incoming-webhook sink.
pub struct SlackSink {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl SlackSink {
    /// `None` disables the sink entirely.
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }

    fn mrkdwn(label: &str, value: &str) -> Value {
        json!({ "type": "mrkdwn", "text": format!("*{label}:*\n{value}") })
    }

    fn yes_no(flag: bool) -> &'static str {
        if flag { "✅ Sim" } else { "❌ Não" }
    }

    fn message(entry: &PaymentLogEntry) -> Value {
        let na = || "N/A".to_owned();
        let mut fields = Vec::new();

        if let Some(id) = &entry.inscription_id {
            fields.push(Self::mrkdwn("ID da Inscrição", id));
        }

        fields.push(Self::mrkdwn(
            "Evento Asaas",
            &entry.event_type.clone().unwrap_or_else(na),
        ));
        fields.push(Self::mrkdwn(
            "Status",
            &entry.status.clone().unwrap_or_else(na),
        ));
        fields.push(Self::mrkdwn(
            "Valor",
            &entry
                .amount
                .map_or_else(na, |amount| format!("R$ {amount:.2}")),
        ));
        fields.push(Self::mrkdwn(
            "Tipo",
            &entry.billing_type.clone().unwrap_or_else(na),
        ));

        if let Some(name) = &entry.user_name {
            fields.push(Self::mrkdwn("Nome", name));
        }
        if let Some(email) = &entry.user_email {
            fields.push(Self::mrkdwn("Email", email));
        }
        if let Some(updated) = entry.status_updated {
            fields.push(Self::mrkdwn("Status Atualizado", Self::yes_no(updated)));
        }
        if let Some(sent) = entry.email_sent {
            fields.push(Self::mrkdwn("Email Enviado", Self::yes_no(sent)));
        }

        let title = if entry.inscription_id.is_some() {
            "💰 Pagamento de Evento Processado"
        } else {
            "💰 Pagamento Processado"
        };

        let mut blocks = vec![
            json!({
                "type": "header",
                "text": { "type": "plain_text", "text": title, "emoji": true }
            }),
            json!({ "type": "section", "fields": fields }),
        ];

        if let Some(error) = &entry.error {
            blocks.push(json!({
                "type": "section",
                "text": { "type": "mrkdwn", "text": format!("*⚠️ Erro:*\n```{error}```") }
            }));
        }

        if entry.inscription_id.is_none() {
            if let Some(description) = &entry.description {
                let mut text: String = description.chars().take(200).collect();
                if description.chars().count() > 200 {
                    text.push_str("...");
                }
                blocks.push(json!({
                    "type": "section",
                    "text": { "type": "mrkdwn", "text": format!("*Descrição:*\n{text}") }
                }));
            }
        }

        blocks.push(json!({
            "type": "context",
            "elements": [{
                "type": "mrkdwn",
                "text": format!("🕐 {}", Utc::now().format("%d/%m/%Y %H:%M UTC"))
            }]
        }));

        json!({ "text": title, "blocks": blocks })
    }
}

#[async_trait]
impl NotifySink for SlackSink {
    async fn post(&self, entry: &PaymentLogEntry) {
        let Some(url) = &self.webhook_url else {
            return;
        };

        let body = Self::message(entry);
        if let Err(error) = self.client.post(url).json(&body).send().await {
            tracing::warn!("failed to post payment log: {error}");
        }
    }
}

/// In-memory sink capturing entries for assertions.
#[derive(Default)]
pub struct MemorySink {
    entries: RwLock<Vec<PaymentLogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<PaymentLogEntry> {
        self.entries.read().unwrap().clone()
    }
}

#[async_trait]
impl NotifySink for MemorySink {
    async fn post(&self, entry: &PaymentLogEntry) {
        self.entries.write().unwrap().push(entry.clone());
    }
}

//! Transactional Email Client
//!
//! Sends HTML email through a Resend-style provider API. No retry built
//! in; callers decide what a failed send means for their flow.

use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

pub const RESEND_BASE_URL: &str = "https://api.resend.com";

/// One outbound HTML email.
#[derive(Clone, Debug, Serialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Email capability.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one email and return the provider message id.
    async fn send(&self, email: &OutboundEmail) -> Result<String>;
}

/// HTTP email client.
pub struct ResendMailer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

impl ResendMailer {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(RESEND_BASE_URL, api_key)
    }

    /// Point the client at a different endpoint (tests).
    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Email(response.text().await.unwrap_or_default()));
        }

        let result: SendResponse = response.json().await?;
        Ok(result.id)
    }
}

/// In-memory mailer recording outgoing messages, optionally failing every
/// send to exercise the partial-failure paths.
#[derive(Default)]
pub struct MemoryMailer {
    sent: RwLock<Vec<OutboundEmail>>,
    failure: Option<String>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            sent: RwLock::new(Vec::new()),
            failure: Some(message.into()),
        }
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.read().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<String> {
        if let Some(message) = &self.failure {
            return Err(ClientError::Email(message.clone()));
        }

        let mut sent = self.sent.write().unwrap();
        sent.push(email.clone());
        Ok(format!("mem-{}", sent.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> OutboundEmail {
        OutboundEmail {
            from: "igreja@example.com".into(),
            to: "ana@example.com".into(),
            subject: "Pagamento Confirmado - Evento".into(),
            html: "<p>Olá</p>".into(),
        }
    }

    #[tokio::test]
    async fn memory_mailer_records_sends() {
        let mailer = MemoryMailer::new();
        let id = mailer.send(&email()).await.unwrap();

        assert_eq!(id, "mem-1");
        assert_eq!(mailer.sent().len(), 1);
        assert_eq!(mailer.sent()[0].to, "ana@example.com");
    }

    #[tokio::test]
    async fn failing_mailer_surfaces_the_message() {
        let mailer = MemoryMailer::failing("quota exceeded");
        let err = mailer.send(&email()).await.unwrap_err();

        assert!(err.to_string().contains("quota exceeded"));
        assert!(mailer.sent().is_empty());
    }
}

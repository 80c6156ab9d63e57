//! Payment-Link Client
//!
//! Creates payment links through an Asaas-style provider API. The
//! provider authenticates with a bare `access_token` header rather than
//! a bearer token.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

pub const ASAAS_BASE_URL: &str = "https://api.asaas.com/v3";

/// Redirect behavior after a completed payment.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkCallback {
    pub auto_redirect: bool,
    pub success_url: String,
}

/// Request body for a new payment link.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLinkRequest {
    pub name: String,
    pub description: String,
    /// Omitted for open-amount links (donations)
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub value: Option<Decimal>,
    pub billing_type: String,
    pub charge_type: String,
    pub max_installment_count: u32,
    pub callback: LinkCallback,
    pub notification_enabled: bool,
    pub due_date_limit_days: u32,
}

/// A created payment link.
#[derive(Clone, Debug, Deserialize)]
pub struct PaymentLink {
    pub id: String,
    pub url: String,
}

/// HTTP payment-link client.
pub struct AsaasClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AsaasClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(ASAAS_BASE_URL, api_key)
    }

    /// Point the client at a different endpoint (tests).
    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub async fn create_payment_link(&self, request: &PaymentLinkRequest) -> Result<PaymentLink> {
        let response = self
            .client
            .post(format!("{}/paymentLinks", self.base_url))
            .header("access_token", &self.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::PaymentLink(
                response.text().await.unwrap_or_default(),
            ));
        }

        Ok(response.json().await?)
    }
}

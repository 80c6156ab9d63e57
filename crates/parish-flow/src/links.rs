//! Payment-Link Flows
//!
//! Builds provider payment links from a priced registration (or the
//! fixed donation texts) and writes generated links back onto the
//! registration record.

use std::sync::Arc;

use parish_clients::{AsaasClient, LinkCallback, PaymentLink, PaymentLinkRequest, RecordStore};
use parish_core::config::{DonationConfig, EventConfig, StoreSchema};
use parish_core::pricing::{self, BillingType};
use parish_core::retry::RetryPolicy;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::lookup::find_with_retry;

// Installment charge capped at a single installment for both link kinds.
const CHARGE_TYPE: &str = "INSTALLMENT";
const DUE_DATE_LIMIT_DAYS: u32 = 3;

pub struct LinkFlow {
    paylinks: Arc<AsaasClient>,
    event: EventConfig,
    donation: DonationConfig,
}

impl LinkFlow {
    pub fn new(paylinks: Arc<AsaasClient>, event: EventConfig, donation: DonationConfig) -> Self {
        Self {
            paylinks,
            event,
            donation,
        }
    }

    /// Create a priced payment link for one registration. The charge
    /// texts embed the registration id in parentheses, which is what the
    /// confirmation webhook later parses back out.
    pub async fn registration_link(&self, id: &str, name: &str, age: u8) -> Result<PaymentLink> {
        let quote = pricing::quote_for(age, BillingType::Undefined);

        let description = format!(
            "Inscrição de {name} para o {} da {} ({id}). {}",
            self.event.name,
            self.event.organization,
            quote.note.unwrap_or_default()
        );

        let request = PaymentLinkRequest {
            name: format!("Inscrição {}: {name} ({id})", self.event.name),
            description: description.trim_end().to_owned(),
            value: Some(quote.amount),
            billing_type: quote.billing_type.as_str().to_owned(),
            charge_type: CHARGE_TYPE.to_owned(),
            max_installment_count: quote.max_installments,
            callback: LinkCallback {
                auto_redirect: true,
                success_url: self.event.success_url.clone(),
            },
            notification_enabled: false,
            due_date_limit_days: DUE_DATE_LIMIT_DAYS,
        };

        let link = self.paylinks.create_payment_link(&request).await?;
        tracing::info!(id, url = %link.url, "registration payment link created");
        Ok(link)
    }

    /// Create the open-amount donation link. No value means the payer
    /// picks the amount on the provider's checkout page.
    pub async fn donation_link(&self) -> Result<PaymentLink> {
        let request = PaymentLinkRequest {
            name: self.donation.name.clone(),
            description: self.donation.description.clone(),
            value: None,
            billing_type: BillingType::Undefined.as_str().to_owned(),
            charge_type: CHARGE_TYPE.to_owned(),
            max_installment_count: 1,
            callback: LinkCallback {
                auto_redirect: true,
                success_url: self.donation.success_url.clone(),
            },
            notification_enabled: false,
            due_date_limit_days: DUE_DATE_LIMIT_DAYS,
        };

        let link = self.paylinks.create_payment_link(&request).await?;
        tracing::info!(url = %link.url, "donation payment link created");
        Ok(link)
    }
}

/// Writes a generated payment link back onto the registration record,
/// retrying the lookup against the intake form's write propagation.
pub struct StoreLinkFlow {
    store: Arc<dyn RecordStore>,
    schema: StoreSchema,
    retry: RetryPolicy,
}

impl StoreLinkFlow {
    pub fn new(store: Arc<dyn RecordStore>, schema: StoreSchema, retry: RetryPolicy) -> Self {
        Self {
            store,
            schema,
            retry,
        }
    }

    pub async fn store_payment_link(&self, id: &str, payment_link: &str) -> Result<()> {
        let schema = &self.schema;
        let record = find_with_retry(self.store.as_ref(), schema, &self.retry, id).await?;

        let mut patch = Map::new();
        patch.insert(
            schema.link_field.clone(),
            Value::String(payment_link.to_owned()),
        );
        self.store.update(&schema.table, &record.id, patch).await?;

        tracing::info!(id, "payment link stored on registration record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;
    use parish_clients::{MemoryRecordStore, Record};
    use serde_json::json;

    #[tokio::test]
    async fn stores_the_link_on_the_record() {
        let store = Arc::new(MemoryRecordStore::new());
        store.insert(Record {
            id: "rec1".into(),
            fields: json!({ "Id da Inscrição": "AB12XY" })
                .as_object()
                .cloned()
                .unwrap_or_default(),
        });

        let flow = StoreLinkFlow::new(
            store.clone() as Arc<dyn RecordStore>,
            StoreSchema::default(),
            RetryPolicy::immediate(),
        );

        flow.store_payment_link("AB12XY", "https://pay.example.com/abc")
            .await
            .unwrap();

        let record = store.get("rec1").unwrap();
        assert_eq!(
            record.field_str("Link de Pagamento"),
            Some("https://pay.example.com/abc")
        );
        assert_eq!(store.updates().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_id_is_not_found() {
        let flow = StoreLinkFlow::new(
            Arc::new(MemoryRecordStore::new()) as Arc<dyn RecordStore>,
            StoreSchema::default(),
            RetryPolicy::default(),
        );

        let error = flow
            .store_payment_link("ZZ99ZZ", "https://pay.example.com/abc")
            .await
            .unwrap_err();
        assert!(matches!(error, FlowError::NotFound { .. }));
    }
}

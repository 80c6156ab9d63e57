//! Shared retry-lookup helper for the post-intake flows.

use parish_clients::{Record, RecordStore};
use parish_core::config::StoreSchema;
use parish_core::retry::RetryPolicy;

use crate::error::{FlowError, Result};

/// Find the registration record by id under the retry policy; a miss
/// after all attempts is a [`FlowError::NotFound`].
pub(crate) async fn find_with_retry(
    store: &dyn RecordStore,
    schema: &StoreSchema,
    retry: &RetryPolicy,
    id: &str,
) -> Result<Record> {
    let record = retry
        .find(|| store.find_by_field(&schema.table, &schema.search_field, id))
        .await?;

    record.ok_or_else(|| FlowError::NotFound {
        field: schema.search_field.clone(),
        value: id.to_owned(),
        attempts: retry.max_attempts,
    })
}

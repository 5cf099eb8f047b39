//! Batched inventory item and level fetches, and cost write-back.

use std::collections::HashMap;
use std::future::Future;

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use ivy_core::{InventoryItemId, LocationId};

use super::types::{
    InventoryItemCost, InventoryItemCostUpdate, InventoryItemsPage, InventoryLevelsPage,
};
use super::{ShopifyClient, ShopifyError};
use crate::services::progress::ProgressReporter;

/// Quantity of one inventory item at one location, as reported by Shopify.
///
/// `available` may be negative while Shopify reconciles; callers clamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryLevelRecord {
    pub inventory_item_id: InventoryItemId,
    pub location_id: LocationId,
    pub available: i64,
}

fn join_ids(ids: &[InventoryItemId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

impl ShopifyClient {
    /// Cost of each inventory item, fetched in batches.
    ///
    /// Best effort: a failed batch is reported as an `error` event and
    /// skipped; a batch returning fewer costs than requested is reported as
    /// a `warning`. Items without a cost are absent from the map.
    #[instrument(skip(self, ids, progress), fields(count = ids.len()))]
    pub async fn fetch_inventory_item_costs(
        &self,
        ids: &[InventoryItemId],
        progress: &ProgressReporter,
    ) -> HashMap<InventoryItemId, Decimal> {
        self.for_each_batch(ids, "inventory costs", progress, |batch| async move {
            let mut url = self.endpoint("inventory_items.json")?;
            url.query_pairs_mut()
                .append_pair("ids", &join_ids(&batch))
                .append_pair("limit", "250");
            let page: InventoryItemsPage = self.get_json(&url).await?;

            let found: Vec<(InventoryItemId, Decimal)> = page
                .inventory_items
                .into_iter()
                .filter_map(|item| item.cost.map(|cost| (InventoryItemId::new(item.id), cost)))
                .collect();
            if found.len() < batch.len() {
                progress.warning(format!(
                    "Received {} of {} inventory costs",
                    found.len(),
                    batch.len()
                ));
            }
            Ok(found)
        })
        .await
        .into_iter()
        .collect()
    }

    /// Stock levels of each inventory item at every location, in batches.
    ///
    /// Same best-effort semantics as [`Self::fetch_inventory_item_costs`].
    /// A missing `available` is read as 0.
    #[instrument(skip(self, ids, progress), fields(count = ids.len()))]
    pub async fn fetch_inventory_levels(
        &self,
        ids: &[InventoryItemId],
        progress: &ProgressReporter,
    ) -> Vec<InventoryLevelRecord> {
        self.for_each_batch(ids, "inventory levels", progress, |batch| async move {
            let mut url = self.endpoint("inventory_levels.json")?;
            url.query_pairs_mut()
                .append_pair("inventory_item_ids", &join_ids(&batch))
                .append_pair("limit", "250");
            let page: InventoryLevelsPage = self.get_json(&url).await?;

            Ok(page
                .inventory_levels
                .into_iter()
                .map(|level| InventoryLevelRecord {
                    inventory_item_id: InventoryItemId::new(level.inventory_item_id),
                    location_id: LocationId::new(level.location_id),
                    available: level.available.unwrap_or(0),
                })
                .collect())
        })
        .await
    }

    /// Write an inventory item's unit cost.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::RateLimited` once retries are exhausted, or the
    /// error of the failed request.
    #[instrument(skip(self), fields(inventory_item_id = %id, cost = %cost))]
    pub async fn update_inventory_item_cost(
        &self,
        id: InventoryItemId,
        cost: Decimal,
    ) -> Result<(), ShopifyError> {
        let url = self.endpoint(&format!("inventory_items/{id}.json"))?;
        let body = InventoryItemCostUpdate {
            inventory_item: InventoryItemCost {
                id: id.as_i64(),
                cost,
            },
        };
        self.put_json(&url, &body).await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, ShopifyError> {
        let body = self.get(url).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Run `fetch` over `ids` in chunks of the configured batch size,
    /// sequentially, pausing between chunks. Failed chunks are reported and
    /// skipped; results of successful chunks are concatenated.
    async fn for_each_batch<T, F, Fut>(
        &self,
        ids: &[InventoryItemId],
        what: &str,
        progress: &ProgressReporter,
        mut fetch: F,
    ) -> Vec<T>
    where
        F: FnMut(Vec<InventoryItemId>) -> Fut,
        Fut: Future<Output = Result<Vec<T>, ShopifyError>>,
    {
        let policy = self.retry_policy();
        let batches: Vec<&[InventoryItemId]> = ids.chunks(policy.batch_size.max(1)).collect();
        let total = batches.len();
        let mut results = Vec::new();

        for (index, batch) in batches.into_iter().enumerate() {
            let number = index + 1;
            match fetch(batch.to_vec()).await {
                Ok(mut items) => {
                    progress.progress(format!("Fetched {what}: batch {number}/{total}"));
                    results.append(&mut items);
                }
                Err(e) => {
                    tracing::warn!(batch = number, total, error = %e, "Batch failed");
                    progress.error(format!("Failed to fetch {what} (batch {number}/{total}): {e}"));
                }
            }

            if number < total {
                tokio::time::sleep(policy.batch_pause).await;
            }
        }

        results
    }
}

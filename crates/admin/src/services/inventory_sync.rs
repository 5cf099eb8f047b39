//! Inventory sync: mirror active products, variant costs and stock levels
//! of one shop from Shopify.
//!
//! The run is best effort. Failed pages or batches are reported as `error`
//! events and whatever was fetched is still written; nothing wraps the run
//! in a transaction.

use std::collections::HashSet;
use std::pin::pin;

use futures::StreamExt;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use ivy_core::{LocationId, ShopId, VariantId};

use super::ServiceContext;
use super::progress::ProgressReporter;
use crate::db::CatalogRepository;
use crate::error::AppError;
use crate::shopify::{IdMap, InventoryLevelRecord, ShopifyClient};

/// Counts reported at the end of a sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub products: u64,
    pub variants: u64,
    pub costs: u64,
    pub levels: u64,
    pub locations: u64,
}

/// Sync one shop. `product_type` narrows the product listing.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown shop and database errors.
/// Shopify failures are reported through `progress` and do not fail the run.
#[instrument(skip(ctx, progress), fields(shop_id = %shop_id))]
pub async fn sync_inventory(
    ctx: &ServiceContext,
    shop_id: ShopId,
    product_type: Option<&str>,
    progress: &ProgressReporter,
) -> Result<SyncSummary, AppError> {
    let shop = ctx.load_shop(shop_id).await?;
    let client = ctx.shopify_client(&shop)?;
    let catalog = CatalogRepository::new(&ctx.pool);

    progress.info(format!("Syncing inventory for {}", shop.name));

    let mut summary = SyncSummary::default();
    let ids = sync_products(&client, &catalog, shop_id, product_type, progress, &mut summary).await?;

    let inventory_items = ids.inventory_item_ids();
    if inventory_items.is_empty() {
        progress.warning("No variants with an inventory item; nothing else to sync");
        return Ok(summary);
    }

    progress.info(format!("Fetching costs for {} inventory items", inventory_items.len()));
    let costs = client
        .fetch_inventory_item_costs(&inventory_items, progress)
        .await;
    let costs: Vec<(VariantId, Decimal)> = costs
        .into_iter()
        .filter_map(|(item, cost)| {
            let variant = ids.variant_for_inventory_item(item);
            if variant.is_none() {
                tracing::debug!(inventory_item_id = %item, "Cost for unknown inventory item skipped");
            }
            variant.map(|v| (v, cost))
        })
        .collect();
    summary.costs = catalog.set_variant_costs(&costs).await?;

    progress.info("Fetching stock levels");
    let records = client.fetch_inventory_levels(&inventory_items, progress).await;
    let levels = reconcile_levels(&ids, records);
    let locations: HashSet<LocationId> = levels.iter().map(|(_, location, _)| *location).collect();
    summary.locations = u64::try_from(locations.len()).unwrap_or(u64::MAX);
    summary.levels = catalog.upsert_inventory_levels(&levels).await?;

    progress.success(format!(
        "Sync finished: {} products, {} variants, {} costs, {} stock levels across {} locations",
        summary.products, summary.variants, summary.costs, summary.levels, summary.locations
    ));
    tracing::info!(?summary, "Inventory sync finished");

    Ok(summary)
}

/// Drain the product listing, upserting as pages arrive.
async fn sync_products(
    client: &ShopifyClient,
    catalog: &CatalogRepository<'_>,
    shop_id: ShopId,
    product_type: Option<&str>,
    progress: &ProgressReporter,
    summary: &mut SyncSummary,
) -> Result<IdMap, AppError> {
    let mut ids = IdMap::new();
    let mut pages = pin!(client.list_active_products(product_type));
    let mut page_number = 0_u32;

    while let Some(page) = pages.next().await {
        page_number += 1;
        let products = match page {
            Ok(products) => products,
            Err(e) => {
                progress.error(format!("Failed to list products (page {page_number}): {e}"));
                break;
            }
        };

        for product in &products {
            let upsert = product.to_upsert();
            if let Some(seen) = ids.product(upsert.shopify_id) {
                tracing::debug!(
                    product_id = %seen,
                    shopify_id = %upsert.shopify_id,
                    "Product repeated across pages skipped"
                );
                continue;
            }
            let product_id = catalog.upsert_product(shop_id, &upsert).await?;
            ids.insert_product(upsert.shopify_id, product_id);
            summary.products += 1;

            for variant in &product.variants {
                let upsert = variant.to_upsert();
                let variant_id = catalog.upsert_variant(product_id, &upsert).await?;
                ids.insert_variant(variant_id, upsert.shopify_id, upsert.inventory_item_id);
                summary.variants += 1;
            }
        }

        progress.progress(format!(
            "Products page {page_number}: {} products ({} variants so far)",
            products.len(),
            ids.variant_count()
        ));
    }

    Ok(ids)
}

/// Map level records onto internal variants, dropping unknown inventory
/// items and clamping negative quantities to zero.
fn reconcile_levels(
    ids: &IdMap,
    records: Vec<InventoryLevelRecord>,
) -> Vec<(VariantId, LocationId, i64)> {
    records
        .into_iter()
        .filter_map(|record| {
            let Some(variant) = ids.variant_for_inventory_item(record.inventory_item_id) else {
                tracing::debug!(
                    inventory_item_id = %record.inventory_item_id,
                    "Level for unknown inventory item skipped"
                );
                return None;
            };
            if record.available < 0 {
                tracing::debug!(
                    variant_id = %variant,
                    shopify_variant_id = ?ids.shopify_variant(variant),
                    location_id = %record.location_id,
                    available = record.available,
                    "Negative stock clamped to zero"
                );
            }
            Some((variant, record.location_id, record.available.max(0)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ivy_core::{InventoryItemId, ShopifyVariantId};

    #[test]
    fn test_reconcile_levels_clamps_and_skips_unknown() {
        let mut ids = IdMap::new();
        let variant = VariantId::generate();
        ids.insert_variant(variant, ShopifyVariantId::new(1), Some(InventoryItemId::new(100)));

        let records = vec![
            InventoryLevelRecord {
                inventory_item_id: InventoryItemId::new(100),
                location_id: LocationId::new(7),
                available: -3,
            },
            InventoryLevelRecord {
                inventory_item_id: InventoryItemId::new(100),
                location_id: LocationId::new(8),
                available: 12,
            },
            InventoryLevelRecord {
                inventory_item_id: InventoryItemId::new(999),
                location_id: LocationId::new(7),
                available: 5,
            },
        ];

        let levels = reconcile_levels(&ids, records);
        assert_eq!(
            levels,
            vec![
                (variant, LocationId::new(7), 0),
                (variant, LocationId::new(8), 12),
            ]
        );
    }
}

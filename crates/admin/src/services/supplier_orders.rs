//! Supplier order pipeline.
//!
//! Orders hold one row per physical unit. Every mutation that can move the
//! totals recomputes them in the repository transaction. Mutations are plain
//! read-modify-write sequences: concurrent edits of the same row are not
//! guarded and the last write wins.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;
use serde::Serialize;
use tracing::instrument;

use ivy_core::order::expand_units;
use ivy_core::{
    ShopId, ShopifyVariantId, SupplierOrderId, SupplierOrderItemId, SupplierOrderStatus, VariantId,
};

use super::ServiceContext;
use crate::db::{
    CatalogRepository, MetafieldConfigRepository, OrderChanges, SupplierOrderRepository,
};
use crate::error::AppError;
use crate::models::{
    AddItemEntry, CreateOrderInput, NewOrderItem, PricedVariant, SupplierOrder,
    SupplierOrderItem, SupplierOrderWithItems, UpdateItemInput, UpdateOrderInput, metafield_keys,
};

/// Display name to value, as stored on order items.
type DisplayMetafields = BTreeMap<String, String>;

/// An updated item together with its order's fresh totals.
#[derive(Debug, Clone, Serialize)]
pub struct UpdatedItem {
    pub item: SupplierOrderItem,
    pub order: SupplierOrder,
}

/// Supplier order operations for one request.
pub struct SupplierOrderService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> SupplierOrderService<'a> {
    #[must_use]
    pub const fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    fn orders(&self) -> SupplierOrderRepository<'_> {
        SupplierOrderRepository::new(&self.ctx.pool)
    }

    /// Create an empty draft order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown shop.
    #[instrument(skip(self, input), fields(shop_id = %shop_id))]
    pub async fn create_order(
        &self,
        shop_id: ShopId,
        input: &CreateOrderInput,
    ) -> Result<SupplierOrder, AppError> {
        self.ctx.load_shop(shop_id).await?;
        let order = self.orders().create(shop_id, input).await?;
        tracing::info!(order_id = %order.id, "Supplier order created");
        Ok(order)
    }

    /// Orders of a shop, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list_orders(&self, shop_id: ShopId) -> Result<Vec<SupplierOrder>, AppError> {
        Ok(self.orders().list(shop_id).await?)
    }

    /// An order with its unit rows.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown order.
    pub async fn get_order(
        &self,
        order_id: SupplierOrderId,
    ) -> Result<SupplierOrderWithItems, AppError> {
        let order = self.load_order(order_id).await?;
        let items = self.orders().items(order_id).await?;
        Ok(SupplierOrderWithItems { order, items })
    }

    /// Change status, reference, note or balance adjustment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Conflict` for a forbidden status transition.
    #[instrument(skip(self, input), fields(order_id = %order_id))]
    pub async fn update_order(
        &self,
        order_id: SupplierOrderId,
        input: UpdateOrderInput,
    ) -> Result<SupplierOrder, AppError> {
        let order = self.load_order(order_id).await?;

        let status = match input.status {
            Some(next) => order.status.transition_to(next)?,
            None => order.status,
        };
        let changes = OrderChanges {
            status,
            reference: merge_text(input.reference, order.reference),
            note: merge_text(input.note, order.note),
            balance_adjustment: input.balance_adjustment.unwrap_or(order.balance_adjustment),
        };

        let updated = self.orders().update(order_id, &changes).await?;
        if updated.status != order.status {
            tracing::info!(from = %order.status, to = %updated.status, "Supplier order status changed");
        }
        Ok(updated)
    }

    /// Add units to an order.
    ///
    /// Each entry becomes `quantity` rows of quantity 1 priced at the
    /// variant's current cost. Unknown variants and non-positive quantities
    /// are skipped. Configured metafields are attached when Shopify answers;
    /// otherwise rows get none. A draft order moves to `requested`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` when nothing can be added and
    /// `AppError::Conflict` for a completed order.
    #[instrument(skip(self, entries), fields(order_id = %order_id, entries = entries.len()))]
    pub async fn add_items(
        &self,
        order_id: SupplierOrderId,
        entries: &[AddItemEntry],
    ) -> Result<SupplierOrderWithItems, AppError> {
        if entries.is_empty() {
            return Err(AppError::BadRequest("no items to add".to_string()));
        }
        let order = self.load_open_order(order_id).await?;

        let requested: Vec<VariantId> = entries.iter().map(|e| e.variant_id).collect();
        let variants: HashMap<VariantId, PricedVariant> = CatalogRepository::new(&self.ctx.pool)
            .priced_variants(order.shop_id, &requested)
            .await?
            .into_iter()
            .map(|v| (v.variant.id, v))
            .collect();

        let known: Vec<&PricedVariant> = distinct_variants(entries, &variants);
        let metafields = match self.fetch_display_metafields(order.shop_id, &known).await {
            Ok(metafields) => metafields,
            Err(e) => {
                tracing::warn!(error = %e, "Metafield fetch failed; adding items without metafields");
                HashMap::new()
            }
        };

        let new_items = build_order_items(entries, &variants, &metafields);
        if new_items.is_empty() {
            return Err(AppError::BadRequest(
                "none of the requested variants can be added".to_string(),
            ));
        }

        let status = if order.status == SupplierOrderStatus::Draft {
            order.status.transition_to(SupplierOrderStatus::Requested)?
        } else {
            order.status
        };

        let order = self.orders().add_items(order_id, &new_items, status).await?;
        tracing::info!(units = new_items.len(), "Items added to supplier order");

        let items = self.orders().items(order_id).await?;
        Ok(SupplierOrderWithItems { order, items })
    }

    /// Apply a partial update to one unit row.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an invalid quantity or price and
    /// `AppError::Conflict` for a completed order.
    #[instrument(skip(self, update), fields(order_id = %order_id, item_id = %item_id))]
    pub async fn update_item(
        &self,
        order_id: SupplierOrderId,
        item_id: SupplierOrderItemId,
        update: &UpdateItemInput,
    ) -> Result<UpdatedItem, AppError> {
        self.load_open_order(order_id).await?;
        let mut item = self
            .orders()
            .get_item(order_id, item_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order item {item_id}")))?;

        let recompute = item.line.apply(update, Utc::now())?;
        let order = self.orders().save_item(&item, recompute).await?;
        Ok(UpdatedItem { item, order })
    }

    /// Remove one unit row.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown item and
    /// `AppError::Conflict` for a completed order.
    #[instrument(skip(self), fields(order_id = %order_id, item_id = %item_id))]
    pub async fn delete_item(
        &self,
        order_id: SupplierOrderId,
        item_id: SupplierOrderItemId,
    ) -> Result<SupplierOrder, AppError> {
        self.load_open_order(order_id).await?;
        self.orders()
            .delete_item(order_id, item_id)
            .await
            .map_err(|e| match AppError::from(e) {
                AppError::NotFound(_) => AppError::NotFound(format!("order item {item_id}")),
                other => other,
            })
    }

    /// Reprice every row at its variant's current cost. Validated rows are
    /// repriced too. Rows whose variant no longer exists keep their price.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Conflict` for a completed order.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn recalculate_prices(
        &self,
        order_id: SupplierOrderId,
    ) -> Result<SupplierOrderWithItems, AppError> {
        self.load_open_order(order_id).await?;
        let items = self.orders().items(order_id).await?;

        let variant_ids: Vec<VariantId> = items
            .iter()
            .map(|i| i.variant_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let costs = CatalogRepository::new(&self.ctx.pool)
            .variant_costs(&variant_ids)
            .await?;

        let prices: Vec<(SupplierOrderItemId, _, _)> = items
            .into_iter()
            .filter_map(|mut item| {
                let cost = costs.get(&item.variant_id)?;
                item.line.reprice(*cost);
                Some((item.id, item.line.unit_price, item.line.line_total))
            })
            .collect();

        self.orders().reprice_items(&prices).await?;
        let order = self.orders().recompute_totals(order_id).await?;
        tracing::info!(repriced = prices.len(), "Supplier order prices recalculated");

        let items = self.orders().items(order_id).await?;
        Ok(SupplierOrderWithItems { order, items })
    }

    /// Refetch configured metafields for every distinct variant of the
    /// order and overwrite what the rows store.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Shopify` if the fetch fails and
    /// `AppError::Conflict` for a completed order.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn refresh_metafields(
        &self,
        order_id: SupplierOrderId,
    ) -> Result<SupplierOrderWithItems, AppError> {
        let order = self.load_open_order(order_id).await?;
        let items = self.orders().items(order_id).await?;

        let variant_ids: Vec<VariantId> = items
            .iter()
            .map(|i| i.variant_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let variants = CatalogRepository::new(&self.ctx.pool)
            .priced_variants(order.shop_id, &variant_ids)
            .await?;
        let known: Vec<&PricedVariant> = variants.iter().collect();
        let mut metafields = self.fetch_display_metafields(order.shop_id, &known).await?;

        let mut updated = 0;
        for variant_id in variant_ids {
            let values = metafields.remove(&variant_id).unwrap_or_default();
            updated += self
                .orders()
                .set_variant_metafields(order_id, variant_id, &values)
                .await?;
        }
        tracing::info!(rows = updated, "Supplier order metafields refreshed");

        let items = self.orders().items(order_id).await?;
        Ok(SupplierOrderWithItems { order, items })
    }

    async fn load_order(&self, order_id: SupplierOrderId) -> Result<SupplierOrder, AppError> {
        self.orders()
            .get(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))
    }

    /// Load an order that may still change.
    async fn load_open_order(&self, order_id: SupplierOrderId) -> Result<SupplierOrder, AppError> {
        let order = self.load_order(order_id).await?;
        if order.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "order {order_id} is {} and can no longer change",
                order.status
            )));
        }
        Ok(order)
    }

    /// Configured metafields of `variants`, keyed by internal variant and
    /// projected onto display names. No request is made when the shop has
    /// no configuration.
    async fn fetch_display_metafields(
        &self,
        shop_id: ShopId,
        variants: &[&PricedVariant],
    ) -> Result<HashMap<VariantId, DisplayMetafields>, AppError> {
        let config = MetafieldConfigRepository::new(&self.ctx.pool)
            .list(shop_id)
            .await?;
        if config.is_empty() || variants.is_empty() {
            return Ok(HashMap::new());
        }
        let labels = metafield_keys(&config);
        let keys: Vec<_> = labels.iter().map(|(key, _)| key.clone()).collect();

        let shop = self.ctx.load_shop(shop_id).await?;
        let client = self.ctx.shopify_client(&shop)?;
        let shopify_ids: Vec<ShopifyVariantId> =
            variants.iter().map(|v| v.variant.shopify_id).collect();
        let mut fetched = client.fetch_variant_metafields(&shopify_ids, &keys).await?;

        Ok(variants
            .iter()
            .filter_map(|v| {
                let set = fetched.remove(&v.variant.shopify_id)?;
                Some((v.variant.id, set.to_display_map(&labels)))
            })
            .collect())
    }
}

/// Absent keeps `current`; a blank string clears it.
fn merge_text(update: Option<String>, current: Option<String>) -> Option<String> {
    match update {
        Some(text) if text.trim().is_empty() => None,
        Some(text) => Some(text),
        None => current,
    }
}

/// Variants referenced by `entries` that exist, each once.
fn distinct_variants<'v>(
    entries: &[AddItemEntry],
    variants: &'v HashMap<VariantId, PricedVariant>,
) -> Vec<&'v PricedVariant> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter(|e| e.quantity > 0 && seen.insert(e.variant_id))
        .filter_map(|e| variants.get(&e.variant_id))
        .collect()
}

/// Expand request entries into unit rows.
fn build_order_items(
    entries: &[AddItemEntry],
    variants: &HashMap<VariantId, PricedVariant>,
    metafields: &HashMap<VariantId, DisplayMetafields>,
) -> Vec<NewOrderItem> {
    let mut items = Vec::new();

    for entry in entries {
        let Some(priced) = variants.get(&entry.variant_id) else {
            tracing::debug!(variant_id = %entry.variant_id, "Unknown variant skipped");
            continue;
        };
        let metafields = metafields.get(&entry.variant_id).cloned().unwrap_or_default();
        let product_title = entry
            .title
            .clone()
            .unwrap_or_else(|| priced.product_title.clone());
        let sku = entry.sku.clone().or_else(|| priced.variant.sku.clone());

        items.extend(
            expand_units(entry.quantity, priced.variant.cost).map(|line| NewOrderItem {
                variant_id: entry.variant_id,
                product_title: product_title.clone(),
                variant_title: Some(priced.variant.title.clone()),
                sku: sku.clone(),
                line,
                metafields: metafields.clone(),
            }),
        );
    }

    items
}

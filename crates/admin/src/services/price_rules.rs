//! Price rules: CRUD, preview and bulk application.
//!
//! A rule prices every variant of one product type. Applying it writes the
//! computed price either to Shopify as the inventory item cost (mirrored
//! into the local catalog) or onto the unit rows of open supplier orders.
//! Only active rules are applied; each run stamps `last_applied_at`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::AddAssign;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use ivy_core::{
    MetafieldKey, MetafieldSet, PriceRuleId, ShopId, ShopifyVariantId, SupplierOrderItemId, VariantId,
};

use super::ServiceContext;
use super::progress::ProgressReporter;
use crate::db::{
    CatalogRepository, MetafieldConfigRepository, PriceRuleRepository, SupplierOrderRepository,
};
use crate::error::AppError;
use crate::models::{
    ApplyTarget, PricePreview, PricedVariant, PriceRule, PriceRuleInput, Shop, SupplierOrderItem,
};
use crate::shopify::{ShopifyClient, ShopifyError};

/// Rows repriced per transaction when applying to orders.
const ORDER_BATCH_SIZE: usize = 50;

const DEFAULT_PREVIEW_LIMIT: u32 = 20;
const MAX_PREVIEW_LIMIT: u32 = 200;

/// Outcome of applying one or more rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    pub rules: u64,
    /// Variants (Shopify) or order rows (orders) written.
    pub updated: u64,
    /// Same unit as `updated`.
    pub failed: u64,
    /// Orders whose totals were recomputed.
    pub orders: u64,
}

impl AddAssign for ApplySummary {
    fn add_assign(&mut self, other: Self) {
        self.rules += other.rules;
        self.updated += other.updated;
        self.failed += other.failed;
        self.orders += other.orders;
    }
}

/// Price rule operations for one request or background run.
pub struct PriceRuleService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> PriceRuleService<'a> {
    #[must_use]
    pub const fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    fn rules(&self) -> PriceRuleRepository<'_> {
        PriceRuleRepository::new(&self.ctx.pool)
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list(&self, shop_id: ShopId) -> Result<Vec<PriceRule>, AppError> {
        Ok(self.rules().list(shop_id).await?)
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown rule.
    pub async fn get(&self, id: PriceRuleId) -> Result<PriceRule, AppError> {
        self.rules()
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("price rule {id}")))
    }

    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for invalid input and
    /// `AppError::Conflict` if the product type already has a rule.
    #[instrument(skip(self, input), fields(shop_id = %shop_id))]
    pub async fn create(&self, shop_id: ShopId, input: PriceRuleInput) -> Result<PriceRule, AppError> {
        self.ctx.load_shop(shop_id).await?;
        let input = validate(input)?;
        let rule = self.rules().create(shop_id, &input).await?;
        tracing::info!(rule_id = %rule.id, product_type = %rule.product_type, "Price rule created");
        Ok(rule)
    }

    /// Replace a rule, modifiers included.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create`], plus `AppError::NotFound`.
    #[instrument(skip(self, input), fields(rule_id = %id))]
    pub async fn update(&self, id: PriceRuleId, input: PriceRuleInput) -> Result<PriceRule, AppError> {
        let input = validate(input)?;
        self.rules().update(id, &input).await.map_err(|e| match AppError::from(e) {
            AppError::NotFound(_) => AppError::NotFound(format!("price rule {id}")),
            other => other,
        })
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown rule.
    pub async fn delete(&self, id: PriceRuleId) -> Result<(), AppError> {
        self.rules().delete(id).await.map_err(|e| match AppError::from(e) {
            AppError::NotFound(_) => AppError::NotFound(format!("price rule {id}")),
            other => other,
        })
    }

    /// Prices the rule would set for up to `limit` variants, without
    /// writing anything.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Shopify` if metafields cannot be fetched.
    #[instrument(skip(self), fields(rule_id = %id))]
    pub async fn preview(&self, id: PriceRuleId, limit: Option<u32>) -> Result<Vec<PricePreview>, AppError> {
        let rule = self.get(id).await?;
        let limit = limit.unwrap_or(DEFAULT_PREVIEW_LIMIT).clamp(1, MAX_PREVIEW_LIMIT);

        let variants = CatalogRepository::new(&self.ctx.pool)
            .variants_by_product_type(rule.shop_id, &rule.product_type, Some(i64::from(limit)))
            .await?;
        if variants.is_empty() {
            return Ok(Vec::new());
        }

        let shop = self.ctx.load_shop(rule.shop_id).await?;
        let client = self.ctx.shopify_client(&shop)?;
        let keys = self.metafield_keys(&rule).await?;
        let mut metafields = fetch_metafields(&client, &variants, &keys).await?;

        Ok(variants
            .into_iter()
            .map(|v| {
                let attributes = v.attributes(metafields.remove(&v.variant.shopify_id).unwrap_or_default());
                PricePreview {
                    variant_id: v.variant.id,
                    breakdown: rule.formula.breakdown(&attributes),
                    current_cost: v.variant.cost,
                    product_title: v.product_title,
                    variant_title: v.variant.title,
                    sku: v.variant.sku,
                }
            })
            .collect())
    }

    // =========================================================================
    // Application
    // =========================================================================

    /// Apply one active rule.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown rule and
    /// `AppError::Conflict` for an inactive one. Per-variant Shopify failures
    /// are reported through `progress` and counted, not returned.
    #[instrument(skip(self, progress), fields(rule_id = %id, target = ?target))]
    pub async fn apply_rule(
        &self,
        id: PriceRuleId,
        target: ApplyTarget,
        progress: &ProgressReporter,
    ) -> Result<ApplySummary, AppError> {
        let rule = self.get(id).await?;
        if !rule.is_active {
            return Err(AppError::Conflict(format!(
                "price rule for \"{}\" is inactive",
                rule.product_type
            )));
        }
        let shop = self.ctx.load_shop(rule.shop_id).await?;
        let summary = self.apply(&shop, &rule, target, progress).await?;

        progress.success(format!(
            "Rule \"{}\" applied: {} updated, {} failed",
            rule.product_type, summary.updated, summary.failed
        ));
        Ok(summary)
    }

    /// Apply every active rule of a shop, one after the other. A failing
    /// rule is reported and the next one still runs.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown shop.
    #[instrument(skip(self, progress), fields(shop_id = %shop_id, target = ?target))]
    pub async fn apply_all(
        &self,
        shop_id: ShopId,
        target: ApplyTarget,
        progress: &ProgressReporter,
    ) -> Result<ApplySummary, AppError> {
        let shop = self.ctx.load_shop(shop_id).await?;
        let rules = self.rules().list_active(shop_id).await?;
        if rules.is_empty() {
            progress.warning("No active price rules");
            return Ok(ApplySummary::default());
        }

        progress.info(format!("Applying {} price rules", rules.len()));
        let mut total = ApplySummary::default();
        for (index, rule) in rules.iter().enumerate() {
            progress.info(format!(
                "Rule {}/{}: \"{}\"",
                index + 1,
                rules.len(),
                rule.product_type
            ));
            match self.apply(&shop, rule, target, progress).await {
                Ok(summary) => total += summary,
                Err(e) => {
                    tracing::warn!(rule_id = %rule.id, error = %e, "Price rule failed");
                    progress.error(format!("Rule \"{}\" failed: {e}", rule.product_type));
                }
            }
        }

        progress.success(format!(
            "{} rules applied: {} updated, {} failed",
            total.rules, total.updated, total.failed
        ));
        Ok(total)
    }

    async fn apply(
        &self,
        shop: &Shop,
        rule: &PriceRule,
        target: ApplyTarget,
        progress: &ProgressReporter,
    ) -> Result<ApplySummary, AppError> {
        let client = self.ctx.shopify_client(shop)?;
        let keys = self.metafield_keys(rule).await?;

        let mut summary = match target {
            ApplyTarget::Shopify => self.apply_to_shopify(&client, rule, &keys, progress).await?,
            ApplyTarget::Orders => self.apply_to_orders(&client, rule, &keys, progress).await?,
        };
        summary.rules = 1;

        self.rules().mark_applied(rule.id, Utc::now()).await?;
        tracing::info!(rule_id = %rule.id, ?summary, "Price rule applied");
        Ok(summary)
    }

    /// Write the computed price as each variant's inventory item cost, then
    /// mirror the successful writes locally.
    async fn apply_to_shopify(
        &self,
        client: &ShopifyClient,
        rule: &PriceRule,
        keys: &[MetafieldKey],
        progress: &ProgressReporter,
    ) -> Result<ApplySummary, AppError> {
        let catalog = CatalogRepository::new(&self.ctx.pool);
        let variants = catalog
            .variants_by_product_type(rule.shop_id, &rule.product_type, None)
            .await?;
        let mut summary = ApplySummary::default();
        if variants.is_empty() {
            progress.warning(format!("No variants of type \"{}\"", rule.product_type));
            return Ok(summary);
        }

        let policy = client.retry_policy().clone();
        let batches: Vec<&[PricedVariant]> = variants.chunks(policy.batch_size.max(1)).collect();
        let total = batches.len();

        for (index, batch) in batches.into_iter().enumerate() {
            let number = index + 1;
            let prices = match compute_prices(client, rule, batch, keys).await {
                Ok(prices) => prices,
                Err(e) => {
                    summary.failed += batch.len() as u64;
                    progress.error(format!(
                        "Failed to fetch metafields (batch {number}/{total}): {e}"
                    ));
                    continue;
                }
            };

            let mut written = Vec::with_capacity(batch.len());
            for variant in batch {
                let Some(price) = prices.get(&variant.variant.id).copied() else {
                    continue;
                };
                let Some(item) = variant.variant.inventory_item_id else {
                    tracing::debug!(variant_id = %variant.variant.id, "Variant without inventory item skipped");
                    continue;
                };
                match client.update_inventory_item_cost(item, price).await {
                    Ok(()) => written.push((variant.variant.id, price)),
                    Err(e) => {
                        summary.failed += 1;
                        progress.error(format!(
                            "Failed to update cost of {} {}: {e}",
                            variant.product_title, variant.variant.title
                        ));
                    }
                }
            }

            summary.updated += catalog.set_variant_costs(&written).await?;
            progress.progress(format!(
                "\"{}\": batch {number}/{total}, {} costs written",
                rule.product_type,
                written.len()
            ));

            if number < total {
                tokio::time::sleep(policy.batch_pause).await;
            }
        }

        Ok(summary)
    }

    /// Reprice the rows of non-completed orders holding this product type.
    async fn apply_to_orders(
        &self,
        client: &ShopifyClient,
        rule: &PriceRule,
        keys: &[MetafieldKey],
        progress: &ProgressReporter,
    ) -> Result<ApplySummary, AppError> {
        let orders = SupplierOrderRepository::new(&self.ctx.pool);
        let items = orders
            .open_items_for_product_type(rule.shop_id, &rule.product_type)
            .await?;
        let mut summary = ApplySummary::default();
        if items.is_empty() {
            progress.warning(format!(
                "No open order items of type \"{}\"",
                rule.product_type
            ));
            return Ok(summary);
        }

        let variant_ids: Vec<VariantId> = items
            .iter()
            .map(|i| i.variant_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let variants = CatalogRepository::new(&self.ctx.pool)
            .priced_variants(rule.shop_id, &variant_ids)
            .await?;

        let mut prices = HashMap::with_capacity(variants.len());
        for batch in variants.chunks(client.retry_policy().batch_size.max(1)) {
            match compute_prices(client, rule, batch, keys).await {
                Ok(batch_prices) => prices.extend(batch_prices),
                Err(e) => progress.error(format!("Failed to fetch metafields: {e}")),
            }
        }

        let (repriced, unpriced) = reprice(items, &prices);
        summary.failed = unpriced;

        let mut touched = HashSet::new();
        let total = repriced.len().div_ceil(ORDER_BATCH_SIZE);
        for (index, batch) in repriced.chunks(ORDER_BATCH_SIZE).enumerate() {
            let updated = orders.reprice_items(batch).await?;
            touched.extend(updated.into_iter().map(|o| o.id));
            summary.updated += batch.len() as u64;
            progress.progress(format!(
                "\"{}\": batch {}/{total}, {} rows repriced",
                rule.product_type,
                index + 1,
                batch.len()
            ));
        }
        summary.orders = touched.len() as u64;

        Ok(summary)
    }

    /// Configured metafield keys plus those the rule's modifiers read.
    async fn metafield_keys(&self, rule: &PriceRule) -> Result<Vec<MetafieldKey>, AppError> {
        let configured = MetafieldConfigRepository::new(&self.ctx.pool)
            .list(rule.shop_id)
            .await?;
        Ok(merge_keys(
            configured.iter().map(|c| c.metafield_key()),
            rule.metafield_keys(),
        ))
    }
}

/// Union of two key lists, case-insensitively, first spelling wins.
fn merge_keys(
    configured: impl IntoIterator<Item = MetafieldKey>,
    extra: impl IntoIterator<Item = MetafieldKey>,
) -> Vec<MetafieldKey> {
    let mut by_lowercase = BTreeMap::new();
    for key in configured.into_iter().chain(extra) {
        by_lowercase
            .entry(key.qualified().to_lowercase())
            .or_insert(key);
    }
    by_lowercase.into_values().collect()
}

async fn fetch_metafields(
    client: &ShopifyClient,
    variants: &[PricedVariant],
    keys: &[MetafieldKey],
) -> Result<HashMap<ShopifyVariantId, MetafieldSet>, ShopifyError> {
    let ids: Vec<ShopifyVariantId> = variants.iter().map(|v| v.variant.shopify_id).collect();
    client.fetch_variant_metafields(&ids, keys).await
}

/// Rule price of each variant in `batch`.
async fn compute_prices(
    client: &ShopifyClient,
    rule: &PriceRule,
    batch: &[PricedVariant],
    keys: &[MetafieldKey],
) -> Result<HashMap<VariantId, Decimal>, ShopifyError> {
    let mut metafields = if rule.formula.metafield_modifiers.is_empty() {
        HashMap::new()
    } else {
        fetch_metafields(client, batch, keys).await?
    };

    Ok(batch
        .iter()
        .map(|v| {
            let attributes = v.attributes(metafields.remove(&v.variant.shopify_id).unwrap_or_default());
            (v.variant.id, rule.formula.total_price(&attributes))
        })
        .collect())
}

/// New `(item, unit_price, line_total)` for every row with a known price,
/// and the number of rows left unpriced.
fn reprice(
    items: Vec<SupplierOrderItem>,
    prices: &HashMap<VariantId, Decimal>,
) -> (Vec<(SupplierOrderItemId, Decimal, Decimal)>, u64) {
    let total = items.len();
    let repriced: Vec<_> = items
        .into_iter()
        .filter_map(|mut item| {
            let price = prices.get(&item.variant_id)?;
            item.line.reprice(*price);
            Some((item.id, item.line.unit_price, item.line.line_total))
        })
        .collect();
    let unpriced = (total - repriced.len()) as u64;
    (repriced, unpriced)
}

/// Trim the product type and reject unusable amounts and modifiers.
fn validate(mut input: PriceRuleInput) -> Result<PriceRuleInput, AppError> {
    input.product_type = input.product_type.trim().to_string();
    if input.product_type.is_empty() {
        return Err(AppError::BadRequest("product_type is required".to_string()));
    }
    if input.formula.base_price.is_sign_negative() {
        return Err(AppError::BadRequest("base_price cannot be negative".to_string()));
    }
    for modifier in &mut input.formula.metafield_modifiers {
        modifier.namespace = modifier.namespace.trim().to_string();
        modifier.key = modifier.key.trim().to_string();
        if modifier.namespace.is_empty() || modifier.key.is_empty() {
            return Err(AppError::BadRequest(
                "metafield modifiers need a namespace and a key".to_string(),
            ));
        }
    }
    for modifier in &mut input.formula.option_modifiers {
        modifier.option_value = modifier.option_value.trim().to_string();
        if modifier.option_value.is_empty() {
            return Err(AppError::BadRequest(
                "option modifiers need an option value".to_string(),
            ));
        }
    }
    Ok(input)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ivy_core::SupplierOrderId;
    use ivy_core::order::LineState;
    use ivy_core::pricing::{MetafieldModifier, OptionModifier, PriceFormula};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn input(product_type: &str, base_price: &str) -> PriceRuleInput {
        PriceRuleInput {
            product_type: product_type.to_string(),
            formula: PriceFormula {
                base_price: dec(base_price),
                metafield_modifiers: Vec::new(),
                option_modifiers: Vec::new(),
            },
            is_active: true,
        }
    }

    fn item(variant_id: VariantId, quantity: i32, unit_price: &str) -> SupplierOrderItem {
        let mut line = LineState::unit(dec(unit_price));
        line.quantity = quantity;
        line.line_total = dec(unit_price) * Decimal::from(quantity);
        SupplierOrderItem {
            id: SupplierOrderItemId::generate(),
            order_id: SupplierOrderId::generate(),
            variant_id,
            product_title: "Robe".to_string(),
            variant_title: None,
            sku: None,
            line,
            metafields: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_merge_keys_is_case_insensitive_union() {
        let keys = merge_keys(
            vec![MetafieldKey::new("custom", "fabric")],
            vec![
                MetafieldKey::new("Custom", "Fabric"),
                MetafieldKey::new("custom", "lining"),
            ],
        );
        assert_eq!(
            keys,
            vec![
                MetafieldKey::new("custom", "fabric"),
                MetafieldKey::new("custom", "lining"),
            ]
        );
    }

    #[test]
    fn test_reprice_sets_line_total_from_quantity() {
        let known = VariantId::generate();
        let unknown = VariantId::generate();
        let prices = HashMap::from([(known, dec("12.50"))]);

        let (repriced, unpriced) = reprice(
            vec![item(known, 2, "10.00"), item(unknown, 1, "4.00")],
            &prices,
        );

        assert_eq!(repriced.len(), 1);
        assert_eq!(unpriced, 1);
        assert_eq!(repriced[0].1, dec("12.50"));
        assert_eq!(repriced[0].2, dec("25.00"));
    }

    #[test]
    fn test_reprice_counts_unpriced_rows_not_variants() {
        let unknown = VariantId::generate();
        let prices = HashMap::new();

        let (repriced, unpriced) = reprice(
            vec![
                item(unknown, 1, "4.00"),
                item(unknown, 1, "4.00"),
                item(unknown, 1, "4.00"),
            ],
            &prices,
        );

        assert!(repriced.is_empty());
        assert_eq!(unpriced, 3);
    }

    #[test]
    fn test_validate_trims_and_rejects() {
        let valid = validate(input("  Robe ", "30")).unwrap();
        assert_eq!(valid.product_type, "Robe");

        assert!(matches!(validate(input(" ", "30")), Err(AppError::BadRequest(_))));
        assert!(matches!(validate(input("Robe", "-1")), Err(AppError::BadRequest(_))));

        let mut bad_modifier = input("Robe", "30");
        bad_modifier.formula.metafield_modifiers.push(MetafieldModifier {
            namespace: "custom".to_string(),
            key: " ".to_string(),
            value: "Lin".to_string(),
            amount: dec("5"),
        });
        assert!(matches!(validate(bad_modifier), Err(AppError::BadRequest(_))));

        let mut bad_option = input("Robe", "30");
        bad_option.formula.option_modifiers.push(OptionModifier {
            option_name: "Taille".to_string(),
            option_value: String::new(),
            amount: dec("2"),
        });
        assert!(matches!(validate(bad_option), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_summaries_add_up() {
        let mut total = ApplySummary::default();
        total += ApplySummary { rules: 1, updated: 10, failed: 1, orders: 2 };
        total += ApplySummary { rules: 1, updated: 5, failed: 0, orders: 1 };
        assert_eq!(total, ApplySummary { rules: 2, updated: 15, failed: 1, orders: 3 });
    }
}

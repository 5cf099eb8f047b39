//! Stock statistics over a shop's variants.
//!
//! Input rows are one per variant, with the stock already summed over the
//! selected location(s). Everything here is pure so it can be unit tested
//! without a database.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{ProductId, VariantId};

/// Label used when a product has no type.
pub const UNDEFINED_PRODUCT_TYPE: &str = "Non défini";

/// How many colors the color breakdown keeps.
pub const MAX_COLORS: usize = 15;

/// How many products the top-products list keeps.
pub const MAX_TOP_PRODUCTS: usize = 10;

static SIZE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(XXXS|XXS|XS|S|M|L|XL|XXL|2XL|3XL|4XL|5XL|\d+)$")
        .unwrap_or_else(|e| unreachable!("size pattern is a valid regex: {e}"))
});

/// Classification of a variant option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionClass {
    /// A size; carries the uppercased grouping key.
    Size(String),
    /// Anything that is not a size.
    Color(String),
}

/// Classify an option value as a size or a color.
///
/// A value is a color purely because it is not a size, so a color literally
/// named "5" is reported as a size. Callers should go through this function
/// so the policy can change in one place.
#[must_use]
pub fn classify_option_value(value: &str) -> OptionClass {
    let trimmed = value.trim();
    if SIZE_PATTERN.is_match(trimmed) {
        OptionClass::Size(trimmed.to_uppercase())
    } else {
        OptionClass::Color(trimmed.to_string())
    }
}

/// One variant with its stock, as loaded for statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRow {
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub product_title: String,
    pub product_type: String,
    pub options: [Option<String>; 3],
    pub cost: Decimal,
    pub price: Decimal,
    /// Summed quantity; negatives from an in-flight sync are counted as 0.
    pub quantity: i64,
}

impl StockRow {
    fn stock(&self) -> i64 {
        self.quantity.max(0)
    }

    fn cost_value(&self) -> Decimal {
        self.cost * Decimal::from(self.stock())
    }

    fn sale_value(&self) -> Decimal {
        self.price * Decimal::from(self.stock())
    }
}

/// Aggregate for one group (product type, color, size).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStats {
    pub key: String,
    pub variant_count: u64,
    pub stock: i64,
    pub cost_value: Decimal,
    pub sale_value: Decimal,
}

/// Aggregate for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStats {
    pub product_id: ProductId,
    pub title: String,
    pub product_type: String,
    pub stock: i64,
    pub cost_value: Decimal,
    pub sale_value: Decimal,
}

/// Full statistics payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryStats {
    pub total_variants: u64,
    pub total_stock: i64,
    pub total_cost_value: Decimal,
    pub total_sale_value: Decimal,
    pub profit: Decimal,
    pub by_product_type: Vec<GroupStats>,
    pub by_color: Vec<GroupStats>,
    pub by_size: Vec<GroupStats>,
    pub top_products: Vec<ProductStats>,
}

#[derive(Default)]
struct GroupAccumulator {
    groups: HashMap<String, GroupStats>,
}

impl GroupAccumulator {
    fn add(&mut self, key: &str, row: &StockRow) {
        let entry = self
            .groups
            .entry(key.to_string())
            .or_insert_with(|| GroupStats {
                key: key.to_string(),
                variant_count: 0,
                stock: 0,
                cost_value: Decimal::ZERO,
                sale_value: Decimal::ZERO,
            });
        entry.variant_count += 1;
        entry.stock += row.stock();
        entry.cost_value += row.cost_value();
        entry.sale_value += row.sale_value();
    }

    fn into_sorted(self, limit: Option<usize>) -> Vec<GroupStats> {
        let mut groups: Vec<GroupStats> = self.groups.into_values().collect();
        groups.sort_by(|a, b| b.stock.cmp(&a.stock).then_with(|| a.key.cmp(&b.key)));
        if let Some(limit) = limit {
            groups.truncate(limit);
        }
        groups
    }
}

/// Compute statistics for a set of rows.
#[must_use]
pub fn compute_stats(rows: &[StockRow]) -> InventoryStats {
    let mut by_type = GroupAccumulator::default();
    let mut by_color = GroupAccumulator::default();
    let mut by_size = GroupAccumulator::default();
    let mut products: HashMap<ProductId, ProductStats> = HashMap::new();

    let mut total_stock = 0_i64;
    let mut total_cost_value = Decimal::ZERO;
    let mut total_sale_value = Decimal::ZERO;

    for row in rows {
        total_stock += row.stock();
        total_cost_value += row.cost_value();
        total_sale_value += row.sale_value();

        let product_type = if row.product_type.trim().is_empty() {
            UNDEFINED_PRODUCT_TYPE
        } else {
            row.product_type.as_str()
        };
        by_type.add(product_type, row);

        for value in row.options.iter().flatten().filter(|v| !v.trim().is_empty()) {
            match classify_option_value(value) {
                OptionClass::Size(key) => by_size.add(&key, row),
                OptionClass::Color(key) => by_color.add(&key, row),
            }
        }

        let product = products
            .entry(row.product_id)
            .or_insert_with(|| ProductStats {
                product_id: row.product_id,
                title: row.product_title.clone(),
                product_type: product_type.to_string(),
                stock: 0,
                cost_value: Decimal::ZERO,
                sale_value: Decimal::ZERO,
            });
        product.stock += row.stock();
        product.cost_value += row.cost_value();
        product.sale_value += row.sale_value();
    }

    let mut top_products: Vec<ProductStats> = products.into_values().collect();
    top_products.sort_by(|a, b| b.stock.cmp(&a.stock).then_with(|| a.title.cmp(&b.title)));
    top_products.truncate(MAX_TOP_PRODUCTS);

    InventoryStats {
        total_variants: rows.len() as u64,
        total_stock,
        total_cost_value,
        total_sale_value,
        profit: total_sale_value - total_cost_value,
        by_product_type: by_type.into_sorted(None),
        by_color: by_color.into_sorted(Some(MAX_COLORS)),
        by_size: by_size.into_sorted(None),
        top_products,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn row(product: ProductId, product_type: &str, options: [Option<&str>; 3], quantity: i64) -> StockRow {
        StockRow {
            variant_id: VariantId::generate(),
            product_id: product,
            product_title: format!("Product {product}"),
            product_type: product_type.to_string(),
            options: options.map(|o| o.map(str::to_string)),
            cost: dec("10.00"),
            price: dec("25.00"),
            quantity,
        }
    }

    #[test]
    fn test_size_classification() {
        for size in ["M", "m", "3XL", "42", "xxs", " XL "] {
            assert!(
                matches!(classify_option_value(size), OptionClass::Size(_)),
                "{size} should be a size"
            );
        }
        assert_eq!(classify_option_value("m"), OptionClass::Size("M".to_string()));
        assert_eq!(classify_option_value("3xl"), OptionClass::Size("3XL".to_string()));
    }

    #[test]
    fn test_color_classification() {
        for color in ["French Navy", "Rouge", "Mlarge", "6XL"] {
            assert!(
                matches!(classify_option_value(color), OptionClass::Color(_)),
                "{color} should be a color"
            );
        }
    }

    #[test]
    fn test_totals_and_profit() {
        let p = ProductId::generate();
        let rows = vec![
            row(p, "T-shirt", [Some("M"), Some("Rouge"), None], 3),
            row(p, "T-shirt", [Some("L"), Some("Rouge"), None], 2),
        ];
        let stats = compute_stats(&rows);

        assert_eq!(stats.total_variants, 2);
        assert_eq!(stats.total_stock, 5);
        assert_eq!(stats.total_cost_value, dec("50.00"));
        assert_eq!(stats.total_sale_value, dec("125.00"));
        assert_eq!(stats.profit, dec("75.00"));
    }

    #[test]
    fn test_negative_quantity_counts_as_zero() {
        let p = ProductId::generate();
        let rows = vec![row(p, "T-shirt", [Some("M"), None, None], -4)];
        let stats = compute_stats(&rows);
        assert_eq!(stats.total_stock, 0);
        assert_eq!(stats.total_cost_value, Decimal::ZERO);
        assert_eq!(stats.total_variants, 1);
    }

    #[test]
    fn test_empty_product_type_is_undefined() {
        let p = ProductId::generate();
        let stats = compute_stats(&[row(p, "  ", [None, None, None], 1)]);
        assert_eq!(stats.by_product_type[0].key, UNDEFINED_PRODUCT_TYPE);
    }

    #[test]
    fn test_groups_sorted_by_stock_descending() {
        let p = ProductId::generate();
        let rows = vec![
            row(p, "Sweat", [Some("s"), Some("Rouge"), None], 1),
            row(p, "T-shirt", [Some("M"), Some("Bleu"), None], 5),
            row(p, "T-shirt", [Some("S"), Some("Bleu"), None], 2),
        ];
        let stats = compute_stats(&rows);

        let types: Vec<_> = stats.by_product_type.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(types, ["T-shirt", "Sweat"]);

        let sizes: Vec<_> = stats.by_size.iter().map(|g| (g.key.as_str(), g.stock)).collect();
        assert_eq!(sizes, [("M", 5), ("S", 3)]);

        let colors: Vec<_> = stats.by_color.iter().map(|g| (g.key.as_str(), g.stock)).collect();
        assert_eq!(colors, [("Bleu", 7), ("Rouge", 1)]);
    }

    #[test]
    fn test_colors_truncated_to_fifteen() {
        let p = ProductId::generate();
        let rows: Vec<_> = (0..20)
            .map(|i| {
                let color = format!("Couleur {i}");
                let mut r = row(p, "T-shirt", [None, None, None], i);
                r.options[0] = Some(color);
                r
            })
            .collect();
        let stats = compute_stats(&rows);
        assert_eq!(stats.by_color.len(), MAX_COLORS);
        assert_eq!(stats.by_color[0].key, "Couleur 19");
    }

    #[test]
    fn test_top_products_truncated_to_ten() {
        let rows: Vec<_> = (0..12)
            .map(|i| row(ProductId::generate(), "T-shirt", [None, None, None], i))
            .collect();
        let stats = compute_stats(&rows);
        assert_eq!(stats.top_products.len(), MAX_TOP_PRODUCTS);
        assert_eq!(stats.top_products[0].stock, 11);
        assert_eq!(stats.by_product_type.len(), 1);
    }
}

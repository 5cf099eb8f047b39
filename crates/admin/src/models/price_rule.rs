//! Per-product-type price rules.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ivy_core::pricing::{PriceBreakdown, PriceFormula};
use ivy_core::{MetafieldKey, PriceRuleId, ShopId, VariantId};

/// A stored price rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRule {
    pub id: PriceRuleId,
    pub shop_id: ShopId,
    /// Product type the rule prices (unique per shop).
    pub product_type: String,
    #[serde(flatten)]
    pub formula: PriceFormula,
    pub is_active: bool,
    pub last_applied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PriceRule {
    /// Metafield keys referenced by the rule's modifiers.
    #[must_use]
    pub fn metafield_keys(&self) -> Vec<MetafieldKey> {
        self.formula
            .metafield_modifiers
            .iter()
            .map(|m| (m.namespace.as_str(), m.key.as_str()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|(namespace, key)| MetafieldKey::new(namespace, key))
            .collect()
    }
}

/// Input for creating or replacing a rule. Modifiers are replaced wholesale.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceRuleInput {
    pub product_type: String,
    #[serde(flatten)]
    pub formula: PriceFormula,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

/// Where a rule's computed prices are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyTarget {
    /// Inventory item cost on Shopify, mirrored locally.
    #[default]
    Shopify,
    /// Unit prices of open supplier order items.
    Orders,
}

/// One row of a rule preview.
#[derive(Debug, Clone, Serialize)]
pub struct PricePreview {
    pub variant_id: VariantId,
    pub product_title: String,
    pub variant_title: String,
    pub sku: Option<String>,
    pub current_cost: Decimal,
    #[serde(flatten)]
    pub breakdown: PriceBreakdown,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ivy_core::pricing::MetafieldModifier;

    #[test]
    fn test_input_defaults_to_active_with_no_modifiers() {
        let input: PriceRuleInput =
            serde_json::from_str(r#"{"product_type": "Chemise", "base_price": "12.00"}"#).unwrap();
        assert!(input.is_active);
        assert_eq!(input.formula.base_price, "12.00".parse::<Decimal>().unwrap());
        assert!(input.formula.metafield_modifiers.is_empty());
        assert!(input.formula.option_modifiers.is_empty());
    }

    #[test]
    fn test_apply_target_parses_query_values() {
        assert_eq!(
            serde_json::from_str::<ApplyTarget>(r#""orders""#).unwrap(),
            ApplyTarget::Orders
        );
        assert_eq!(ApplyTarget::default(), ApplyTarget::Shopify);
    }

    #[test]
    fn test_metafield_keys_are_deduplicated() {
        let modifier = |value: &str| MetafieldModifier {
            namespace: "custom".to_string(),
            key: "fabric".to_string(),
            value: value.to_string(),
            amount: Decimal::ONE,
        };
        let rule = PriceRule {
            id: PriceRuleId::generate(),
            shop_id: ShopId::generate(),
            product_type: "Chemise".to_string(),
            formula: PriceFormula {
                base_price: Decimal::TEN,
                metafield_modifiers: vec![modifier("Lin"), modifier("Coton")],
                option_modifiers: vec![],
            },
            is_active: true,
            last_applied_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let keys = rule.metafield_keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].qualified(), "custom.fabric");
    }
}

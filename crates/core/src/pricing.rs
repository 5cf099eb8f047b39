//! Price rule evaluation.
//!
//! A price rule computes a variant's unit cost as
//!
//! ```text
//! base_price + Σ matching metafield modifiers + Σ matching option modifiers
//! ```
//!
//! Every matching modifier stacks additively, so the result does not depend
//! on the order modifiers are listed in.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::MetafieldSet;

/// Adds `amount` when the variant carries `namespace.key` with exactly `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetafieldModifier {
    pub namespace: String,
    pub key: String,
    pub value: String,
    pub amount: Decimal,
}

/// Adds `amount` when any option slot of the variant equals `option_value`.
///
/// `option_name` is kept for display; matching only looks at the value
/// because option slot order differs between products of the same type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionModifier {
    pub option_name: String,
    pub option_value: String,
    pub amount: Decimal,
}

/// The pricing part of a rule, independent of storage concerns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFormula {
    pub base_price: Decimal,
    #[serde(default)]
    pub metafield_modifiers: Vec<MetafieldModifier>,
    #[serde(default)]
    pub option_modifiers: Vec<OptionModifier>,
}

/// What a price rule looks at on a variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantAttributes {
    pub options: [Option<String>; 3],
    pub metafields: MetafieldSet,
}

impl VariantAttributes {
    fn has_option_value(&self, value: &str) -> bool {
        self.options.iter().flatten().any(|v| v == value)
    }
}

/// A modifier that contributed to a computed price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedModifier {
    pub label: String,
    pub amount: Decimal,
}

/// Total price with the list of modifiers that matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    pub base_price: Decimal,
    pub applied: Vec<AppliedModifier>,
    pub total: Decimal,
}

impl MetafieldModifier {
    #[must_use]
    pub fn matches(&self, variant: &VariantAttributes) -> bool {
        variant.metafields.get(&self.namespace, &self.key) == Some(self.value.as_str())
    }
}

impl OptionModifier {
    #[must_use]
    pub fn matches(&self, variant: &VariantAttributes) -> bool {
        variant.has_option_value(&self.option_value)
    }
}

impl PriceFormula {
    /// Compute the unit price for a variant.
    #[must_use]
    pub fn total_price(&self, variant: &VariantAttributes) -> Decimal {
        let metafield_sum: Decimal = self
            .metafield_modifiers
            .iter()
            .filter(|m| m.matches(variant))
            .map(|m| m.amount)
            .sum();
        let option_sum: Decimal = self
            .option_modifiers
            .iter()
            .filter(|m| m.matches(variant))
            .map(|m| m.amount)
            .sum();

        self.base_price + metafield_sum + option_sum
    }

    /// Same as [`Self::total_price`] but records which modifiers applied.
    #[must_use]
    pub fn breakdown(&self, variant: &VariantAttributes) -> PriceBreakdown {
        let mut applied: Vec<AppliedModifier> = self
            .metafield_modifiers
            .iter()
            .filter(|m| m.matches(variant))
            .map(|m| AppliedModifier {
                label: format!("{}.{} = {}", m.namespace, m.key, m.value),
                amount: m.amount,
            })
            .collect();
        applied.extend(
            self.option_modifiers
                .iter()
                .filter(|m| m.matches(variant))
                .map(|m| AppliedModifier {
                    label: format!("{} = {}", m.option_name, m.option_value),
                    amount: m.amount,
                }),
        );

        let total = self.base_price + applied.iter().map(|a| a.amount).sum::<Decimal>();
        PriceBreakdown {
            base_price: self.base_price,
            applied,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VariantMetafield;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap_or_default()
    }

    fn variant(options: [Option<&str>; 3], metafields: &[(&str, &str, &str)]) -> VariantAttributes {
        VariantAttributes {
            options: options.map(|o| o.map(str::to_string)),
            metafields: metafields
                .iter()
                .map(|(namespace, key, value)| VariantMetafield {
                    namespace: (*namespace).to_string(),
                    key: (*key).to_string(),
                    value: (*value).to_string(),
                })
                .collect(),
        }
    }

    fn formula() -> PriceFormula {
        PriceFormula {
            base_price: dec("12.00"),
            metafield_modifiers: vec![
                MetafieldModifier {
                    namespace: "custom".to_string(),
                    key: "fabric".to_string(),
                    value: "Lin".to_string(),
                    amount: dec("3.50"),
                },
                MetafieldModifier {
                    namespace: "custom".to_string(),
                    key: "lining".to_string(),
                    value: "Oui".to_string(),
                    amount: dec("2.00"),
                },
            ],
            option_modifiers: vec![
                OptionModifier {
                    option_name: "Taille".to_string(),
                    option_value: "XXL".to_string(),
                    amount: dec("1.25"),
                },
                OptionModifier {
                    option_name: "Couleur".to_string(),
                    option_value: "French Navy".to_string(),
                    amount: dec("0.75"),
                },
            ],
        }
    }

    #[test]
    fn test_base_price_only_when_nothing_matches() {
        let v = variant([Some("M"), Some("Rouge"), None], &[("custom", "fabric", "Coton")]);
        assert_eq!(formula().total_price(&v), dec("12.00"));
    }

    #[test]
    fn test_all_matching_modifiers_stack() {
        let v = variant(
            [Some("XXL"), Some("French Navy"), None],
            &[("custom", "fabric", "Lin"), ("custom", "lining", "Oui")],
        );
        // 12.00 + 3.50 + 2.00 + 1.25 + 0.75
        assert_eq!(formula().total_price(&v), dec("19.50"));
    }

    #[test]
    fn test_option_match_ignores_slot_position() {
        let in_slot_three = variant([Some("Rouge"), Some("Lin"), Some("XXL")], &[]);
        assert_eq!(formula().total_price(&in_slot_three), dec("13.25"));
    }

    #[test]
    fn test_metafield_value_must_match_exactly() {
        let v = variant([None, None, None], &[("custom", "fabric", "lin")]);
        assert_eq!(formula().total_price(&v), dec("12.00"));
    }

    #[test]
    fn test_metafield_identity_matches_regardless_of_case() {
        let f = PriceFormula {
            base_price: dec("12"),
            metafield_modifiers: vec![MetafieldModifier {
                namespace: "Custom".to_string(),
                key: "Fabric".to_string(),
                value: "Lin".to_string(),
                amount: dec("3"),
            }],
            option_modifiers: Vec::new(),
        };
        let v = variant([None, None, None], &[("custom", "fabric", "Lin")]);
        assert_eq!(f.total_price(&v), dec("15"));

        let wrong_value_case = variant([None, None, None], &[("custom", "fabric", "LIN")]);
        assert_eq!(f.total_price(&wrong_value_case), dec("12"));
    }

    #[test]
    fn test_modifier_order_does_not_change_total() {
        let v = variant(
            [Some("XXL"), Some("French Navy"), None],
            &[("custom", "fabric", "Lin"), ("custom", "lining", "Oui")],
        );
        let original = formula();
        let mut permuted = formula();
        permuted.metafield_modifiers.reverse();
        permuted.option_modifiers.reverse();

        assert_eq!(original.total_price(&v), permuted.total_price(&v));
    }

    #[test]
    fn test_negative_modifier_reduces_price() {
        let mut f = formula();
        f.option_modifiers.push(OptionModifier {
            option_name: "Taille".to_string(),
            option_value: "XS".to_string(),
            amount: dec("-1.00"),
        });
        let v = variant([Some("XS"), None, None], &[]);
        assert_eq!(f.total_price(&v), dec("11.00"));
    }

    #[test]
    fn test_breakdown_agrees_with_total() {
        let v = variant(
            [Some("XXL"), None, None],
            &[("custom", "fabric", "Lin")],
        );
        let f = formula();
        let breakdown = f.breakdown(&v);
        assert_eq!(breakdown.total, f.total_price(&v));
        assert_eq!(breakdown.applied.len(), 2);
        assert_eq!(breakdown.applied[0].label, "custom.fabric = Lin");
    }
}

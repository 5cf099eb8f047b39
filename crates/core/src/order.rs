//! Supplier order line arithmetic.
//!
//! Order items are stored one row per physical unit so the workshop can
//! validate and print each unit separately. Each row carries a price
//! snapshot (`unit_price`, `line_total`) taken from the variant cost when the
//! row was created; it only changes on explicit edits or a reprice.
//!
//! Order totals are always derived from the rows:
//!
//! ```text
//! subtotal  = Σ line_total of validated rows
//! total_ht  = subtotal + balance_adjustment
//! total_ttc = total_ht × 1.2
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Multiplier applied to `total_ht` to obtain `total_ttc` (20% VAT).
pub const VAT_MULTIPLIER: Decimal = Decimal::from_parts(12, 0, 0, false, 1);

/// Price and workshop state of one order row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineState {
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub is_validated: bool,
    pub validated_at: Option<DateTime<Utc>>,
    pub is_printed: bool,
    pub printed_at: Option<DateTime<Utc>>,
}

/// Partial update of a row. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LineUpdate {
    pub quantity: Option<i32>,
    pub unit_price: Option<Decimal>,
    pub is_validated: Option<bool>,
    pub is_printed: Option<bool>,
}

/// Rejected line updates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineUpdateError {
    #[error("quantity must be at least 1 (got {0})")]
    InvalidQuantity(i32),
    #[error("unit price cannot be negative (got {0})")]
    NegativePrice(Decimal),
}

/// Derived order totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub total_ht: Decimal,
    pub total_ttc: Decimal,
}

impl LineState {
    /// A fresh single-unit row priced at `unit_cost`.
    #[must_use]
    pub const fn unit(unit_cost: Decimal) -> Self {
        Self {
            quantity: 1,
            unit_price: unit_cost,
            line_total: unit_cost,
            is_validated: false,
            validated_at: None,
            is_printed: false,
            printed_at: None,
        }
    }

    /// Apply a partial update. Returns `true` when the order totals must be
    /// recomputed (quantity, price or validation touched).
    ///
    /// # Errors
    ///
    /// Returns `LineUpdateError` for a quantity below 1 or a negative price;
    /// the row is left untouched in that case.
    pub fn apply(&mut self, update: &LineUpdate, now: DateTime<Utc>) -> Result<bool, LineUpdateError> {
        if let Some(quantity) = update.quantity
            && quantity < 1
        {
            return Err(LineUpdateError::InvalidQuantity(quantity));
        }
        if let Some(price) = update.unit_price
            && price.is_sign_negative()
        {
            return Err(LineUpdateError::NegativePrice(price));
        }

        if let Some(validated) = update.is_validated
            && validated != self.is_validated
        {
            self.is_validated = validated;
            self.validated_at = validated.then_some(now);
        }

        if let Some(printed) = update.is_printed
            && printed != self.is_printed
        {
            self.is_printed = printed;
            self.printed_at = printed.then_some(now);
        }

        if update.quantity.is_some() || update.unit_price.is_some() {
            self.quantity = update.quantity.unwrap_or(self.quantity);
            self.unit_price = update.unit_price.unwrap_or(self.unit_price);
            self.line_total = self.unit_price * Decimal::from(self.quantity);
        }

        Ok(update.quantity.is_some() || update.unit_price.is_some() || update.is_validated.is_some())
    }

    /// Overwrite the price snapshot with the variant's current cost.
    pub fn reprice(&mut self, current_cost: Decimal) {
        self.unit_price = current_cost;
        self.line_total = current_cost * Decimal::from(self.quantity);
    }
}

/// Expand a requested quantity into single-unit rows.
///
/// A request for `n` units yields `n` rows of quantity 1, never one row of
/// quantity `n`. Non-positive quantities yield nothing.
pub fn expand_units(quantity: i32, unit_cost: Decimal) -> impl Iterator<Item = LineState> {
    let count = usize::try_from(quantity).unwrap_or(0);
    std::iter::repeat_n(LineState::unit(unit_cost), count)
}

impl OrderTotals {
    /// Compute totals from `(is_validated, line_total)` pairs.
    pub fn compute<I>(lines: I, balance_adjustment: Decimal) -> Self
    where
        I: IntoIterator<Item = (bool, Decimal)>,
    {
        let subtotal: Decimal = lines
            .into_iter()
            .filter(|(validated, _)| *validated)
            .map(|(_, total)| total)
            .sum();
        let total_ht = subtotal + balance_adjustment;

        Self {
            subtotal,
            total_ht,
            total_ttc: total_ht * VAT_MULTIPLIER,
        }
    }

    /// Totals for a set of rows.
    pub fn from_lines<'a, I>(lines: I, balance_adjustment: Decimal) -> Self
    where
        I: IntoIterator<Item = &'a LineState>,
    {
        Self::compute(
            lines.into_iter().map(|l| (l.is_validated, l.line_total)),
            balance_adjustment,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn validated(total: &str) -> LineState {
        let mut line = LineState::unit(dec(total));
        line.is_validated = true;
        line
    }

    #[test]
    fn test_vat_multiplier_is_exact() {
        assert_eq!(VAT_MULTIPLIER, dec("1.2"));
    }

    #[test]
    fn test_totals_count_only_validated_rows() {
        let lines = vec![validated("10.00"), validated("15.00"), LineState::unit(dec("99.00"))];
        let totals = OrderTotals::from_lines(&lines, dec("-5"));

        assert_eq!(totals.subtotal, dec("25.00"));
        assert_eq!(totals.total_ht, dec("20.00"));
        assert_eq!(totals.total_ttc, dec("24.00"));
    }

    #[test]
    fn test_totals_empty_order_keeps_adjustment() {
        let totals = OrderTotals::from_lines(&[], dec("12.50"));
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.total_ht, dec("12.50"));
        assert_eq!(totals.total_ttc, dec("15.00"));
    }

    #[test]
    fn test_totals_with_negative_ht() {
        let totals = OrderTotals::compute([(true, dec("3.00"))], dec("-10.00"));
        assert_eq!(totals.total_ht, dec("-7.00"));
        assert_eq!(totals.total_ttc, dec("-8.40"));
    }

    #[test]
    fn test_expand_units_creates_one_row_per_unit() {
        let rows: Vec<_> = expand_units(3, dec("7.50")).collect();
        assert_eq!(rows.len(), 3);
        for row in rows {
            assert_eq!(row.quantity, 1);
            assert_eq!(row.unit_price, dec("7.50"));
            assert_eq!(row.line_total, dec("7.50"));
            assert!(!row.is_validated);
        }
        assert_eq!(expand_units(0, dec("7.50")).count(), 0);
        assert_eq!(expand_units(-2, dec("7.50")).count(), 0);
    }

    #[test]
    fn test_validation_toggle_stamps_timestamp() {
        let now = Utc::now();
        let mut line = LineState::unit(dec("5.00"));

        let dirty = line
            .apply(&LineUpdate { is_validated: Some(true), ..LineUpdate::default() }, now)
            .unwrap();
        assert!(dirty);
        assert!(line.is_validated);
        assert_eq!(line.validated_at, Some(now));

        line.apply(&LineUpdate { is_validated: Some(false), ..LineUpdate::default() }, now)
            .unwrap();
        assert_eq!(line.validated_at, None);
    }

    #[test]
    fn test_print_toggle_does_not_dirty_totals() {
        let now = Utc::now();
        let mut line = LineState::unit(dec("5.00"));
        let dirty = line
            .apply(&LineUpdate { is_printed: Some(true), ..LineUpdate::default() }, now)
            .unwrap();
        assert!(!dirty);
        assert!(line.is_printed);
        assert_eq!(line.printed_at, Some(now));
    }

    #[test]
    fn test_quantity_change_uses_stored_price() {
        let mut line = LineState::unit(dec("4.20"));
        line.apply(&LineUpdate { quantity: Some(3), ..LineUpdate::default() }, Utc::now())
            .unwrap();
        assert_eq!(line.line_total, dec("12.60"));
        assert_eq!(line.line_total, line.unit_price * Decimal::from(line.quantity));
    }

    #[test]
    fn test_price_change_uses_stored_quantity() {
        let mut line = LineState::unit(dec("4.20"));
        line.quantity = 2;
        line.apply(&LineUpdate { unit_price: Some(dec("6.00")), ..LineUpdate::default() }, Utc::now())
            .unwrap();
        assert_eq!(line.line_total, dec("12.00"));
    }

    #[test]
    fn test_invalid_update_leaves_row_untouched() {
        let mut line = LineState::unit(dec("4.20"));
        let before = line.clone();
        let err = line
            .apply(
                &LineUpdate { quantity: Some(0), is_validated: Some(true), ..LineUpdate::default() },
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err, LineUpdateError::InvalidQuantity(0));
        assert_eq!(line, before);

        assert!(matches!(
            line.apply(&LineUpdate { unit_price: Some(dec("-1")), ..LineUpdate::default() }, Utc::now()),
            Err(LineUpdateError::NegativePrice(_))
        ));
    }

    #[test]
    fn test_reprice_is_idempotent() {
        let mut line = LineState::unit(dec("4.20"));
        line.quantity = 2;
        line.reprice(dec("5.10"));
        let once = line.clone();
        line.reprice(dec("5.10"));
        assert_eq!(line, once);
        assert_eq!(line.line_total, dec("10.20"));
    }
}

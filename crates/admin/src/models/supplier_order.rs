//! Supplier (production) orders and their unit rows.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ivy_core::order::{LineState, LineUpdate, OrderTotals};
use ivy_core::{ShopId, SupplierOrderId, SupplierOrderItemId, SupplierOrderStatus, VariantId};

/// A production order sent to the workshop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierOrder {
    pub id: SupplierOrderId,
    pub shop_id: ShopId,
    pub reference: Option<String>,
    pub status: SupplierOrderStatus,
    pub subtotal: Decimal,
    pub total_ht: Decimal,
    pub total_ttc: Decimal,
    pub balance_adjustment: Decimal,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SupplierOrder {
    #[must_use]
    pub const fn totals(&self) -> OrderTotals {
        OrderTotals {
            subtotal: self.subtotal,
            total_ht: self.total_ht,
            total_ttc: self.total_ttc,
        }
    }
}

/// One physical unit of an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierOrderItem {
    pub id: SupplierOrderItemId,
    pub order_id: SupplierOrderId,
    pub variant_id: VariantId,
    pub product_title: String,
    pub variant_title: Option<String>,
    pub sku: Option<String>,
    #[serde(flatten)]
    pub line: LineState,
    /// Configured metafields, display name → value.
    pub metafields: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

/// A unit row ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub variant_id: VariantId,
    pub product_title: String,
    pub variant_title: Option<String>,
    pub sku: Option<String>,
    pub line: LineState,
    pub metafields: BTreeMap<String, String>,
}

/// An order with its rows.
#[derive(Debug, Clone, Serialize)]
pub struct SupplierOrderWithItems {
    #[serde(flatten)]
    pub order: SupplierOrder,
    pub items: Vec<SupplierOrderItem>,
}

/// Input for creating a draft order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateOrderInput {
    pub reference: Option<String>,
    pub note: Option<String>,
}

/// Input for updating an order. Totals are never accepted from clients.
///
/// An empty `note` or `reference` clears the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateOrderInput {
    pub status: Option<SupplierOrderStatus>,
    pub note: Option<String>,
    pub reference: Option<String>,
    pub balance_adjustment: Option<Decimal>,
}

/// One entry of an add-items request.
#[derive(Debug, Clone, Deserialize)]
pub struct AddItemEntry {
    pub variant_id: VariantId,
    /// Title shown on the order; defaults to the product title.
    pub title: Option<String>,
    /// SKU shown on the order; defaults to the variant SKU.
    pub sku: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

const fn default_quantity() -> i32 {
    1
}

/// Partial update of a unit row.
pub type UpdateItemInput = LineUpdate;

/// Bulk actions over every row of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderItemsAction {
    RecalculatePrices,
    RefreshMetafields,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_item_entry_defaults_quantity() {
        let entry: AddItemEntry = serde_json::from_str(
            r#"{"variant_id": "67e55044-10b1-426f-9247-bb680e5fe0c8"}"#,
        )
        .unwrap();
        assert_eq!(entry.quantity, 1);
        assert!(entry.title.is_none());
    }

    #[test]
    fn test_action_names() {
        let action: OrderItemsAction = serde_json::from_str(r#""recalculate_prices""#).unwrap();
        assert_eq!(action, OrderItemsAction::RecalculatePrices);
        let action: OrderItemsAction = serde_json::from_str(r#""refresh_metafields""#).unwrap();
        assert_eq!(action, OrderItemsAction::RefreshMetafields);
        assert!(serde_json::from_str::<OrderItemsAction>(r#""delete_all""#).is_err());
    }

    #[test]
    fn test_item_serializes_line_inline() {
        let item = SupplierOrderItem {
            id: SupplierOrderItemId::generate(),
            order_id: SupplierOrderId::generate(),
            variant_id: VariantId::generate(),
            product_title: "Chemise".to_string(),
            variant_title: Some("M / Rouge".to_string()),
            sku: None,
            line: LineState::unit("7.50".parse().unwrap()),
            metafields: BTreeMap::new(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["quantity"], 1);
        assert_eq!(json["unit_price"], "7.50");
        assert_eq!(json["is_validated"], false);
    }
}

//! REST payloads exchanged with the Shopify Admin API.
//!
//! Only the fields Ivy reads are declared; everything else in Shopify's
//! responses is ignored.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ivy_core::{InventoryItemId, ShopifyProductId, ShopifyVariantId};

use crate::models::{UpsertProduct, UpsertVariant};

/// `GET products.json`
#[derive(Debug, Clone, Deserialize)]
pub struct ProductsPage {
    pub products: Vec<RestProduct>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestProduct {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub product_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub options: Vec<RestProductOption>,
    #[serde(default)]
    pub variants: Vec<RestVariant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestProductOption {
    pub name: String,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestVariant {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    pub sku: Option<String>,
    pub option1: Option<String>,
    pub option2: Option<String>,
    pub option3: Option<String>,
    #[serde(default)]
    pub price: Decimal,
    pub inventory_item_id: Option<i64>,
}

impl RestProduct {
    /// Fields stored for the product. Option names are ordered by position.
    #[must_use]
    pub fn to_upsert(&self) -> UpsertProduct {
        let mut options: Vec<&RestProductOption> = self.options.iter().collect();
        options.sort_by_key(|o| o.position);

        UpsertProduct {
            shopify_id: ShopifyProductId::new(self.id),
            title: self.title.clone(),
            product_type: self.product_type.trim().to_string(),
            status: self.status.clone(),
            option_names: options.into_iter().take(3).map(|o| o.name.clone()).collect(),
        }
    }
}

impl RestVariant {
    #[must_use]
    pub fn to_upsert(&self) -> UpsertVariant {
        UpsertVariant {
            shopify_id: ShopifyVariantId::new(self.id),
            title: self.title.clone(),
            sku: self.sku.clone().filter(|s| !s.trim().is_empty()),
            options: [
                self.option1.clone(),
                self.option2.clone(),
                self.option3.clone(),
            ],
            price: self.price,
            inventory_item_id: self.inventory_item_id.map(InventoryItemId::new),
        }
    }
}

/// `GET inventory_items.json`
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryItemsPage {
    pub inventory_items: Vec<RestInventoryItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestInventoryItem {
    pub id: i64,
    pub cost: Option<Decimal>,
}

/// `GET inventory_levels.json`
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryLevelsPage {
    pub inventory_levels: Vec<RestInventoryLevel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestInventoryLevel {
    pub inventory_item_id: i64,
    pub location_id: i64,
    pub available: Option<i64>,
}

/// `PUT inventory_items/{id}.json`
#[derive(Debug, Clone, Serialize)]
pub struct InventoryItemCostUpdate {
    pub inventory_item: InventoryItemCost,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryItemCost {
    pub id: i64,
    pub cost: Decimal,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_page_parses_string_prices() {
        let page: ProductsPage = serde_json::from_str(
            r#"{"products": [{
                "id": 632910392,
                "title": "Chemise Lin",
                "product_type": "Chemise ",
                "status": "active",
                "options": [
                    {"name": "Couleur", "position": 2},
                    {"name": "Taille", "position": 1}
                ],
                "variants": [{
                    "id": 808950810,
                    "title": "M / Rouge",
                    "sku": "",
                    "option1": "M",
                    "option2": "Rouge",
                    "option3": null,
                    "price": "39.00",
                    "inventory_item_id": 39072856
                }]
            }]}"#,
        )
        .unwrap();

        let product = &page.products[0];
        let upsert = product.to_upsert();
        assert_eq!(upsert.product_type, "Chemise");
        assert_eq!(upsert.option_names, vec!["Taille", "Couleur"]);

        let variant = product.variants[0].to_upsert();
        assert_eq!(variant.price, "39.00".parse::<Decimal>().unwrap());
        assert_eq!(variant.sku, None);
        assert_eq!(variant.options[1].as_deref(), Some("Rouge"));
        assert_eq!(variant.inventory_item_id, Some(InventoryItemId::new(39_072_856)));
    }

    #[test]
    fn test_inventory_item_with_null_cost() {
        let page: InventoryItemsPage = serde_json::from_str(
            r#"{"inventory_items": [{"id": 1, "cost": "7.50"}, {"id": 2, "cost": null}]}"#,
        )
        .unwrap();
        assert_eq!(page.inventory_items[0].cost, Some("7.50".parse().unwrap()));
        assert_eq!(page.inventory_items[1].cost, None);
    }

    #[test]
    fn test_cost_update_serializes_decimal_as_string() {
        let body = InventoryItemCostUpdate {
            inventory_item: InventoryItemCost {
                id: 42,
                cost: "12.50".parse().unwrap(),
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["inventory_item"]["cost"], "12.50");
    }
}

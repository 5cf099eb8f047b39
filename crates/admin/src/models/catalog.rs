//! Local mirror of the Shopify catalog: products, variants, stock levels.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ivy_core::pricing::VariantAttributes;
use ivy_core::{
    InventoryItemId, LocationId, MetafieldConfigId, MetafieldKey, MetafieldSet, ProductId,
    ShopId, ShopifyProductId, ShopifyVariantId, VariantId,
};

/// A product mirrored from Shopify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub shop_id: ShopId,
    pub shopify_id: ShopifyProductId,
    pub title: String,
    pub product_type: String,
    pub status: String,
    /// Names of the (up to 3) option slots, in position order.
    pub option_names: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// A product variant mirrored from Shopify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub shopify_id: ShopifyVariantId,
    pub title: String,
    pub sku: Option<String>,
    pub options: [Option<String>; 3],
    /// Unit cost (Shopify inventory item cost).
    pub cost: Decimal,
    /// Unit sale price.
    pub price: Decimal,
    pub inventory_item_id: Option<InventoryItemId>,
    pub updated_at: DateTime<Utc>,
}

/// A variant joined with what pricing needs from its product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricedVariant {
    pub variant: Variant,
    pub product_title: String,
    pub product_type: String,
}

impl PricedVariant {
    /// Attributes a price rule looks at, given the variant's metafields.
    #[must_use]
    pub fn attributes(&self, metafields: MetafieldSet) -> VariantAttributes {
        VariantAttributes {
            options: self.variant.options.clone(),
            metafields,
        }
    }
}

/// Stock of one variant at one location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryLevel {
    pub variant_id: VariantId,
    pub location_id: LocationId,
    pub quantity: i64,
    pub updated_at: DateTime<Utc>,
}

/// Product fields written during a sync.
#[derive(Debug, Clone)]
pub struct UpsertProduct {
    pub shopify_id: ShopifyProductId,
    pub title: String,
    pub product_type: String,
    pub status: String,
    pub option_names: Vec<String>,
}

/// Variant fields written during a sync. Cost is filled in a later pass.
#[derive(Debug, Clone)]
pub struct UpsertVariant {
    pub shopify_id: ShopifyVariantId,
    pub title: String,
    pub sku: Option<String>,
    pub options: [Option<String>; 3],
    pub price: Decimal,
    pub inventory_item_id: Option<InventoryItemId>,
}

/// One configured metafield: which platform metafield to fetch, and the
/// label it is stored under on order items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetafieldConfig {
    pub id: MetafieldConfigId,
    pub shop_id: ShopId,
    pub namespace: String,
    pub key: String,
    pub display_name: String,
}

impl MetafieldConfig {
    #[must_use]
    pub fn metafield_key(&self) -> MetafieldKey {
        MetafieldKey::new(&self.namespace, &self.key)
    }
}

/// `(key, display name)` pairs in the shape the Shopify client filters with.
#[must_use]
pub fn metafield_keys(config: &[MetafieldConfig]) -> Vec<(MetafieldKey, String)> {
    config
        .iter()
        .map(|c| (c.metafield_key(), c.display_name.clone()))
        .collect()
}

/// Input for adding a metafield configuration entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMetafieldConfigInput {
    pub namespace: String,
    pub key: String,
    pub display_name: Option<String>,
}

//! Per-run mapping between Shopify numeric IDs and internal UUIDs.
//!
//! Built from the rows upserted during the current run and dropped with it.
//! A lookup miss means the unit is skipped by the caller.

use std::collections::HashMap;

use ivy_core::{InventoryItemId, ProductId, ShopifyProductId, ShopifyVariantId, VariantId};

#[derive(Debug, Default, Clone)]
pub struct IdMap {
    products: HashMap<ShopifyProductId, ProductId>,
    inventory_items: HashMap<InventoryItemId, VariantId>,
    variants: HashMap<VariantId, ShopifyVariantId>,
}

impl IdMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_product(&mut self, shopify_id: ShopifyProductId, id: ProductId) {
        self.products.insert(shopify_id, id);
    }

    pub fn insert_variant(
        &mut self,
        id: VariantId,
        shopify_id: ShopifyVariantId,
        inventory_item_id: Option<InventoryItemId>,
    ) {
        self.variants.insert(id, shopify_id);
        if let Some(item) = inventory_item_id {
            self.inventory_items.insert(item, id);
        }
    }

    #[must_use]
    pub fn product(&self, shopify_id: ShopifyProductId) -> Option<ProductId> {
        self.products.get(&shopify_id).copied()
    }

    #[must_use]
    pub fn variant_for_inventory_item(&self, item: InventoryItemId) -> Option<VariantId> {
        self.inventory_items.get(&item).copied()
    }

    #[must_use]
    pub fn shopify_variant(&self, id: VariantId) -> Option<ShopifyVariantId> {
        self.variants.get(&id).copied()
    }

    /// Every known inventory item, sorted for deterministic batching.
    #[must_use]
    pub fn inventory_item_ids(&self) -> Vec<InventoryItemId> {
        let mut ids: Vec<InventoryItemId> = self.inventory_items.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookups_in_all_three_directions() {
        let mut map = IdMap::new();
        let product = ProductId::generate();
        let variant = VariantId::generate();
        map.insert_product(ShopifyProductId::new(10), product);
        map.insert_variant(variant, ShopifyVariantId::new(20), Some(InventoryItemId::new(30)));

        assert_eq!(map.product(ShopifyProductId::new(10)), Some(product));
        assert_eq!(map.variant_for_inventory_item(InventoryItemId::new(30)), Some(variant));
        assert_eq!(map.shopify_variant(variant), Some(ShopifyVariantId::new(20)));
    }

    #[test]
    fn test_misses_return_none() {
        let mut map = IdMap::new();
        map.insert_variant(VariantId::generate(), ShopifyVariantId::new(1), None);

        assert_eq!(map.product(ShopifyProductId::new(99)), None);
        assert_eq!(map.variant_for_inventory_item(InventoryItemId::new(99)), None);
        assert_eq!(map.shopify_variant(VariantId::generate()), None);
        assert!(map.inventory_item_ids().is_empty());
        assert_eq!(map.variant_count(), 1);
    }

    #[test]
    fn test_inventory_item_ids_sorted() {
        let mut map = IdMap::new();
        for item in [5, 1, 3] {
            map.insert_variant(
                VariantId::generate(),
                ShopifyVariantId::new(item * 10),
                Some(InventoryItemId::new(item)),
            );
        }
        let ids: Vec<i64> = map.inventory_item_ids().iter().map(InventoryItemId::as_i64).collect();
        assert_eq!(ids, vec![1, 3, 5]);
    }
}

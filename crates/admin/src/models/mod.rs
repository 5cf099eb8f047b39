//! Domain models for the admin service.
//!
//! Repositories convert their row structs into these types; routes and
//! services only ever see these.

pub mod catalog;
pub mod color_rule;
pub mod price_rule;
pub mod shop;
pub mod supplier_order;

pub use catalog::{
    CreateMetafieldConfigInput, InventoryLevel, MetafieldConfig, PricedVariant, Product,
    UpsertProduct, UpsertVariant, Variant, metafield_keys,
};
pub use color_rule::{ColorRule, ColorRuleInput};
pub use price_rule::{ApplyTarget, PricePreview, PriceRule, PriceRuleInput};
pub use shop::{CreateShopInput, Shop};
pub use supplier_order::{
    AddItemEntry, CreateOrderInput, NewOrderItem, OrderItemsAction, SupplierOrder,
    SupplierOrderItem, SupplierOrderWithItems, UpdateItemInput, UpdateOrderInput,
};

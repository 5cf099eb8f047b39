//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! # Inventory
//! GET    /api/shops/{shop_id}/inventory/stats?location_id=   - Stock statistics
//! POST   /api/shops/{shop_id}/sync/inventory                 - Sync from Shopify (SSE)
//!
//! # Supplier orders
//! GET    /api/shops/{shop_id}/orders                         - List orders
//! POST   /api/shops/{shop_id}/orders                         - Create a draft order
//! GET    /api/orders/{order_id}                              - Order with items
//! PUT    /api/orders/{order_id}                              - Status, note, adjustment
//! GET    /api/orders/{order_id}/items                        - Items
//! POST   /api/orders/{order_id}/items                        - Add items
//! PUT    /api/orders/{order_id}/items/{item_id}              - Update an item
//! DELETE /api/orders/{order_id}/items/{item_id}              - Delete an item
//! POST   /api/orders/{order_id}/items/actions                - Bulk item action
//!
//! # Price rules
//! GET    /api/shops/{shop_id}/price-rules                    - List rules
//! POST   /api/shops/{shop_id}/price-rules                    - Create a rule
//! POST   /api/shops/{shop_id}/price-rules/apply?target=      - Apply all active rules (SSE)
//! GET    /api/price-rules/{rule_id}                          - Get a rule
//! PUT    /api/price-rules/{rule_id}                          - Replace a rule
//! DELETE /api/price-rules/{rule_id}                          - Delete a rule
//! GET    /api/price-rules/{rule_id}/preview?limit=           - Preview prices
//! POST   /api/price-rules/{rule_id}/apply?target=            - Apply one rule (SSE)
//!
//! # Color rules
//! GET    /api/shops/{shop_id}/color-rules                    - List rules
//! POST   /api/shops/{shop_id}/color-rules                    - Create a rule
//! PUT    /api/color-rules/{rule_id}                          - Replace a rule
//! DELETE /api/color-rules/{rule_id}                          - Delete a rule
//!
//! # Metafield configuration
//! GET    /api/shops/{shop_id}/metafield-config               - List entries
//! POST   /api/shops/{shop_id}/metafield-config               - Add an entry
//! DELETE /api/metafield-config/{id}                          - Remove an entry
//! ```
//!
//! Health checks (`/health`, `/health/ready`) are mounted by `crate::app`.

pub mod color_rules;
pub mod inventory;
pub mod metafield_config;
pub mod orders;
pub mod price_rules;
pub mod sse;
pub mod sync;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(inventory::router())
        .merge(sync::router())
        .merge(orders::router())
        .merge(price_rules::router())
        .merge(color_rules::router())
        .merge(metafield_config::router())
}

//! Business logic services for admin.
//!
//! # Services
//!
//! - `inventory_sync` - Mirror products, costs and stock levels from Shopify
//! - `supplier_orders` - Supplier order pipeline (unit rows, totals, metafields)
//! - `price_rules` - Price rule CRUD, preview and bulk application
//! - `color_palette` - Reception color names to swatches
//! - `progress` - Progress events for long-running operations

pub mod color_palette;
pub mod inventory_sync;
pub mod price_rules;
pub mod progress;
pub mod supplier_orders;

use sqlx::PgPool;

use ivy_core::ShopId;

pub use color_palette::{ColorPalette, ColorRuleService, ColorSwatch, color_key};
pub use inventory_sync::{SyncSummary, sync_inventory};
pub use price_rules::{ApplySummary, PriceRuleService};
pub use progress::{DoneGuard, ProgressReporter, into_stream, spawn_with_progress};
pub use supplier_orders::{SupplierOrderService, UpdatedItem};

use crate::config::ShopifyConfig;
use crate::db::ShopRepository;
use crate::error::AppError;
use crate::models::Shop;
use crate::shopify::ShopifyClient;

/// Handles every service needs: the pool, the shared HTTP client and the
/// Shopify settings. Cheap to clone into spawned tasks.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub pool: PgPool,
    pub http: reqwest::Client,
    pub shopify: ShopifyConfig,
}

impl ServiceContext {
    #[must_use]
    pub const fn new(pool: PgPool, http: reqwest::Client, shopify: ShopifyConfig) -> Self {
        Self {
            pool,
            http,
            shopify,
        }
    }

    /// Load a shop or fail with `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown shop, or a database error.
    pub async fn load_shop(&self, shop_id: ShopId) -> Result<Shop, AppError> {
        ShopRepository::new(&self.pool)
            .get(shop_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("shop {shop_id}")))
    }

    /// Shopify client authenticated as `shop`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Shopify` if the shop URL is invalid.
    pub fn shopify_client(&self, shop: &Shop) -> Result<ShopifyClient, AppError> {
        Ok(ShopifyClient::for_shop(
            self.http.clone(),
            shop,
            &self.shopify,
        )?)
    }
}

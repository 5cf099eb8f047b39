//! Database operations for the Ivy `PostgreSQL` schema.
//!
//! # Schema: `ivy`
//!
//! ## Tables
//!
//! - `shops` - Connected Shopify shops and their access tokens
//! - `products` / `product_variants` - Catalog mirrored from Shopify
//! - `inventory_levels` - Stock per variant and location
//! - `metafield_config` - Variant metafields attached to order items
//! - `supplier_orders` / `supplier_order_items` - Production orders, one item row per unit
//! - `price_rules` (+ `price_rule_metafield_modifiers`, `price_rule_option_modifiers`)
//! - `color_rules` - Reception color name mappings
//!
//! # Migrations
//!
//! Migrations are stored in `crates/admin/migrations/` and run via:
//! ```bash
//! cargo run -p ivy-cli -- migrate
//! ```

pub mod catalog;
pub mod color_rules;
pub mod metafield_config;
pub mod price_rules;
pub mod shops;
pub mod supplier_orders;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use catalog::CatalogRepository;
pub use color_rules::ColorRuleRepository;
pub use metafield_config::MetafieldConfigRepository;
pub use price_rules::PriceRuleRepository;
pub use shops::ShopRepository;
pub use supplier_orders::{OrderChanges, SupplierOrderRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate product type rule).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to `Conflict`, anything else to `Database`.
    pub(crate) fn on_unique_violation(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

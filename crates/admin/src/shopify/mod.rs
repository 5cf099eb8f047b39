//! Shopify Admin API client (HIGH PRIVILEGE).
//!
//! One [`ShopifyClient`] per connected shop, built from the shop's stored
//! access token. The client covers what Ivy needs from Shopify:
//!
//! - REST `products.json`, paginated through the `Link` header
//! - REST `inventory_items.json` / `inventory_levels.json`, batched
//! - REST `inventory_items/{id}.json` to write costs back
//! - GraphQL `nodes` to fetch variant metafields
//!
//! Batched calls retry on HTTP 429 following a [`RetryPolicy`]. A failed
//! batch is reported through the caller's progress reporter and never aborts
//! the batches after it.

mod client;
pub mod id_map;
mod inventory;
mod metafields;
mod pagination;
mod products;
mod retry;
pub mod types;

pub use client::{ShopifyClient, shop_base_url};
pub use id_map::IdMap;
pub use inventory::InventoryLevelRecord;
pub use pagination::next_page_url;
pub use retry::RetryPolicy;

use thiserror::Error;

/// Errors that can occur when interacting with the Shopify Admin API.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication/authorization failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-success HTTP status.
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The shop URL could not be turned into an API base URL.
    #[error("Invalid shop URL: {0}")]
    InvalidShopUrl(String),
}

/// A GraphQL error returned by the Shopify Admin API.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Path to the error in the response.
    #[serde(default)]
    pub path: Vec<serde_json::Value>,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|e| e.message.clone())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphql_error_formatting() {
        let errors = vec![
            GraphQLError {
                message: "Field not found".to_string(),
                path: vec![],
            },
            GraphQLError {
                message: "Invalid ID".to_string(),
                path: vec![],
            },
        ];
        let err = ShopifyError::GraphQL(errors);
        assert_eq!(err.to_string(), "GraphQL errors: Field not found; Invalid ID");
    }

    #[test]
    fn test_rate_limited_error() {
        let err = ShopifyError::RateLimited(2);
        assert_eq!(err.to_string(), "Rate limited, retry after 2 seconds");
    }

    #[test]
    fn test_status_error() {
        let err = ShopifyError::Status {
            status: 500,
            body: "oops".to_string(),
        };
        assert_eq!(err.to_string(), "Unexpected status 500: oops");
    }
}

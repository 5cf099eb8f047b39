//! Connected Shopify shops.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;

use ivy_core::ShopId;

/// A Shopify shop Ivy is connected to.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone, Serialize)]
pub struct Shop {
    pub id: ShopId,
    pub name: String,
    /// Shop domain (`my-shop.myshopify.com`) or full base URL.
    pub shopify_url: String,
    /// Admin API access token (HIGH PRIVILEGE).
    #[serde(skip)]
    pub access_token: SecretString,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for Shop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shop")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("shopify_url", &self.shopify_url)
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Input for registering a shop.
#[derive(Debug, Clone)]
pub struct CreateShopInput {
    pub name: String,
    pub shopify_url: String,
    pub access_token: SecretString,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shop_debug_redacts_token() {
        let shop = Shop {
            id: ShopId::generate(),
            name: "Atelier".to_string(),
            shopify_url: "atelier.myshopify.com".to_string(),
            access_token: SecretString::from("shpat_super_secret_token"),
            created_at: Utc::now(),
        };
        let debug_output = format!("{shop:?}");
        assert!(debug_output.contains("atelier.myshopify.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("shpat_super_secret_token"));
    }
}

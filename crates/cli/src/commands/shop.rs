//! Shop registration commands.
//!
//! Shops are only registered from the command line. The HTTP API never
//! accepts access tokens.

use ivy_admin::db::{RepositoryError, ShopRepository, create_pool};
use ivy_admin::models::CreateShopInput;
use secrecy::SecretString;
use thiserror::Error;

/// Errors that can occur during shop operations.
#[derive(Debug, Error)]
pub enum ShopError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Repository(#[from] RepositoryError),

    #[error("Invalid value for {0}: must not be empty")]
    Empty(&'static str),
}

async fn connect() -> Result<sqlx::PgPool, ShopError> {
    let database_url = super::database_url().ok_or(ShopError::MissingEnvVar("IVY_DATABASE_URL"))?;
    Ok(create_pool(&database_url).await?)
}

/// Register a shop and log its ID.
///
/// # Errors
///
/// Returns `ShopError` on empty arguments, database failures or a URL that
/// is already registered.
pub async fn create(name: &str, url: &str, token: String) -> Result<(), ShopError> {
    let name = name.trim().to_string();
    let shopify_url = url.trim().trim_end_matches('/').to_string();
    if name.is_empty() {
        return Err(ShopError::Empty("name"));
    }
    if shopify_url.is_empty() {
        return Err(ShopError::Empty("url"));
    }
    if token.trim().is_empty() {
        return Err(ShopError::Empty("token"));
    }

    let pool = connect().await?;
    let shop = ShopRepository::new(&pool)
        .create(&CreateShopInput {
            name,
            shopify_url,
            access_token: SecretString::from(token),
        })
        .await?;

    tracing::info!(shop_id = %shop.id, name = %shop.name, url = %shop.shopify_url, "Shop registered");
    Ok(())
}

/// Log every registered shop.
///
/// # Errors
///
/// Returns `ShopError` on database failures.
pub async fn list() -> Result<(), ShopError> {
    let pool = connect().await?;
    let shops = ShopRepository::new(&pool).list().await?;

    if shops.is_empty() {
        tracing::info!("No shops registered");
    }
    for shop in shops {
        tracing::info!(shop_id = %shop.id, name = %shop.name, url = %shop.shopify_url, "Shop");
    }
    Ok(())
}

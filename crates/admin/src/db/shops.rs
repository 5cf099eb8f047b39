//! Shop repository.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use uuid::Uuid;

use ivy_core::ShopId;

use super::RepositoryError;
use crate::models::{CreateShopInput, Shop};

/// Internal row type for `PostgreSQL` shop queries.
#[derive(sqlx::FromRow)]
struct ShopRow {
    id: Uuid,
    name: String,
    shopify_url: String,
    access_token: String,
    created_at: DateTime<Utc>,
}

impl From<ShopRow> for Shop {
    fn from(row: ShopRow) -> Self {
        Self {
            id: ShopId::new(row.id),
            name: row.name,
            shopify_url: row.shopify_url,
            access_token: SecretString::from(row.access_token),
            created_at: row.created_at,
        }
    }
}

/// Repository for shop database operations.
pub struct ShopRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShopRepository<'a> {
    /// Create a new shop repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a shop by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ShopId) -> Result<Option<Shop>, RepositoryError> {
        let row = sqlx::query_as::<_, ShopRow>(
            r"
            SELECT id, name, shopify_url, access_token, created_at
            FROM ivy.shops
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// List all shops, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Shop>, RepositoryError> {
        let rows = sqlx::query_as::<_, ShopRow>(
            r"
            SELECT id, name, shopify_url, access_token, created_at
            FROM ivy.shops
            ORDER BY created_at
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Register a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the shop URL is already registered.
    pub async fn create(&self, input: &CreateShopInput) -> Result<Shop, RepositoryError> {
        let row = sqlx::query_as::<_, ShopRow>(
            r"
            INSERT INTO ivy.shops (id, name, shopify_url, access_token)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, shopify_url, access_token, created_at
            ",
        )
        .bind(ShopId::generate().as_uuid())
        .bind(&input.name)
        .bind(&input.shopify_url)
        .bind(input.access_token.expose_secret())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique_violation(e, "shop already registered"))?;

        Ok(row.into())
    }
}

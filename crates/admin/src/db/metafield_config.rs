//! Metafield configuration repository.

use sqlx::PgPool;
use uuid::Uuid;

use ivy_core::{MetafieldConfigId, ShopId};

use super::RepositoryError;
use crate::models::{CreateMetafieldConfigInput, MetafieldConfig};

#[derive(Debug, sqlx::FromRow)]
struct MetafieldConfigRow {
    id: Uuid,
    shop_id: Uuid,
    namespace: String,
    key: String,
    display_name: String,
}

impl From<MetafieldConfigRow> for MetafieldConfig {
    fn from(row: MetafieldConfigRow) -> Self {
        Self {
            id: MetafieldConfigId::new(row.id),
            shop_id: ShopId::new(row.shop_id),
            namespace: row.namespace,
            key: row.key,
            display_name: row.display_name,
        }
    }
}

/// Repository for metafield configuration.
pub struct MetafieldConfigRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MetafieldConfigRepository<'a> {
    /// Create a new metafield configuration repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Configured metafields of a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, shop_id: ShopId) -> Result<Vec<MetafieldConfig>, RepositoryError> {
        let rows = sqlx::query_as::<_, MetafieldConfigRow>(
            r"
            SELECT id, shop_id, namespace, key, display_name
            FROM ivy.metafield_config
            WHERE shop_id = $1
            ORDER BY display_name
            ",
        )
        .bind(shop_id.as_uuid())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Add a configured metafield. The display name defaults to the key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if `namespace.key` is already configured.
    pub async fn create(
        &self,
        shop_id: ShopId,
        input: &CreateMetafieldConfigInput,
    ) -> Result<MetafieldConfig, RepositoryError> {
        let display_name = input
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(input.key.trim());

        let row = sqlx::query_as::<_, MetafieldConfigRow>(
            r"
            INSERT INTO ivy.metafield_config (id, shop_id, namespace, key, display_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, shop_id, namespace, key, display_name
            ",
        )
        .bind(MetafieldConfigId::generate().as_uuid())
        .bind(shop_id.as_uuid())
        .bind(input.namespace.trim())
        .bind(input.key.trim())
        .bind(display_name)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique_violation(e, "metafield already configured"))?;

        Ok(row.into())
    }

    /// Remove a configured metafield.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such entry exists.
    pub async fn delete(&self, id: MetafieldConfigId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM ivy.metafield_config WHERE id = $1")
            .bind(id.as_uuid())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

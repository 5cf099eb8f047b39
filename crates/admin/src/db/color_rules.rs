//! Color rule repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use ivy_core::{ColorRuleId, ShopId};

use super::RepositoryError;
use crate::models::{ColorRule, ColorRuleInput};

#[derive(Debug, sqlx::FromRow)]
struct ColorRuleRow {
    id: Uuid,
    shop_id: Uuid,
    reception_name: String,
    display_name: Option<String>,
    hex_value: String,
    created_at: DateTime<Utc>,
}

impl From<ColorRuleRow> for ColorRule {
    fn from(row: ColorRuleRow) -> Self {
        Self {
            id: ColorRuleId::new(row.id),
            shop_id: ShopId::new(row.shop_id),
            reception_name: row.reception_name,
            display_name: row.display_name,
            hex_value: row.hex_value,
            created_at: row.created_at,
        }
    }
}

/// Repository for color rules.
pub struct ColorRuleRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ColorRuleRepository<'a> {
    /// Create a new color rule repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All color rules of a shop, by reception name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, shop_id: ShopId) -> Result<Vec<ColorRule>, RepositoryError> {
        let rows = sqlx::query_as::<_, ColorRuleRow>(
            r"
            SELECT id, shop_id, reception_name, display_name, hex_value, created_at
            FROM ivy.color_rules
            WHERE shop_id = $1
            ORDER BY reception_name
            ",
        )
        .bind(shop_id.as_uuid())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a color rule by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ColorRuleId) -> Result<Option<ColorRule>, RepositoryError> {
        let row = sqlx::query_as::<_, ColorRuleRow>(
            r"
            SELECT id, shop_id, reception_name, display_name, hex_value, created_at
            FROM ivy.color_rules
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create a color rule. Input must already be validated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the reception name is taken.
    pub async fn create(
        &self,
        shop_id: ShopId,
        input: &ColorRuleInput,
    ) -> Result<ColorRule, RepositoryError> {
        let row = sqlx::query_as::<_, ColorRuleRow>(
            r"
            INSERT INTO ivy.color_rules (id, shop_id, reception_name, display_name, hex_value)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, shop_id, reception_name, display_name, hex_value, created_at
            ",
        )
        .bind(ColorRuleId::generate().as_uuid())
        .bind(shop_id.as_uuid())
        .bind(&input.reception_name)
        .bind(&input.display_name)
        .bind(&input.hex_value)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique_violation(e, "color rule already exists"))?;

        Ok(row.into())
    }

    /// Replace a color rule's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the rule does not exist.
    pub async fn update(
        &self,
        id: ColorRuleId,
        input: &ColorRuleInput,
    ) -> Result<ColorRule, RepositoryError> {
        let row = sqlx::query_as::<_, ColorRuleRow>(
            r"
            UPDATE ivy.color_rules
            SET reception_name = $2, display_name = $3, hex_value = $4
            WHERE id = $1
            RETURNING id, shop_id, reception_name, display_name, hex_value, created_at
            ",
        )
        .bind(id.as_uuid())
        .bind(&input.reception_name)
        .bind(&input.display_name)
        .bind(&input.hex_value)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique_violation(e, "color rule already exists"))?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Delete a color rule.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the rule does not exist.
    pub async fn delete(&self, id: ColorRuleId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM ivy.color_rules WHERE id = $1")
            .bind(id.as_uuid())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

//! Price rule repository.
//!
//! A rule is stored across three tables: the rule itself and one table per
//! modifier kind. Modifiers are always replaced as a whole.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use ivy_core::pricing::{MetafieldModifier, OptionModifier, PriceFormula};
use ivy_core::{PriceRuleId, ShopId};

use super::RepositoryError;
use crate::models::{PriceRule, PriceRuleInput};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct PriceRuleRow {
    id: Uuid,
    shop_id: Uuid,
    product_type: String,
    base_price: Decimal,
    is_active: bool,
    last_applied_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct MetafieldModifierRow {
    rule_id: Uuid,
    namespace: String,
    key: String,
    value: String,
    amount: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct OptionModifierRow {
    rule_id: Uuid,
    option_name: String,
    option_value: String,
    amount: Decimal,
}

impl From<MetafieldModifierRow> for MetafieldModifier {
    fn from(row: MetafieldModifierRow) -> Self {
        Self {
            namespace: row.namespace,
            key: row.key,
            value: row.value,
            amount: row.amount,
        }
    }
}

impl From<OptionModifierRow> for OptionModifier {
    fn from(row: OptionModifierRow) -> Self {
        Self {
            option_name: row.option_name,
            option_value: row.option_value,
            amount: row.amount,
        }
    }
}

impl PriceRuleRow {
    fn into_rule(
        self,
        metafield_modifiers: Vec<MetafieldModifier>,
        option_modifiers: Vec<OptionModifier>,
    ) -> PriceRule {
        PriceRule {
            id: PriceRuleId::new(self.id),
            shop_id: ShopId::new(self.shop_id),
            product_type: self.product_type,
            formula: PriceFormula {
                base_price: self.base_price,
                metafield_modifiers,
                option_modifiers,
            },
            is_active: self.is_active,
            last_applied_at: self.last_applied_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const RULE_COLUMNS: &str =
    "id, shop_id, product_type, base_price, is_active, last_applied_at, created_at, updated_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for price rules and their modifiers.
pub struct PriceRuleRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PriceRuleRepository<'a> {
    /// Create a new price rule repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All rules of a shop, by product type.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(&self, shop_id: ShopId) -> Result<Vec<PriceRule>, RepositoryError> {
        let rows = sqlx::query_as::<_, PriceRuleRow>(&format!(
            "SELECT {RULE_COLUMNS} FROM ivy.price_rules WHERE shop_id = $1 ORDER BY product_type"
        ))
        .bind(shop_id.as_uuid())
        .fetch_all(self.pool)
        .await?;

        self.attach_modifiers(rows).await
    }

    /// Active rules of a shop, by product type.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_active(&self, shop_id: ShopId) -> Result<Vec<PriceRule>, RepositoryError> {
        let rows = sqlx::query_as::<_, PriceRuleRow>(&format!(
            "SELECT {RULE_COLUMNS} FROM ivy.price_rules \
             WHERE shop_id = $1 AND is_active ORDER BY product_type"
        ))
        .bind(shop_id.as_uuid())
        .fetch_all(self.pool)
        .await?;

        self.attach_modifiers(rows).await
    }

    /// Get a rule with its modifiers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: PriceRuleId) -> Result<Option<PriceRule>, RepositoryError> {
        let row = sqlx::query_as::<_, PriceRuleRow>(&format!(
            "SELECT {RULE_COLUMNS} FROM ivy.price_rules WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(self.attach_modifiers(vec![row]).await?.pop())
    }

    /// Create a rule with its modifiers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the shop already has a rule for
    /// this product type.
    pub async fn create(
        &self,
        shop_id: ShopId,
        input: &PriceRuleInput,
    ) -> Result<PriceRule, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, PriceRuleRow>(&format!(
            r"
            INSERT INTO ivy.price_rules (id, shop_id, product_type, base_price, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {RULE_COLUMNS}
            "
        ))
        .bind(PriceRuleId::generate().as_uuid())
        .bind(shop_id.as_uuid())
        .bind(input.product_type.trim())
        .bind(input.formula.base_price)
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            RepositoryError::on_unique_violation(e, "a price rule already exists for this product type")
        })?;

        replace_modifiers(&mut tx, row.id, &input.formula).await?;
        tx.commit().await?;

        Ok(row.into_rule(
            input.formula.metafield_modifiers.clone(),
            input.formula.option_modifiers.clone(),
        ))
    }

    /// Replace a rule's fields and modifiers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the rule does not exist, or
    /// `RepositoryError::Conflict` if the new product type is already ruled.
    pub async fn update(
        &self,
        id: PriceRuleId,
        input: &PriceRuleInput,
    ) -> Result<PriceRule, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, PriceRuleRow>(&format!(
            r"
            UPDATE ivy.price_rules
            SET product_type = $2, base_price = $3, is_active = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {RULE_COLUMNS}
            "
        ))
        .bind(id.as_uuid())
        .bind(input.product_type.trim())
        .bind(input.formula.base_price)
        .bind(input.is_active)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            RepositoryError::on_unique_violation(e, "a price rule already exists for this product type")
        })?
        .ok_or(RepositoryError::NotFound)?;

        replace_modifiers(&mut tx, row.id, &input.formula).await?;
        tx.commit().await?;

        Ok(row.into_rule(
            input.formula.metafield_modifiers.clone(),
            input.formula.option_modifiers.clone(),
        ))
    }

    /// Delete a rule and its modifiers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the rule does not exist.
    pub async fn delete(&self, id: PriceRuleId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM ivy.price_rules WHERE id = $1")
            .bind(id.as_uuid())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Stamp `last_applied_at`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_applied(
        &self,
        id: PriceRuleId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE ivy.price_rules SET last_applied_at = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(at)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    async fn attach_modifiers(
        &self,
        rows: Vec<PriceRuleRow>,
    ) -> Result<Vec<PriceRule>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        let metafield_rows = sqlx::query_as::<_, MetafieldModifierRow>(
            r"
            SELECT rule_id, namespace, key, value, amount
            FROM ivy.price_rule_metafield_modifiers
            WHERE rule_id = ANY($1)
            ORDER BY rule_id, position
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let option_rows = sqlx::query_as::<_, OptionModifierRow>(
            r"
            SELECT rule_id, option_name, option_value, amount
            FROM ivy.price_rule_option_modifiers
            WHERE rule_id = ANY($1)
            ORDER BY rule_id, position
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut metafield_modifiers: HashMap<Uuid, Vec<MetafieldModifier>> = HashMap::new();
        for row in metafield_rows {
            metafield_modifiers.entry(row.rule_id).or_default().push(row.into());
        }
        let mut option_modifiers: HashMap<Uuid, Vec<OptionModifier>> = HashMap::new();
        for row in option_rows {
            option_modifiers.entry(row.rule_id).or_default().push(row.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let metafields = metafield_modifiers.remove(&row.id).unwrap_or_default();
                let options = option_modifiers.remove(&row.id).unwrap_or_default();
                row.into_rule(metafields, options)
            })
            .collect())
    }
}

/// Delete and re-insert both modifier tables of a rule.
async fn replace_modifiers(
    tx: &mut Transaction<'_, Postgres>,
    rule_id: Uuid,
    formula: &PriceFormula,
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM ivy.price_rule_metafield_modifiers WHERE rule_id = $1")
        .bind(rule_id)
        .execute(&mut **tx)
        .await?;
    sqlx::query("DELETE FROM ivy.price_rule_option_modifiers WHERE rule_id = $1")
        .bind(rule_id)
        .execute(&mut **tx)
        .await?;

    if !formula.metafield_modifiers.is_empty() {
        let mods = &formula.metafield_modifiers;
        sqlx::query(
            r"
            INSERT INTO ivy.price_rule_metafield_modifiers
                (rule_id, position, namespace, key, value, amount)
            SELECT $1, m.position::int, m.namespace, m.key, m.value, m.amount
            FROM UNNEST($2::text[], $3::text[], $4::text[], $5::numeric[])
                WITH ORDINALITY AS m(namespace, key, value, amount, position)
            ",
        )
        .bind(rule_id)
        .bind(mods.iter().map(|m| m.namespace.clone()).collect::<Vec<_>>())
        .bind(mods.iter().map(|m| m.key.clone()).collect::<Vec<_>>())
        .bind(mods.iter().map(|m| m.value.clone()).collect::<Vec<_>>())
        .bind(mods.iter().map(|m| m.amount).collect::<Vec<_>>())
        .execute(&mut **tx)
        .await?;
    }

    if !formula.option_modifiers.is_empty() {
        let mods = &formula.option_modifiers;
        sqlx::query(
            r"
            INSERT INTO ivy.price_rule_option_modifiers
                (rule_id, position, option_name, option_value, amount)
            SELECT $1, m.position::int, m.option_name, m.option_value, m.amount
            FROM UNNEST($2::text[], $3::text[], $4::numeric[])
                WITH ORDINALITY AS m(option_name, option_value, amount, position)
            ",
        )
        .bind(rule_id)
        .bind(mods.iter().map(|m| m.option_name.clone()).collect::<Vec<_>>())
        .bind(mods.iter().map(|m| m.option_value.clone()).collect::<Vec<_>>())
        .bind(mods.iter().map(|m| m.amount).collect::<Vec<_>>())
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

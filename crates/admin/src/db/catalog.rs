//! Catalog repository: products, variants and stock levels mirrored from
//! Shopify.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use ivy_core::stats::StockRow;
use ivy_core::{
    InventoryItemId, LocationId, ProductId, ShopId, ShopifyVariantId, VariantId,
};

use super::RepositoryError;
use crate::models::{PricedVariant, UpsertProduct, UpsertVariant, Variant};

// =============================================================================
// Internal Row Types
// =============================================================================

/// A variant joined with its product's title and type.
#[derive(Debug, sqlx::FromRow)]
struct PricedVariantRow {
    id: Uuid,
    product_id: Uuid,
    shopify_id: i64,
    title: String,
    sku: Option<String>,
    option1: Option<String>,
    option2: Option<String>,
    option3: Option<String>,
    cost: Decimal,
    price: Decimal,
    inventory_item_id: Option<i64>,
    updated_at: DateTime<Utc>,
    product_title: String,
    product_type: String,
}

impl From<PricedVariantRow> for PricedVariant {
    fn from(row: PricedVariantRow) -> Self {
        Self {
            variant: Variant {
                id: VariantId::new(row.id),
                product_id: ProductId::new(row.product_id),
                shopify_id: ShopifyVariantId::new(row.shopify_id),
                title: row.title,
                sku: row.sku,
                options: [row.option1, row.option2, row.option3],
                cost: row.cost,
                price: row.price,
                inventory_item_id: row.inventory_item_id.map(InventoryItemId::new),
                updated_at: row.updated_at,
            },
            product_title: row.product_title,
            product_type: row.product_type,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StockRowRecord {
    variant_id: Uuid,
    product_id: Uuid,
    product_title: String,
    product_type: String,
    option1: Option<String>,
    option2: Option<String>,
    option3: Option<String>,
    cost: Decimal,
    price: Decimal,
    quantity: i64,
}

impl From<StockRowRecord> for StockRow {
    fn from(row: StockRowRecord) -> Self {
        Self {
            variant_id: VariantId::new(row.variant_id),
            product_id: ProductId::new(row.product_id),
            product_title: row.product_title,
            product_type: row.product_type,
            options: [row.option1, row.option2, row.option3],
            cost: row.cost,
            price: row.price,
            quantity: row.quantity,
        }
    }
}

const PRICED_VARIANT_COLUMNS: &str = r"
    v.id, v.product_id, v.shopify_id, v.title, v.sku,
    v.option1, v.option2, v.option3, v.cost, v.price,
    v.inventory_item_id, v.updated_at,
    p.title AS product_title, p.product_type
";

// =============================================================================
// Repository
// =============================================================================

/// Repository for the mirrored catalog.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert or update a product keyed by `(shop_id, shopify_id)`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_product(
        &self,
        shop_id: ShopId,
        product: &UpsertProduct,
    ) -> Result<ProductId, RepositoryError> {
        let id: Uuid = sqlx::query_scalar(
            r"
            INSERT INTO ivy.products (id, shop_id, shopify_id, title, product_type, status, option_names)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (shop_id, shopify_id) DO UPDATE SET
                title = EXCLUDED.title,
                product_type = EXCLUDED.product_type,
                status = EXCLUDED.status,
                option_names = EXCLUDED.option_names,
                updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(ProductId::generate().as_uuid())
        .bind(shop_id.as_uuid())
        .bind(product.shopify_id.as_i64())
        .bind(&product.title)
        .bind(&product.product_type)
        .bind(&product.status)
        .bind(&product.option_names)
        .fetch_one(self.pool)
        .await?;

        Ok(ProductId::new(id))
    }

    /// Insert or update a variant keyed by `(product_id, shopify_id)`.
    ///
    /// The stored cost is left untouched; costs come from a separate pass.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_variant(
        &self,
        product_id: ProductId,
        variant: &UpsertVariant,
    ) -> Result<VariantId, RepositoryError> {
        let [option1, option2, option3] = &variant.options;
        let id: Uuid = sqlx::query_scalar(
            r"
            INSERT INTO ivy.product_variants
                (id, product_id, shopify_id, title, sku, option1, option2, option3, price, inventory_item_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (product_id, shopify_id) DO UPDATE SET
                title = EXCLUDED.title,
                sku = EXCLUDED.sku,
                option1 = EXCLUDED.option1,
                option2 = EXCLUDED.option2,
                option3 = EXCLUDED.option3,
                price = EXCLUDED.price,
                inventory_item_id = EXCLUDED.inventory_item_id,
                updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(VariantId::generate().as_uuid())
        .bind(product_id.as_uuid())
        .bind(variant.shopify_id.as_i64())
        .bind(&variant.title)
        .bind(&variant.sku)
        .bind(option1)
        .bind(option2)
        .bind(option3)
        .bind(variant.price)
        .bind(variant.inventory_item_id.map(|id| id.as_i64()))
        .fetch_one(self.pool)
        .await?;

        Ok(VariantId::new(id))
    }

    /// Overwrite the unit cost of several variants.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_variant_costs(
        &self,
        costs: &[(VariantId, Decimal)],
    ) -> Result<u64, RepositoryError> {
        if costs.is_empty() {
            return Ok(0);
        }
        let (ids, amounts): (Vec<Uuid>, Vec<Decimal>) =
            costs.iter().map(|(id, cost)| (id.as_uuid(), *cost)).unzip();

        let result = sqlx::query(
            r"
            UPDATE ivy.product_variants AS v
            SET cost = c.cost, updated_at = NOW()
            FROM UNNEST($1::uuid[], $2::numeric[]) AS c(id, cost)
            WHERE v.id = c.id
            ",
        )
        .bind(ids)
        .bind(amounts)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Insert or update stock levels keyed by `(variant_id, location_id)`.
    ///
    /// Quantities must already be reconciled (non-negative).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert_inventory_levels(
        &self,
        levels: &[(VariantId, LocationId, i64)],
    ) -> Result<u64, RepositoryError> {
        if levels.is_empty() {
            return Ok(0);
        }
        let mut variant_ids = Vec::with_capacity(levels.len());
        let mut location_ids = Vec::with_capacity(levels.len());
        let mut quantities = Vec::with_capacity(levels.len());
        for (variant_id, location_id, quantity) in levels {
            variant_ids.push(variant_id.as_uuid());
            location_ids.push(location_id.as_i64());
            quantities.push(*quantity);
        }

        let result = sqlx::query(
            r"
            INSERT INTO ivy.inventory_levels (variant_id, location_id, quantity)
            SELECT * FROM UNNEST($1::uuid[], $2::bigint[], $3::bigint[])
            ON CONFLICT (variant_id, location_id) DO UPDATE SET
                quantity = EXCLUDED.quantity,
                updated_at = NOW()
            ",
        )
        .bind(variant_ids)
        .bind(location_ids)
        .bind(quantities)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// One row per variant of the shop with its summed stock.
    ///
    /// With a location, only variants stocked at that location are returned
    /// and only that location's quantity is counted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stock_rows(
        &self,
        shop_id: ShopId,
        location_id: Option<LocationId>,
    ) -> Result<Vec<StockRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, StockRowRecord>(
            r"
            SELECT
                v.id AS variant_id,
                p.id AS product_id,
                p.title AS product_title,
                p.product_type,
                v.option1, v.option2, v.option3,
                v.cost, v.price,
                COALESCE(SUM(GREATEST(l.quantity, 0)), 0)::bigint AS quantity
            FROM ivy.product_variants v
            JOIN ivy.products p ON p.id = v.product_id
            LEFT JOIN ivy.inventory_levels l
                ON l.variant_id = v.id
               AND ($2::bigint IS NULL OR l.location_id = $2)
            WHERE p.shop_id = $1
            GROUP BY v.id, p.id
            HAVING $2::bigint IS NULL OR COUNT(l.location_id) > 0
            ",
        )
        .bind(shop_id.as_uuid())
        .bind(location_id.map(|id| id.as_i64()))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Variants of a shop by internal ID. Unknown IDs are omitted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn priced_variants(
        &self,
        shop_id: ShopId,
        ids: &[VariantId],
    ) -> Result<Vec<PricedVariant>, RepositoryError> {
        let ids: Vec<Uuid> = ids.iter().map(VariantId::as_uuid).collect();
        let rows = sqlx::query_as::<_, PricedVariantRow>(&format!(
            r"
            SELECT {PRICED_VARIANT_COLUMNS}
            FROM ivy.product_variants v
            JOIN ivy.products p ON p.id = v.product_id
            WHERE p.shop_id = $1 AND v.id = ANY($2)
            "
        ))
        .bind(shop_id.as_uuid())
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Variants whose product has exactly `product_type`, optionally capped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn variants_by_product_type(
        &self,
        shop_id: ShopId,
        product_type: &str,
        limit: Option<i64>,
    ) -> Result<Vec<PricedVariant>, RepositoryError> {
        let rows = sqlx::query_as::<_, PricedVariantRow>(&format!(
            r"
            SELECT {PRICED_VARIANT_COLUMNS}
            FROM ivy.product_variants v
            JOIN ivy.products p ON p.id = v.product_id
            WHERE p.shop_id = $1 AND p.product_type = $2
            ORDER BY p.title, v.title
            LIMIT $3
            "
        ))
        .bind(shop_id.as_uuid())
        .bind(product_type)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Current unit cost of each variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn variant_costs(
        &self,
        ids: &[VariantId],
    ) -> Result<HashMap<VariantId, Decimal>, RepositoryError> {
        let ids: Vec<Uuid> = ids.iter().map(VariantId::as_uuid).collect();
        let rows: Vec<(Uuid, Decimal)> = sqlx::query_as(
            r"
            SELECT id, cost
            FROM ivy.product_variants
            WHERE id = ANY($1)
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, cost)| (VariantId::new(id), cost))
            .collect())
    }
}

//! Supplier order repository.
//!
//! Every write that can change an order's totals recomputes them inside the
//! same transaction, from the rows as stored.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use ivy_core::order::{LineState, OrderTotals};
use ivy_core::{ShopId, SupplierOrderId, SupplierOrderItemId, SupplierOrderStatus, VariantId};

use super::RepositoryError;
use crate::models::{CreateOrderInput, NewOrderItem, SupplierOrder, SupplierOrderItem};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct SupplierOrderRow {
    id: Uuid,
    shop_id: Uuid,
    reference: Option<String>,
    status: String,
    subtotal: Decimal,
    total_ht: Decimal,
    total_ttc: Decimal,
    balance_adjustment: Decimal,
    note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SupplierOrderRow> for SupplierOrder {
    type Error = RepositoryError;

    fn try_from(row: SupplierOrderRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<SupplierOrderStatus>().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid order status in database: {e}"))
        })?;

        Ok(Self {
            id: SupplierOrderId::new(row.id),
            shop_id: ShopId::new(row.shop_id),
            reference: row.reference,
            status,
            subtotal: row.subtotal,
            total_ht: row.total_ht,
            total_ttc: row.total_ttc,
            balance_adjustment: row.balance_adjustment,
            note: row.note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SupplierOrderItemRow {
    id: Uuid,
    order_id: Uuid,
    variant_id: Uuid,
    product_title: String,
    variant_title: Option<String>,
    sku: Option<String>,
    quantity: i32,
    unit_price: Decimal,
    line_total: Decimal,
    is_validated: bool,
    validated_at: Option<DateTime<Utc>>,
    is_printed: bool,
    printed_at: Option<DateTime<Utc>>,
    metafields: Json<BTreeMap<String, String>>,
    created_at: DateTime<Utc>,
}

impl From<SupplierOrderItemRow> for SupplierOrderItem {
    fn from(row: SupplierOrderItemRow) -> Self {
        Self {
            id: SupplierOrderItemId::new(row.id),
            order_id: SupplierOrderId::new(row.order_id),
            variant_id: VariantId::new(row.variant_id),
            product_title: row.product_title,
            variant_title: row.variant_title,
            sku: row.sku,
            line: LineState {
                quantity: row.quantity,
                unit_price: row.unit_price,
                line_total: row.line_total,
                is_validated: row.is_validated,
                validated_at: row.validated_at,
                is_printed: row.is_printed,
                printed_at: row.printed_at,
            },
            metafields: row.metafields.0,
            created_at: row.created_at,
        }
    }
}

const ORDER_COLUMNS: &str = "id, shop_id, reference, status, subtotal, total_ht, total_ttc, \
     balance_adjustment, note, created_at, updated_at";

const ITEM_COLUMNS: &str = "i.id, i.order_id, i.variant_id, i.product_title, i.variant_title, \
     i.sku, i.quantity, i.unit_price, i.line_total, i.is_validated, i.validated_at, \
     i.is_printed, i.printed_at, i.metafields, i.created_at";

/// Order fields an update may change. Totals are always recomputed.
#[derive(Debug, Clone)]
pub struct OrderChanges {
    pub status: SupplierOrderStatus,
    pub reference: Option<String>,
    pub note: Option<String>,
    pub balance_adjustment: Decimal,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for supplier orders and their item rows.
pub struct SupplierOrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SupplierOrderRepository<'a> {
    /// Create a new supplier order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create an empty draft order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        shop_id: ShopId,
        input: &CreateOrderInput,
    ) -> Result<SupplierOrder, RepositoryError> {
        let row = sqlx::query_as::<_, SupplierOrderRow>(&format!(
            r"
            INSERT INTO ivy.supplier_orders (id, shop_id, reference, note, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(SupplierOrderId::generate().as_uuid())
        .bind(shop_id.as_uuid())
        .bind(&input.reference)
        .bind(&input.note)
        .bind(SupplierOrderStatus::Draft.as_str())
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Orders of a shop, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if a stored status is invalid.
    pub async fn list(&self, shop_id: ShopId) -> Result<Vec<SupplierOrder>, RepositoryError> {
        let rows = sqlx::query_as::<_, SupplierOrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM ivy.supplier_orders \
             WHERE shop_id = $1 ORDER BY created_at DESC"
        ))
        .bind(shop_id.as_uuid())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the stored status is invalid.
    pub async fn get(&self, id: SupplierOrderId) -> Result<Option<SupplierOrder>, RepositoryError> {
        let row = sqlx::query_as::<_, SupplierOrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM ivy.supplier_orders WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Item rows of an order, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(
        &self,
        order_id: SupplierOrderId,
    ) -> Result<Vec<SupplierOrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, SupplierOrderItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM ivy.supplier_order_items i \
             WHERE i.order_id = $1 ORDER BY i.created_at, i.id"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// One item row of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_item(
        &self,
        order_id: SupplierOrderId,
        item_id: SupplierOrderItemId,
    ) -> Result<Option<SupplierOrderItem>, RepositoryError> {
        let row = sqlx::query_as::<_, SupplierOrderItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM ivy.supplier_order_items i \
             WHERE i.order_id = $1 AND i.id = $2"
        ))
        .bind(order_id.as_uuid())
        .bind(item_id.as_uuid())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Items of non-completed orders of a shop whose variant belongs to a
    /// product of `product_type`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn open_items_for_product_type(
        &self,
        shop_id: ShopId,
        product_type: &str,
    ) -> Result<Vec<SupplierOrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, SupplierOrderItemRow>(&format!(
            r"
            SELECT {ITEM_COLUMNS}
            FROM ivy.supplier_order_items i
            JOIN ivy.supplier_orders o ON o.id = i.order_id
            JOIN ivy.product_variants v ON v.id = i.variant_id
            JOIN ivy.products p ON p.id = v.product_id
            WHERE o.shop_id = $1
              AND o.status <> 'completed'
              AND p.product_type = $2
            ORDER BY i.order_id, i.created_at
            "
        ))
        .bind(shop_id.as_uuid())
        .bind(product_type)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Insert unit rows, set the order status and recompute totals, all in
    /// one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order vanished, or
    /// `RepositoryError::Database` on any failure (nothing is inserted).
    pub async fn add_items(
        &self,
        order_id: SupplierOrderId,
        items: &[NewOrderItem],
        status: SupplierOrderStatus,
    ) -> Result<SupplierOrder, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for item in items {
            sqlx::query(
                r"
                INSERT INTO ivy.supplier_order_items (
                    id, order_id, variant_id, product_title, variant_title, sku,
                    quantity, unit_price, line_total, metafields
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ",
            )
            .bind(SupplierOrderItemId::generate().as_uuid())
            .bind(order_id.as_uuid())
            .bind(item.variant_id.as_uuid())
            .bind(&item.product_title)
            .bind(&item.variant_title)
            .bind(&item.sku)
            .bind(item.line.quantity)
            .bind(item.line.unit_price)
            .bind(item.line.line_total)
            .bind(Json(&item.metafields))
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE ivy.supplier_orders SET status = $2 WHERE id = $1")
            .bind(order_id.as_uuid())
            .bind(status.as_str())
            .execute(&mut *tx)
            .await?;

        let order = recompute_totals_in(&mut tx, order_id).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Persist an item's line state, recomputing the order totals when
    /// `recompute` is set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item does not exist.
    pub async fn save_item(
        &self,
        item: &SupplierOrderItem,
        recompute: bool,
    ) -> Result<SupplierOrder, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE ivy.supplier_order_items
            SET quantity = $3, unit_price = $4, line_total = $5,
                is_validated = $6, validated_at = $7,
                is_printed = $8, printed_at = $9
            WHERE order_id = $1 AND id = $2
            ",
        )
        .bind(item.order_id.as_uuid())
        .bind(item.id.as_uuid())
        .bind(item.line.quantity)
        .bind(item.line.unit_price)
        .bind(item.line.line_total)
        .bind(item.line.is_validated)
        .bind(item.line.validated_at)
        .bind(item.line.is_printed)
        .bind(item.line.printed_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let order = if recompute {
            recompute_totals_in(&mut tx, item.order_id).await?
        } else {
            fetch_order_in(&mut tx, item.order_id).await?
        };
        tx.commit().await?;
        Ok(order)
    }

    /// Delete an item row and recompute totals.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item does not exist.
    pub async fn delete_item(
        &self,
        order_id: SupplierOrderId,
        item_id: SupplierOrderItemId,
    ) -> Result<SupplierOrder, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result =
            sqlx::query("DELETE FROM ivy.supplier_order_items WHERE order_id = $1 AND id = $2")
                .bind(order_id.as_uuid())
                .bind(item_id.as_uuid())
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let order = recompute_totals_in(&mut tx, order_id).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Overwrite the price snapshot of several items, then recompute the
    /// totals of every order they belong to. Returns the touched orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if an update fails (nothing is kept).
    pub async fn reprice_items(
        &self,
        prices: &[(SupplierOrderItemId, Decimal, Decimal)],
    ) -> Result<Vec<SupplierOrder>, RepositoryError> {
        if prices.is_empty() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::with_capacity(prices.len());
        let mut unit_prices = Vec::with_capacity(prices.len());
        let mut line_totals = Vec::with_capacity(prices.len());
        for (id, unit_price, line_total) in prices {
            ids.push(id.as_uuid());
            unit_prices.push(*unit_price);
            line_totals.push(*line_total);
        }

        let mut tx = self.pool.begin().await?;

        let order_ids: Vec<Uuid> = sqlx::query_scalar(
            r"
            WITH updated AS (
                UPDATE ivy.supplier_order_items AS i
                SET unit_price = p.unit_price, line_total = p.line_total
                FROM UNNEST($1::uuid[], $2::numeric[], $3::numeric[])
                    AS p(id, unit_price, line_total)
                WHERE i.id = p.id
                RETURNING i.order_id
            )
            SELECT DISTINCT order_id FROM updated
            ",
        )
        .bind(ids)
        .bind(unit_prices)
        .bind(line_totals)
        .fetch_all(&mut *tx)
        .await?;

        let mut orders = Vec::with_capacity(order_ids.len());
        for order_id in order_ids {
            orders.push(recompute_totals_in(&mut tx, SupplierOrderId::new(order_id)).await?);
        }
        tx.commit().await?;
        Ok(orders)
    }

    /// Overwrite stored metafields on every item of `variant_id` in an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_variant_metafields(
        &self,
        order_id: SupplierOrderId,
        variant_id: VariantId,
        metafields: &BTreeMap<String, String>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE ivy.supplier_order_items
            SET metafields = $3
            WHERE order_id = $1 AND variant_id = $2
            ",
        )
        .bind(order_id.as_uuid())
        .bind(variant_id.as_uuid())
        .bind(Json(metafields))
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Apply order-level changes and recompute totals.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn update(
        &self,
        order_id: SupplierOrderId,
        changes: &OrderChanges,
    ) -> Result<SupplierOrder, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE ivy.supplier_orders
            SET status = $2, reference = $3, note = $4, balance_adjustment = $5
            WHERE id = $1
            ",
        )
        .bind(order_id.as_uuid())
        .bind(changes.status.as_str())
        .bind(&changes.reference)
        .bind(&changes.note)
        .bind(changes.balance_adjustment)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let order = recompute_totals_in(&mut tx, order_id).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Recompute and store an order's totals from its rows.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn recompute_totals(
        &self,
        order_id: SupplierOrderId,
    ) -> Result<SupplierOrder, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let order = recompute_totals_in(&mut tx, order_id).await?;
        tx.commit().await?;
        Ok(order)
    }
}

async fn fetch_order_in(
    tx: &mut Transaction<'_, Postgres>,
    order_id: SupplierOrderId,
) -> Result<SupplierOrder, RepositoryError> {
    sqlx::query_as::<_, SupplierOrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM ivy.supplier_orders WHERE id = $1"
    ))
    .bind(order_id.as_uuid())
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(RepositoryError::NotFound)?
    .try_into()
}

/// subtotal / `total_ht` / `total_ttc` from the rows as they are inside `tx`.
async fn recompute_totals_in(
    tx: &mut Transaction<'_, Postgres>,
    order_id: SupplierOrderId,
) -> Result<SupplierOrder, RepositoryError> {
    let balance_adjustment: Decimal = sqlx::query_scalar(
        "SELECT balance_adjustment FROM ivy.supplier_orders WHERE id = $1 FOR UPDATE",
    )
    .bind(order_id.as_uuid())
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    let lines: Vec<(bool, Decimal)> = sqlx::query_as(
        "SELECT is_validated, line_total FROM ivy.supplier_order_items WHERE order_id = $1",
    )
    .bind(order_id.as_uuid())
    .fetch_all(&mut **tx)
    .await?;

    let totals = OrderTotals::compute(lines, balance_adjustment);

    sqlx::query_as::<_, SupplierOrderRow>(&format!(
        r"
        UPDATE ivy.supplier_orders
        SET subtotal = $2, total_ht = $3, total_ttc = $4, updated_at = NOW()
        WHERE id = $1
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(order_id.as_uuid())
    .bind(totals.subtotal)
    .bind(totals.total_ht)
    .bind(totals.total_ttc)
    .fetch_one(&mut **tx)
    .await?
    .try_into()
}

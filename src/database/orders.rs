// ABOUTME: Order database operations
// ABOUTME: Transactional checkout with stock reservation, status transitions and stock restoration

use std::collections::HashMap;

use chrono::{SecondsFormat, Utc};
use serde_json::json;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use super::products::{row_to_product, PRODUCT_COLUMNS};
use super::{count_to_u64, get_datetime, get_enum, get_opt_uuid, get_uuid, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{Order, OrderItem, OrderStatus, ProductStatus};
use crate::pagination::PageParams;

const ORDER_COLUMNS: &str = "id, user_id, status, total_cents, currency, note, created_at, updated_at";

/// One requested line of a new order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    /// Product being bought
    pub product_id: Uuid,
    /// Units requested (already validated as positive)
    pub quantity: i64,
}

impl Database {
    pub(super) async fn migrate_orders(&self) -> AppResult<()> {
        self.execute_ddl(&[
            r"
            CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'paid', 'shipped', 'delivered', 'cancelled')),
                total_cents INTEGER NOT NULL CHECK (total_cents >= 0),
                currency TEXT NOT NULL,
                note TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS order_items (
                id TEXT PRIMARY KEY,
                order_id TEXT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
                product_id TEXT REFERENCES products(id) ON DELETE SET NULL,
                title TEXT NOT NULL,
                quantity INTEGER NOT NULL CHECK (quantity > 0),
                unit_price_cents INTEGER NOT NULL CHECK (unit_price_cents >= 0)
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items(order_id)",
        ])
        .await
    }

    /// Place an order: reserve stock and snapshot prices in one transaction
    ///
    /// # Errors
    ///
    /// - `RESOURCE_NOT_FOUND` if a product does not exist
    /// - `INVALID_INPUT` if a product is not active or currencies differ
    /// - `VALUE_OUT_OF_RANGE` if stock is insufficient
    pub async fn create_order(
        &self,
        user_id: Uuid,
        lines: &[OrderLine],
        note: Option<String>,
    ) -> AppResult<Order> {
        let mut tx = self.pool.begin().await?;
        let order_id = Uuid::new_v4();
        let mut items = Vec::with_capacity(lines.len());
        let mut currency: Option<String> = None;
        let mut total_cents: i64 = 0;

        for line in lines {
            let row = sqlx::query(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1"
            ))
            .bind(line.product_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
            let product = row
                .as_ref()
                .map(row_to_product)
                .transpose()?
                .ok_or_else(|| {
                    AppError::not_found(format!("Product {}", line.product_id))
                        .with_resource_id(line.product_id.to_string())
                })?;

            if product.status != ProductStatus::Active {
                return Err(AppError::invalid_input(format!(
                    "Product '{}' is not available for purchase",
                    product.title
                ))
                .with_resource_id(product.id.to_string()));
            }

            match &currency {
                Some(existing) if existing != &product.currency => {
                    return Err(AppError::invalid_input(format!(
                        "All products in an order must share one currency ({existing} vs {})",
                        product.currency
                    )));
                }
                Some(_) => {}
                None => currency = Some(product.currency.clone()),
            }

            let reserved = sqlx::query(
                "UPDATE products SET stock = stock - $1, updated_at = $2 WHERE id = $3 AND stock >= $1",
            )
            .bind(line.quantity)
            .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
            .bind(product.id.to_string())
            .execute(&mut *tx)
            .await?;
            if reserved.rows_affected() == 0 {
                return Err(AppError::out_of_range(format!(
                    "Insufficient stock for '{}': requested {}, available {}",
                    product.title, line.quantity, product.stock
                ))
                .with_details(json!({
                    "product_id": product.id,
                    "requested": line.quantity,
                    "available": product.stock,
                })));
            }

            let item = OrderItem {
                id: Uuid::new_v4(),
                product_id: Some(product.id),
                title: product.title,
                quantity: line.quantity,
                unit_price_cents: product.price_cents,
            };
            total_cents = line
                .quantity
                .checked_mul(item.unit_price_cents)
                .and_then(|line_total| total_cents.checked_add(line_total))
                .ok_or_else(|| AppError::out_of_range("Order total is too large"))?;
            items.push(item);
        }

        let currency = currency.ok_or_else(|| AppError::invalid_input("Order has no items"))?;
        let now = Utc::now();

        sqlx::query(
            r"
            INSERT INTO orders (id, user_id, status, total_cents, currency, note, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ",
        )
        .bind(order_id.to_string())
        .bind(user_id.to_string())
        .bind(OrderStatus::Pending.as_str())
        .bind(total_cents)
        .bind(&currency)
        .bind(&note)
        .bind(now.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&mut *tx)
        .await?;

        for item in &items {
            sqlx::query(
                r"
                INSERT INTO order_items (id, order_id, product_id, title, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(item.id.to_string())
            .bind(order_id.to_string())
            .bind(item.product_id.map(|id| id.to_string()))
            .bind(&item.title)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Order {
            id: order_id,
            user_id,
            status: OrderStatus::Pending,
            total_cents,
            currency,
            note,
            items,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get an order with its line items
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_order(&self, order_id: Uuid) -> AppResult<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut order = row_to_order(&row)?;
        order.items = self
            .load_order_items(&[order.id])
            .await?
            .remove(&order.id)
            .unwrap_or_default();
        Ok(Some(order))
    }

    /// List orders newest first; `user_id = None` lists every order
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_orders(
        &self,
        user_id: Option<Uuid>,
        page: PageParams,
    ) -> AppResult<(Vec<Order>, u64)> {
        let owner = user_id.map(|id| id.to_string());

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE ($1 IS NULL OR user_id = $1)")
                .bind(&owner)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE ($1 IS NULL OR user_id = $1) \
             ORDER BY created_at DESC, id LIMIT $2 OFFSET $3"
        ))
        .bind(&owner)
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await?;

        let mut orders = rows.iter().map(row_to_order).collect::<AppResult<Vec<_>>>()?;
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let mut items = self.load_order_items(&ids).await?;
        for order in &mut orders {
            order.items = items.remove(&order.id).unwrap_or_default();
        }
        Ok((orders, count_to_u64(total)))
    }

    /// Move an order to `next`, restoring reserved stock when it is cancelled
    ///
    /// # Errors
    ///
    /// - `RESOURCE_NOT_FOUND` if the order does not exist
    /// - `INVALID_INPUT` if the transition is not allowed from the current status
    pub async fn update_order_status(&self, order_id: Uuid, next: OrderStatus) -> AppResult<Order> {
        let current: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
            .bind(order_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        let current: OrderStatus = current
            .ok_or_else(|| AppError::not_found("Order"))?
            .parse()?;

        if !current.can_transition_to(next) {
            return Err(Self::bad_transition(current, next));
        }

        // The guarded write comes first so the transaction takes the write
        // lock up front; a racing change leaves no row to update
        let mut tx = self.pool.begin().await?;
        let moved = sqlx::query(
            "UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4",
        )
        .bind(next.as_str())
        .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
        .bind(order_id.to_string())
        .bind(current.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if moved != 1 {
            return Err(AppError::invalid_input(format!(
                "Order status changed while moving it from {current} to {next}"
            ))
            .with_details(json!({ "from": current, "to": next })));
        }

        if next == OrderStatus::Cancelled {
            sqlx::query(
                r"
                UPDATE products SET stock = stock + (
                    SELECT COALESCE(SUM(oi.quantity), 0) FROM order_items oi
                    WHERE oi.order_id = $1 AND oi.product_id = products.id
                )
                WHERE id IN (
                    SELECT product_id FROM order_items
                    WHERE order_id = $1 AND product_id IS NOT NULL
                )
                ",
            )
            .bind(order_id.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.get_order(order_id)
            .await?
            .ok_or_else(|| AppError::not_found("Order"))
    }

    fn bad_transition(current: OrderStatus, next: OrderStatus) -> AppError {
        AppError::invalid_input(format!("Cannot change order status from {current} to {next}"))
            .with_details(json!({ "from": current, "to": next }))
    }

    async fn load_order_items(&self, order_ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<OrderItem>>> {
        let mut items_by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        if order_ids.is_empty() {
            return Ok(items_by_order);
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, order_id, product_id, title, quantity, unit_price_cents \
             FROM order_items WHERE order_id IN (",
        );
        let mut separated = builder.separated(", ");
        for id in order_ids {
            separated.push_bind(id.to_string());
        }
        separated.push_unseparated(") ORDER BY rowid");

        let rows = builder.build().fetch_all(&self.pool).await?;
        for row in &rows {
            let order_id = get_uuid(row, "order_id")?;
            items_by_order
                .entry(order_id)
                .or_default()
                .push(row_to_order_item(row)?);
        }
        Ok(items_by_order)
    }
}

fn row_to_order(row: &SqliteRow) -> AppResult<Order> {
    Ok(Order {
        id: get_uuid(row, "id")?,
        user_id: get_uuid(row, "user_id")?,
        status: get_enum(row, "status")?,
        total_cents: row.try_get("total_cents")?,
        currency: row.try_get("currency")?,
        note: row.try_get("note")?,
        items: Vec::new(),
        created_at: get_datetime(row, "created_at")?,
        updated_at: get_datetime(row, "updated_at")?,
    })
}

fn row_to_order_item(row: &SqliteRow) -> AppResult<OrderItem> {
    Ok(OrderItem {
        id: get_uuid(row, "id")?,
        product_id: get_opt_uuid(row, "product_id")?,
        title: row.try_get("title")?,
        quantity: row.try_get("quantity")?,
        unit_price_cents: row.try_get("unit_price_cents")?,
    })
}

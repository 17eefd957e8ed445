//! # Order Repository
//!
//! Checkout, item adjustment, and status transitions.
//!
//! ## Checkout Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  create_with_items (one transaction)                    │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    │                                                                    │
//! │    ├─► for each item: UPDATE products                                   │
//! │    │                  SET stock = stock - qty                           │
//! │    │                  WHERE id = ? AND stock >= qty                     │
//! │    │                  0 rows → ROLLBACK (stock moved since cart check)  │
//! │    │                                                                    │
//! │    ├─► discount? UPDATE discount_codes SET used_count = used_count + 1  │
//! │    │             WHERE used_count < usage_limit                         │
//! │    │             0 rows → ROLLBACK (code exhausted concurrently)        │
//! │    │                                                                    │
//! │    ├─► INSERT order (status 'pending') + INSERT each order_item         │
//! │    │                                                                    │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Either everything lands or nothing does: no partial orders, no         │
//! │  phantom stock decrements, no overrun usage counters.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::discount::DiscountRepository;
use bazaar_core::pricing::OrderTotals;
use bazaar_core::{Order, OrderItem, OrderStatus};

/// One line of a new order, snapshotted from the cart.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub name_snapshot: String,
    pub pack_label: Option<String>,
    pub unit_price: i64,
    pub pack_quantity: i64,
    pub pack_price: Option<i64>,
    pub quantity: i64,
    pub line_total: i64,
}

const ORDER_COLUMNS: &str = r#"
    SELECT id, actor_id, gross, discount, net, discount_code,
           status, notes, created_at
    FROM orders
"#;

const ITEM_COLUMNS: &str = r#"
    SELECT id, order_id, product_id, name_snapshot, pack_label,
           unit_price, pack_quantity, pack_price, quantity, line_total
    FROM order_items
"#;

/// Repository for order operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Creates an order with its items, decrementing stock and redeeming
    /// the discount code in the same transaction.
    ///
    /// ## Arguments
    /// * `actor_id` - who placed the order
    /// * `items` - snapshotted cart lines with recomputed totals
    /// * `totals` - order-level totals from the pricing recompute
    /// * `discount` - `(code_id, code_text)` when a code was applied
    ///
    /// ## Failure
    /// Any stock or usage conflict rolls the whole transaction back;
    /// the error names the offending product or code.
    pub async fn create_with_items(
        &self,
        actor_id: i64,
        items: &[NewOrderItem],
        totals: OrderTotals,
        discount: Option<(i64, &str)>,
    ) -> DbResult<Order> {
        debug!(actor_id, item_count = items.len(), "Creating order");

        let mut tx = self.pool.begin().await?;

        for item in items {
            let result = sqlx::query(
                r#"
                UPDATE products
                SET stock = stock - ?2, updated_at = ?3
                WHERE id = ?1 AND stock >= ?2 AND is_active = 1
                "#,
            )
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(DbError::StockConflict {
                    product_id: item.product_id,
                });
            }
        }

        let discount_code_text = match discount {
            Some((code_id, code)) => {
                DiscountRepository::new(self.pool.clone())
                    .redeem_in_tx(&mut tx, code_id, code)
                    .await?;
                Some(code.to_string())
            }
            None => None,
        };

        let result = sqlx::query(
            r#"
            INSERT INTO orders (actor_id, gross, discount, net, discount_code,
                                status, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 'pending', NULL, ?6)
            "#,
        )
        .bind(actor_id)
        .bind(totals.gross)
        .bind(totals.discount)
        .bind(totals.net)
        .bind(&discount_code_text)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let order_id = result.last_insert_rowid();

        for item in items {
            insert_item(&mut tx, order_id, item).await?;
        }

        tx.commit().await?;

        info!(order_id, actor_id, net = totals.net, "Order created");
        self.require(order_id).await
    }

    /// Fetches an order by id.
    pub async fn get(&self, id: i64) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!("{ORDER_COLUMNS} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    /// Fetches an order by id or fails with NotFound.
    pub async fn require(&self, id: i64) -> DbResult<Order> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))
    }

    /// Fetches an order's items in insertion order.
    pub async fn items(&self, order_id: i64) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "{ITEM_COLUMNS} WHERE order_id = ?1 ORDER BY id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Replaces an order's item list and totals atomically.
    ///
    /// Used after operator item adjustment: the in-memory list has been
    /// mutated and recomputed; the old rows are discarded wholesale
    /// rather than diffed.
    pub async fn replace_items(
        &self,
        order_id: i64,
        items: &[OrderItem],
        totals: OrderTotals,
    ) -> DbResult<()> {
        debug!(order_id, item_count = items.len(), "Replacing order items");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE orders SET gross = ?2, discount = ?3, net = ?4 WHERE id = ?1",
        )
        .bind(order_id)
        .bind(totals.gross)
        .bind(totals.discount)
        .bind(totals.net)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order_id));
        }

        sqlx::query("DELETE FROM order_items WHERE order_id = ?1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        for item in items {
            let new_item = NewOrderItem {
                product_id: item.product_id,
                name_snapshot: item.name_snapshot.clone(),
                pack_label: item.pack_label.clone(),
                unit_price: item.unit_price,
                pack_quantity: item.pack_quantity,
                pack_price: item.pack_price,
                quantity: item.quantity,
                line_total: item.line_total,
            };
            insert_item(&mut tx, order_id, &new_item).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Moves an order from `expected` to `next` in one guarded UPDATE.
    ///
    /// The caller validates the transition against
    /// [`OrderStatus::can_transition_to`]; the guard here closes the
    /// window where another operator changed the status in between.
    pub async fn set_status(
        &self,
        order_id: i64,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> DbResult<()> {
        let result = sqlx::query("UPDATE orders SET status = ?3 WHERE id = ?1 AND status = ?2")
            .bind(order_id)
            .bind(expected)
            .bind(next)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            // Distinguish a missing order from a moved status
            return match self.get(order_id).await? {
                None => Err(DbError::not_found("Order", order_id)),
                Some(_) => Err(DbError::StatusConflict {
                    order_id,
                    expected: expected.to_string(),
                }),
            };
        }

        info!(order_id, status = %next, "Order status updated");
        Ok(())
    }

    /// Sets the operator notes on an order.
    pub async fn set_notes(&self, order_id: i64, notes: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE orders SET notes = ?2 WHERE id = ?1")
            .bind(order_id)
            .bind(notes)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order_id));
        }
        Ok(())
    }

    /// Lists one actor's orders, newest first.
    pub async fn list_by_actor(&self, actor_id: i64, limit: u32) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "{ORDER_COLUMNS} WHERE actor_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2"
        ))
        .bind(actor_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    /// Lists orders, optionally filtered by status, newest first.
    pub async fn list(&self, status: Option<OrderStatus>, limit: u32) -> DbResult<Vec<Order>> {
        let orders = match status {
            Some(status) => {
                sqlx::query_as::<_, Order>(&format!(
                    "{ORDER_COLUMNS} WHERE status = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2"
                ))
                .bind(status)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Order>(&format!(
                    "{ORDER_COLUMNS} ORDER BY created_at DESC, id DESC LIMIT ?1"
                ))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(orders)
    }
}

async fn insert_item(
    tx: &mut Transaction<'_, Sqlite>,
    order_id: i64,
    item: &NewOrderItem,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_items (order_id, product_id, name_snapshot, pack_label,
                                 unit_price, pack_quantity, pack_price,
                                 quantity, line_total)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(order_id)
    .bind(item.product_id)
    .bind(&item.name_snapshot)
    .bind(&item.pack_label)
    .bind(item.unit_price)
    .bind(item.pack_quantity)
    .bind(item.pack_price)
    .bind(item.quantity)
    .bind(item.line_total)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::discount::NewDiscount;
    use crate::repository::product::NewProduct;
    use bazaar_core::DiscountKind;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(database: &Database, price: i64, stock: i64) -> i64 {
        database
            .products()
            .insert(NewProduct {
                name: "Saffron 5g".to_string(),
                description: None,
                price,
                stock,
                image_ref: None,
            })
            .await
            .unwrap()
            .id
    }

    fn line(product_id: i64, unit_price: i64, quantity: i64) -> NewOrderItem {
        NewOrderItem {
            product_id,
            name_snapshot: "Saffron 5g".to_string(),
            pack_label: None,
            unit_price,
            pack_quantity: 1,
            pack_price: None,
            quantity,
            line_total: unit_price * quantity,
        }
    }

    fn totals(gross: i64, discount: i64) -> OrderTotals {
        OrderTotals {
            gross,
            discount,
            net: (gross - discount).max(0),
        }
    }

    #[tokio::test]
    async fn test_checkout_creates_order_and_decrements_stock() {
        let database = db().await;
        let product_id = seed_product(&database, 50_000, 10).await;
        let repo = database.orders();

        let order = repo
            .create_with_items(7, &[line(product_id, 50_000, 3)], totals(150_000, 0), None)
            .await
            .unwrap();

        assert_eq!(order.actor_id, 7);
        assert_eq!(order.gross, 150_000);
        assert_eq!(order.net, 150_000);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.discount_code, None);

        let items = repo.items(order.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 3);
        assert_eq!(items[0].line_total, 150_000);

        let product = database.products().require(product_id).await.unwrap();
        assert_eq!(product.stock, 7);
    }

    #[tokio::test]
    async fn test_checkout_stock_conflict_rolls_everything_back() {
        let database = db().await;
        let first = seed_product(&database, 50_000, 10).await;
        let second = seed_product(&database, 20_000, 1).await;
        let repo = database.orders();

        // Second line wants 2 units of a 1-unit product
        let err = repo
            .create_with_items(
                7,
                &[line(first, 50_000, 3), line(second, 20_000, 2)],
                totals(190_000, 0),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::StockConflict { product_id } if product_id == second));

        // First product's decrement was rolled back, no order rows exist
        assert_eq!(database.products().require(first).await.unwrap().stock, 10);
        assert!(repo.list(None, 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_redeems_discount_once() {
        let database = db().await;
        let product_id = seed_product(&database, 100_000, 10).await;
        let code = database
            .discounts()
            .insert(NewDiscount {
                code: "SAVE10".to_string(),
                kind: DiscountKind::Percentage,
                value: 10,
                min_purchase: 100_000,
                max_discount: Some(15_000),
                usage_limit: Some(1),
                starts_at: None,
                ends_at: None,
            })
            .await
            .unwrap();
        let repo = database.orders();

        let order = repo
            .create_with_items(
                7,
                &[line(product_id, 100_000, 2)],
                totals(200_000, 15_000),
                Some((code.id, "SAVE10")),
            )
            .await
            .unwrap();
        assert_eq!(order.discount, 15_000);
        assert_eq!(order.net, 185_000);
        assert_eq!(order.discount_code.as_deref(), Some("SAVE10"));

        let fetched = database.discounts().get(code.id).await.unwrap().unwrap();
        assert_eq!(fetched.used_count, 1);

        // Limit hit: second checkout fails entirely, stock restored
        let err = repo
            .create_with_items(
                8,
                &[line(product_id, 100_000, 2)],
                totals(200_000, 15_000),
                Some((code.id, "SAVE10")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UsageExhausted { .. }));
        assert_eq!(
            database.products().require(product_id).await.unwrap().stock,
            8
        );
    }

    #[tokio::test]
    async fn test_replace_items_swaps_list_and_totals() {
        let database = db().await;
        let product_id = seed_product(&database, 50_000, 10).await;
        let repo = database.orders();

        let order = repo
            .create_with_items(7, &[line(product_id, 50_000, 3)], totals(150_000, 0), None)
            .await
            .unwrap();

        let mut items = repo.items(order.id).await.unwrap();
        items[0].quantity = 7;
        items[0].line_total = 350_000;

        repo.replace_items(order.id, &items, totals(350_000, 0))
            .await
            .unwrap();

        let updated = repo.require(order.id).await.unwrap();
        assert_eq!(updated.gross, 350_000);
        let items = repo.items(order.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 7);
    }

    #[tokio::test]
    async fn test_set_status_guarded() {
        let database = db().await;
        let product_id = seed_product(&database, 50_000, 10).await;
        let repo = database.orders();

        let order = repo
            .create_with_items(7, &[line(product_id, 50_000, 1)], totals(50_000, 0), None)
            .await
            .unwrap();

        repo.set_status(order.id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(
            repo.require(order.id).await.unwrap().status,
            OrderStatus::Confirmed
        );

        // Stale expectation: another operator already moved it
        let err = repo
            .set_status(order.id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::StatusConflict { .. }));

        let err = repo
            .set_status(9999, OrderStatus::Pending, OrderStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_listings() {
        let database = db().await;
        let product_id = seed_product(&database, 50_000, 100).await;
        let repo = database.orders();

        for actor in [1, 1, 2] {
            repo.create_with_items(actor, &[line(product_id, 50_000, 1)], totals(50_000, 0), None)
                .await
                .unwrap();
        }

        assert_eq!(repo.list_by_actor(1, 50).await.unwrap().len(), 2);
        assert_eq!(repo.list_by_actor(2, 50).await.unwrap().len(), 1);
        assert_eq!(
            repo.list(Some(OrderStatus::Pending), 50).await.unwrap().len(),
            3
        );
        assert!(repo
            .list(Some(OrderStatus::Completed), 50)
            .await
            .unwrap()
            .is_empty());
    }
}

//! # Product Repository
//!
//! Catalog CRUD, stock movement, and soft deletion.
//!
//! ## Soft Delete
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Products are NEVER physically deleted: historical orders snapshot     │
//! │  the name and price, but the product row itself stays addressable      │
//! │  for operator screens and stock history.                               │
//! │                                                                         │
//! │  deactivate(id)  →  UPDATE products SET is_active = 0                  │
//! │  list_active()   →  WHERE is_active = 1                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stock Decrement
//! `decrement_stock` is a conditional UPDATE (`WHERE stock >= ?`): the
//! cart's stock check happens seconds before checkout, and another actor
//! may have bought the same units in between. Zero rows affected means
//! the caller must abort its transaction.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use bazaar_core::Product;

/// Fields collected for a new product row.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock: i64,
    pub image_ref: Option<String>,
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new active product and returns it.
    pub async fn insert(&self, new: NewProduct) -> DbResult<Product> {
        debug!(name = %new.name, "Inserting product");

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO products (name, description, price, stock, image_ref,
                                  is_active, channel_ref, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 1, NULL, ?6, ?6)
            "#,
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.price)
        .bind(new.stock)
        .bind(&new.image_ref)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.require(result.last_insert_rowid()).await
    }

    /// Fetches a product by id, soft-deleted rows included.
    pub async fn get(&self, id: i64) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price, stock, image_ref,
                   is_active, channel_ref, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Fetches a product by id or fails with NotFound.
    pub async fn require(&self, id: i64) -> DbResult<Product> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Lists active products, newest first.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price, stock, image_ref,
                   is_active, channel_ref, created_at, updated_at
            FROM products
            WHERE is_active = 1
            ORDER BY created_at DESC, id DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists every product, active or not, for operator screens.
    pub async fn list_all(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price, stock, image_ref,
                   is_active, channel_ref, created_at, updated_at
            FROM products
            ORDER BY created_at DESC, id DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Updates the unit price.
    pub async fn update_price(&self, id: i64, price: i64) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE products SET price = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(price)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Sets the absolute stock level (operator restock).
    pub async fn set_stock(&self, id: i64, stock: i64) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE products SET stock = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(stock)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Atomically decrements stock, refusing to go negative.
    ///
    /// Zero rows affected means stock moved since the caller's check;
    /// the caller must treat that as a conflict, not retry blindly.
    pub async fn decrement_stock(&self, id: i64, quantity: i64) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - ?2, updated_at = ?3
            WHERE id = ?1 AND stock >= ?2 AND is_active = 1
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::StockConflict { product_id: id });
        }
        Ok(())
    }

    /// Records the catalog publication reference after a listing is
    /// pushed to the sales channel.
    pub async fn set_channel_ref(&self, id: i64, channel_ref: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE products SET channel_ref = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(channel_ref)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Soft-deletes a product. Historical orders are unaffected.
    pub async fn deactivate(&self, id: i64) -> DbResult<()> {
        self.set_active(id, false).await
    }

    /// Reactivates a soft-deleted product.
    pub async fn activate(&self, id: i64) -> DbResult<()> {
        self.set_active(id, true).await
    }

    async fn set_active(&self, id: i64, active: bool) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE products SET is_active = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn saffron() -> NewProduct {
        NewProduct {
            name: "Saffron 5g".to_string(),
            description: Some("Grade one".to_string()),
            price: 250_000,
            stock: 10,
            image_ref: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let repo = db().await.products();

        let product = repo.insert(saffron()).await.unwrap();
        assert!(product.id > 0);
        assert_eq!(product.name, "Saffron 5g");
        assert_eq!(product.price, 250_000);
        assert!(product.is_active);

        let fetched = repo.get(product.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, product.name);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let repo = db().await.products();
        assert!(repo.get(9999).await.unwrap().is_none());
        assert!(matches!(
            repo.require(9999).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_soft_delete_hides_from_active_list() {
        let repo = db().await.products();
        let product = repo.insert(saffron()).await.unwrap();

        repo.deactivate(product.id).await.unwrap();

        assert!(repo.list_active(50).await.unwrap().is_empty());
        assert_eq!(repo.list_all(50).await.unwrap().len(), 1);

        // Row still addressable
        let fetched = repo.require(product.id).await.unwrap();
        assert!(!fetched.is_active);

        repo.activate(product.id).await.unwrap();
        assert_eq!(repo.list_active(50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_decrement_stock_conditional() {
        let repo = db().await.products();
        let product = repo.insert(saffron()).await.unwrap();

        repo.decrement_stock(product.id, 4).await.unwrap();
        assert_eq!(repo.require(product.id).await.unwrap().stock, 6);

        // More than remaining: conflict, stock untouched
        let err = repo.decrement_stock(product.id, 7).await.unwrap_err();
        assert!(matches!(err, DbError::StockConflict { .. }));
        assert_eq!(repo.require(product.id).await.unwrap().stock, 6);
    }

    #[tokio::test]
    async fn test_update_missing_product_is_not_found() {
        let repo = db().await.products();
        assert!(matches!(
            repo.update_price(9999, 1_000).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_channel_ref_roundtrip() {
        let repo = db().await.products();
        let product = repo.insert(saffron()).await.unwrap();
        assert_eq!(product.channel_ref, None);

        repo.set_channel_ref(product.id, "listing:991").await.unwrap();
        let fetched = repo.require(product.id).await.unwrap();
        assert_eq!(fetched.channel_ref.as_deref(), Some("listing:991"));
    }
}

//! # Discount Code Repository
//!
//! Discount CRUD plus atomic redemption.
//!
//! ## Atomic Redemption
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Two actors can redeem a near-exhausted code at the same moment.       │
//! │  The increment is therefore conditional:                                │
//! │                                                                         │
//! │    UPDATE discount_codes                                                │
//! │    SET used_count = used_count + 1                                      │
//! │    WHERE id = ? AND (usage_limit IS NULL OR used_count < usage_limit)   │
//! │                                                                         │
//! │  Zero rows affected = the other actor won; the caller aborts its        │
//! │  checkout transaction. used_count can never overrun usage_limit.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use bazaar_core::{DiscountCode, DiscountKind};

/// Fields collected for a new discount code row.
#[derive(Debug, Clone)]
pub struct NewDiscount {
    pub code: String,
    pub kind: DiscountKind,
    pub value: i64,
    pub min_purchase: i64,
    pub max_discount: Option<i64>,
    pub usage_limit: Option<i64>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, code, kind, value, min_purchase, max_discount,
           usage_limit, used_count, starts_at, ends_at, is_active, created_at
    FROM discount_codes
"#;

/// Repository for discount code operations.
#[derive(Debug, Clone)]
pub struct DiscountRepository {
    pool: SqlitePool,
}

impl DiscountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DiscountRepository { pool }
    }

    /// Inserts a new active discount code and returns it.
    ///
    /// Codes are stored as given; callers normalize (uppercase, trim)
    /// before reaching this layer. Duplicates surface as
    /// [`DbError::UniqueViolation`].
    pub async fn insert(&self, new: NewDiscount) -> DbResult<DiscountCode> {
        debug!(code = %new.code, "Inserting discount code");

        let result = sqlx::query(
            r#"
            INSERT INTO discount_codes (code, kind, value, min_purchase, max_discount,
                                        usage_limit, used_count, starts_at, ends_at,
                                        is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, 1, ?9)
            "#,
        )
        .bind(&new.code)
        .bind(new.kind)
        .bind(new.value)
        .bind(new.min_purchase)
        .bind(new.max_discount)
        .bind(new.usage_limit)
        .bind(new.starts_at)
        .bind(new.ends_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.require(result.last_insert_rowid()).await
    }

    /// Fetches a code by id.
    pub async fn get(&self, id: i64) -> DbResult<Option<DiscountCode>> {
        let code = sqlx::query_as::<_, DiscountCode>(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(code)
    }

    async fn require(&self, id: i64) -> DbResult<DiscountCode> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Discount code", id))
    }

    /// Looks up a code by its normalized text.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<DiscountCode>> {
        let found = sqlx::query_as::<_, DiscountCode>(&format!("{SELECT_COLUMNS} WHERE code = ?1"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found)
    }

    /// Lists codes, newest first, for operator screens.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<DiscountCode>> {
        let codes = sqlx::query_as::<_, DiscountCode>(&format!(
            "{SELECT_COLUMNS} ORDER BY created_at DESC, id DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(codes)
    }

    /// Atomically increments `used_count`, respecting `usage_limit`.
    ///
    /// Runs inside the caller's checkout transaction so a conflict
    /// rolls the whole order back.
    pub async fn redeem_in_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        id: i64,
        code: &str,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE discount_codes
            SET used_count = used_count + 1
            WHERE id = ?1
              AND is_active = 1
              AND (usage_limit IS NULL OR used_count < usage_limit)
            "#,
        )
        .bind(id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::UsageExhausted {
                code: code.to_string(),
            });
        }
        Ok(())
    }

    /// Toggles the active flag, returning the new state.
    pub async fn toggle_active(&self, id: i64) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE discount_codes SET is_active = NOT is_active WHERE id = ?1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Discount code", id));
        }
        Ok(self.require(id).await?.is_active)
    }

    /// Physically deletes a code. Orders keep the code text they
    /// snapshotted at checkout.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM discount_codes WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Discount code", id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

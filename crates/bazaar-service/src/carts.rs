//! # Cart Service
//!
//! Session-backed cart operations: every mutation is rate-gated, checks
//! the live catalog, and leaves the cart untouched on rejection.
//!
//! ## Data Flow
//! ```text
//! inbound action ──► Gate ──► catalog fetch ──► Cart (pure) ──► session
//! ```
//! No persistence happens here; the cart only reaches the database at
//! checkout.

use std::sync::Arc;

use tracing::debug;

use bazaar_core::cart::CartView;
use bazaar_core::CoreError;
use bazaar_db::Database;

use crate::config::ServiceConfig;
use crate::error::ServiceResult;
use crate::gate::Gate;
use crate::session::SessionStore;

/// Cart operations for one storefront.
#[derive(Clone)]
pub struct CartService {
    db: Database,
    sessions: Arc<SessionStore>,
    gate: Gate,
    config: ServiceConfig,
}

impl CartService {
    pub(crate) fn new(
        db: Database,
        sessions: Arc<SessionStore>,
        gate: Gate,
        config: ServiceConfig,
    ) -> Self {
        CartService {
            db,
            sessions,
            gate,
            config,
        }
    }

    /// Adds `delta_qty` of a product to the actor's cart.
    ///
    /// Returns the line's new quantity. Rejections (missing or inactive
    /// product, insufficient stock, cart capacity, rate limit) leave
    /// the cart unchanged.
    pub async fn add(&self, actor_id: i64, product_id: i64, delta_qty: i64) -> ServiceResult<i64> {
        self.gate
            .check_action(actor_id, "cart", self.config.cart_limit)?;

        let product = self
            .db
            .products()
            .get(product_id)
            .await?
            .ok_or(CoreError::ProductNotFound(product_id))?;

        let new_qty = self
            .sessions
            .with_session(actor_id, |session| session.cart.add(&product, delta_qty))?;

        debug!(actor_id, product_id, new_qty, "Cart updated");
        Ok(new_qty)
    }

    /// Reviews the actor's cart against the live catalog.
    ///
    /// Stale lines come back flagged, never silently dropped; the total
    /// covers clean lines only. The shell decides how to render flags.
    pub async fn view(&self, actor_id: i64) -> ServiceResult<CartView> {
        self.gate.check(actor_id)?;

        let cart = self.sessions.cart(actor_id);

        let mut fresh = Vec::with_capacity(cart.lines().len());
        for line in cart.lines() {
            if let Some(product) = self.db.products().get(line.product_id).await? {
                fresh.push(product);
            }
        }

        Ok(cart.review(|id| fresh.iter().find(|p| p.id == id)))
    }

    /// Empties the actor's cart.
    pub fn clear(&self, actor_id: i64) {
        self.sessions.with_session(actor_id, |session| {
            session.cart.clear();
        });
        debug!(actor_id, "Cart cleared");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

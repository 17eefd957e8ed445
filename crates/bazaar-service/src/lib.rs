//! # bazaar-service: Application Services for the Bazaar Storefront
//!
//! The layer a chat shell talks to. Wires the pure core to persistence
//! and owns everything in between: sessions, rate gating, checkout
//! orchestration, conversation driving, operator notification.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Storefront Data Flow                             │
//! │                                                                         │
//! │  Chat shell (transport, rendering, keyboards)     [not this workspace]  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  bazaar-service (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │  Storefront                                                     │   │
//! │  │  ├── carts()          add / view / clear                        │   │
//! │  │  ├── orders()         checkout / adjust / status / listings     │   │
//! │  │  └── conversations()  start flows / handle input / commit       │   │
//! │  │                                                                 │   │
//! │  │  shared: SessionStore, RateLimiter gate, Notifier, Publisher    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                          │                                      │
//! │       ▼                          ▼                                      │
//! │  bazaar-core (pure rules)   bazaar-db (SQLite)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bazaar_service::{ServiceConfig, Storefront};
//!
//! bazaar_service::logging::init();
//! let front = Storefront::new(ServiceConfig::load()?).await?;
//!
//! front.carts().add(actor_id, product_id, 1).await?;
//! let order = front.orders().checkout(actor_id, Some("SAVE10")).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod carts;
pub mod catalog;
pub mod config;
pub mod conversations;
pub mod error;
mod gate;
pub mod logging;
pub mod notifier;
pub mod orders;
pub mod session;

use std::sync::{Arc, Mutex};

use bazaar_core::ratelimit::RateLimiter;
use bazaar_db::{Database, DbConfig};

use crate::carts::CartService;
use crate::catalog::{CatalogPublisher, NoopPublisher};
use crate::conversations::ConversationService;
use crate::gate::Gate;
use crate::notifier::{Notifier, ThrottledNotifier, TracingNotifier};
use crate::orders::OrderService;
use crate::session::SessionStore;

// =============================================================================
// Re-exports
// =============================================================================

pub use crate::config::ServiceConfig;
pub use crate::conversations::ConversationReply;
pub use crate::error::{CheckoutProblem, ServiceError, ServiceResult};
pub use crate::orders::ItemOp;

// =============================================================================
// Storefront
// =============================================================================

/// The assembled storefront: one per process.
///
/// Cheap to clone; all clones share sessions, limiter, and pool.
#[derive(Clone)]
pub struct Storefront {
    db: Database,
    config: ServiceConfig,
    sessions: Arc<SessionStore>,
    limiter: Arc<Mutex<RateLimiter>>,
    notifier: Arc<dyn Notifier>,
    publisher: Arc<dyn CatalogPublisher>,
}

impl Storefront {
    /// Opens the database and assembles the default collaborators
    /// (throttled tracing notifier, no-op catalog publisher).
    pub async fn new(config: ServiceConfig) -> ServiceResult<Self> {
        let db = Database::new(DbConfig::new(&config.database_path)).await?;
        Ok(Self::with_collaborators(
            db,
            config,
            Arc::new(ThrottledNotifier::new(TracingNotifier)),
            Arc::new(NoopPublisher),
        ))
    }

    /// Assembles a storefront around injected collaborators. The shell
    /// passes its own notifier and catalog publisher here.
    pub fn with_collaborators(
        db: Database,
        config: ServiceConfig,
        notifier: Arc<dyn Notifier>,
        publisher: Arc<dyn CatalogPublisher>,
    ) -> Self {
        Storefront {
            db,
            config,
            sessions: Arc::new(SessionStore::new()),
            limiter: Arc::new(Mutex::new(RateLimiter::new())),
            notifier,
            publisher,
        }
    }

    /// Cart operations.
    pub fn carts(&self) -> CartService {
        CartService::new(
            self.db.clone(),
            self.sessions.clone(),
            self.gate(),
            self.config.clone(),
        )
    }

    /// Order operations.
    pub fn orders(&self) -> OrderService {
        OrderService::new(
            self.db.clone(),
            self.sessions.clone(),
            self.gate(),
            self.config.clone(),
            self.notifier.clone(),
        )
    }

    /// Conversation operations.
    pub fn conversations(&self) -> ConversationService {
        ConversationService::new(
            self.db.clone(),
            self.sessions.clone(),
            self.gate(),
            self.orders(),
            self.publisher.clone(),
        )
    }

    /// Direct database access, for operator tooling beyond the
    /// service surface.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Operator override: clears every rate window for one actor.
    pub fn reset_limits(&self, actor_id: i64) {
        self.gate().reset(actor_id);
    }

    fn gate(&self) -> Gate {
        Gate::new(self.limiter.clone(), self.config.overall_limit)
    }
}

// =============================================================================
// Test Support
// =============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::catalog::testing::FakePublisher;
    use crate::config::RateRule;

    /// In-memory storefront with limits high enough to stay out of the
    /// way of functional tests.
    pub async fn storefront() -> Storefront {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let config = ServiceConfig {
            database_path: ":memory:".to_string(),
            overall_limit: RateRule::new(60, 10_000),
            order_limit: RateRule::new(60, 10_000),
            discount_limit: RateRule::new(60, 10_000),
            cart_limit: RateRule::new(60, 10_000),
            list_limit: 50,
        };
        Storefront::with_collaborators(
            db,
            config,
            Arc::new(TracingNotifier),
            Arc::new(FakePublisher),
        )
    }
}

// =============================================================================
// Integration-style Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateRule;
    use bazaar_core::CoreError;
    use bazaar_db::NewProduct;

    /// Tight order window: the fourth checkout attempt inside the hour
    /// is refused with a positive wait time.
    #[tokio::test]
    async fn test_order_rate_limit_enforced() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let config = ServiceConfig {
            database_path: ":memory:".to_string(),
            overall_limit: RateRule::new(60, 10_000),
            order_limit: RateRule::new(3600, 3),
            discount_limit: RateRule::new(60, 10_000),
            cart_limit: RateRule::new(60, 10_000),
            list_limit: 50,
        };
        let front = Storefront::with_collaborators(
            db,
            config,
            Arc::new(notifier::TracingNotifier),
            Arc::new(catalog::NoopPublisher),
        );

        let p = front
            .db()
            .products()
            .insert(NewProduct {
                name: "Saffron 5g".to_string(),
                description: None,
                price: 50_000,
                stock: 100,
                image_ref: None,
            })
            .await
            .unwrap();

        for _ in 0..3 {
            front.carts().add(7, p.id, 1).await.unwrap();
            front.orders().checkout(7, None).await.unwrap();
        }

        front.carts().add(7, p.id, 1).await.unwrap();
        match front.orders().checkout(7, None).await {
            Err(ServiceError::Core(CoreError::RateLimited { retry_after_secs })) => {
                assert!(retry_after_secs > 0);
            }
            other => panic!("expected rate limit, got {other:?}"),
        }

        // Operator override clears the window
        front.reset_limits(7);
        front.orders().checkout(7, None).await.unwrap();
    }
}

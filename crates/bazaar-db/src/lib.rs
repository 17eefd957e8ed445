//! # bazaar-db: Database Layer for the Bazaar Storefront
//!
//! SQLite persistence for the catalog, orders, and discount codes.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Storefront Data Flow                             │
//! │                                                                         │
//! │  bazaar-service (checkout, conversations, admin)                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     bazaar-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │   │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │   │   │
//! │  │   │               │    │ ProductRepo   │    │              │   │   │
//! │  │   │ SqlitePool    │◄───│ OrderRepo     │    │ 001_init.sql │   │   │
//! │  │   │ WAL mode      │    │ DiscountRepo  │    │              │   │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (or :memory: in tests)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - connection pool creation and configuration
//! - [`migrations`] - embedded database migrations
//! - [`error`] - database error types
//! - [`repository`] - repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bazaar_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("bazaar.db")).await?;
//! let product = db.products().get(42).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::discount::{DiscountRepository, NewDiscount};
pub use repository::order::{NewOrderItem, OrderRepository};
pub use repository::product::{NewProduct, ProductRepository};

//! # bazaar-core: Pure Business Logic for the Storefront Engine
//!
//! This crate is the **heart** of the storefront bot. It contains all
//! business logic as pure functions and state machines with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Storefront Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               Chat Transport (external collaborator)            │   │
//! │  │     inbound actor actions ──► structured results back out       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  bazaar-service (orchestration)                 │   │
//! │  │     sessions, checkout, conversation driver, notifier           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bazaar-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────┐ ┌──────────────┐ ┌───────┐  │   │
//! │  │   │  types  │ │ pricing │ │ cart │ │ conversation │ │ rate- │  │   │
//! │  │   │ Product │ │ totals  │ │ add  │ │ AddProduct   │ │ limit │  │   │
//! │  │   │  Order  │ │discount │ │check │ │ Discount...  │ │window │  │   │
//! │  │   └─────────┘ └─────────┘ └──────┘ └──────────────┘ └───────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                   bazaar-db (Database Layer)                    │   │
//! │  │            SQLite queries, migrations, repositories             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Order, OrderItem, DiscountCode)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validate`] - Input validation and normalization
//! - [`pricing`] - The single pricing authority (recompute)
//! - [`cart`] - Per-actor transient cart with stock/capacity checks
//! - [`conversation`] - Multi-step guided data entry flows
//! - [`ratelimit`] - Sliding-window request throttling
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output; time is a parameter
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all monetary values are whole currency units (i64)
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod conversation;
pub mod error;
pub mod money;
pub mod pricing;
pub mod ratelimit;
pub mod types;
pub mod validate;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum total item quantity allowed in a single cart.
///
/// ## Business Reason
/// Prevents runaway carts and keeps orders reviewable by a single
/// operator. Configurable per deployment via the service config; this
/// is the default.
pub const MAX_CART_ITEMS: i64 = 50;

/// Maximum quantity accepted for any single numeric entry.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g. typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 10_000;

/// Discount codes are 3 to 20 ASCII alphanumeric characters.
pub const DISCOUNT_CODE_MIN_LEN: usize = 3;
pub const DISCOUNT_CODE_MAX_LEN: usize = 20;

/// Universal cancellation token accepted at every conversation step.
pub const CANCEL_TOKEN: &str = "/cancel";

//! # Error Types
//!
//! Domain-specific error types for bazaar-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bazaar-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Malformed / out-of-range user input            │
//! │                                                                         │
//! │  bazaar-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  bazaar-service errors                                                 │
//! │  └── ServiceError     - What the calling shell sees                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Recovery Semantics
//! - `Validation(_)`: recoverable, re-prompt the same conversation step
//! - `*NotFound`: abort the current operation, never retried automatically
//! - `InsufficientStock` / `CartTooLarge` / `DiscountNotUsable`:
//!   recoverable by the actor choosing different input
//! - `RateLimited`: recoverable after the reported delay

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic
/// failures. The service layer translates them to user-facing guidance.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found (missing id or soft-deleted).
    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    /// Product exists but has been deactivated by the operator.
    #[error("Product is inactive: {0}")]
    ProductInactive(i64),

    /// Insufficient stock to satisfy the requested quantity.
    ///
    /// Reports both sides so the caller can show "available X, requested Y"
    /// (the original behavior every stock rejection follows).
    #[error("Insufficient stock for '{name}': available {available}, requested {requested}")]
    InsufficientStock {
        name: String,
        available: i64,
        requested: i64,
    },

    /// Cart would exceed the configured maximum total quantity.
    #[error("Cart cannot hold more than {max} items")]
    CartTooLarge { max: i64 },

    /// Order cannot be found.
    #[error("Order not found: {0}")]
    OrderNotFound(i64),

    /// Item index does not exist on the order.
    #[error("Order {order_id} has no item at index {index}")]
    ItemIndexOutOfRange { order_id: i64, index: usize },

    /// Removing the last remaining item is not allowed; the operator
    /// must reject the whole order instead.
    #[error("Cannot remove the last item of order {order_id}; reject the whole order instead")]
    LastItemRemoval { order_id: i64 },

    /// Order status transition is not allowed.
    #[error("Order {order_id} is {current}, cannot transition to {requested}")]
    InvalidStatusTransition {
        order_id: i64,
        current: String,
        requested: String,
    },

    /// Discount code does not exist.
    #[error("Discount code not found: {0}")]
    DiscountNotFound(String),

    /// Discount code exists but cannot be used right now
    /// (inactive, outside its window, exhausted, or below min purchase).
    #[error("Discount code '{code}' cannot be used: {reason}")]
    DiscountNotUsable { code: String, reason: String },

    /// Actor exceeded a rate window.
    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when raw actor input doesn't meet requirements. They are
/// always recoverable: the conversation re-enters the same step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value could not be parsed as a number.
    #[error("{field} must be a number")]
    NotNumeric { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g. bad date, bad character class).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g. discount code already exists).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    /// Creates a Required error for the given field.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Creates a NotNumeric error for the given field.
    pub fn not_numeric(field: impl Into<String>) -> Self {
        ValidationError::NotNumeric {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

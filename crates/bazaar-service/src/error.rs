//! # Service Error Types
//!
//! What the calling shell sees: core business errors, persistence
//! failures, and checkout-specific refusals, each carrying enough
//! structure for the shell to render actionable guidance.

use thiserror::Error;

use bazaar_core::cart::CartProblem;
use bazaar_core::{CoreError, OrderStatus};
use bazaar_db::DbError;

/// One cart line that blocks checkout.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CheckoutProblem {
    pub product_id: i64,
    pub name: String,
    pub problem: CartProblem,
}

/// Errors surfaced to the calling shell.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Business rule violation from the core.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Persistence failure. The shell shows a generic message; the
    /// notifier has already been told.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Checkout attempted with an empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// One or more cart lines failed the commit-time re-validation.
    /// Every failing line is reported; nothing was persisted.
    #[error("Checkout blocked: {} line(s) no longer valid", problems.len())]
    CheckoutBlocked { problems: Vec<CheckoutProblem> },

    /// Item adjustment attempted on a terminal order.
    #[error("Order {order_id} is {status} and can no longer be edited")]
    OrderNotEditable { order_id: i64, status: OrderStatus },

    /// Input arrived with no conversation flow in progress.
    #[error("No conversation in progress")]
    NoActiveFlow,
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

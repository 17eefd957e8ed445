//! # Cart
//!
//! Per-actor transient cart: a mapping of product to quantity, held in
//! session memory until checkout persists it as an order.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cart Operations                                  │
//! │                                                                         │
//! │  Actor Action             Core Operation          Cart State Change     │
//! │  ────────────             ──────────────          ─────────────────     │
//! │                                                                         │
//! │  Pick Product ───────────► add(product, +n) ────► line.quantity += n   │
//! │                                                                         │
//! │  View Cart ──────────────► review(lookup) ──────► (read only, flags    │
//! │                                                    stale lines)         │
//! │                                                                         │
//! │  Checkout / Cancel ──────► clear() ─────────────► lines.clear()        │
//! │                                                                         │
//! │  Stock is CHECKED here, not reserved: it can move between add and       │
//! │  checkout, so checkout re-validates every line before committing.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::Product;
use crate::MAX_CART_ITEMS;

// =============================================================================
// Cart Line
// =============================================================================

/// A single cart line.
///
/// ## Design Notes
/// - `product_id`: reference for re-fetching at review/checkout time
/// - `name_snapshot` / `unit_price`: frozen at the moment of adding,
///   so the cart renders consistently even if the catalog changes
///   underneath it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: i64,

    /// Product name at time of adding (frozen).
    pub name_snapshot: String,

    /// Price per unit at time of adding (frozen).
    pub unit_price: i64,

    /// Quantity in cart, always positive.
    pub quantity: i64,

    /// When this line was first added.
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    fn from_product(product: &Product, quantity: i64) -> Self {
        CartLine {
            product_id: product.id,
            name_snapshot: product.name.clone(),
            unit_price: product.price,
            quantity,
            added_at: Utc::now(),
        }
    }

    /// Line total at the frozen unit price.
    pub fn line_total(&self) -> i64 {
        self.unit_price * self.quantity
    }
}

// =============================================================================
// Cart
// =============================================================================

/// One actor's cart.
///
/// ## Invariants
/// - Lines are unique by `product_id` (adding the same product merges
///   into the existing line)
/// - Every line's quantity is positive
/// - Total quantity across lines never exceeds [`MAX_CART_ITEMS`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Cart { lines: Vec::new() }
    }

    /// Adds `delta_qty` of a product, merging into an existing line.
    ///
    /// ## Rejections (cart unchanged on every one)
    /// - product inactive
    /// - resulting line quantity above the product's current stock
    ///   (reports available vs requested)
    /// - resulting total cart quantity above [`MAX_CART_ITEMS`]
    ///
    /// A delta that brings the line to zero or below removes the line.
    ///
    /// ## Returns
    /// The line's new quantity (zero if the line was removed).
    pub fn add(&mut self, product: &Product, delta_qty: i64) -> CoreResult<i64> {
        if !product.is_active {
            return Err(CoreError::ProductInactive(product.id));
        }

        let current = self.quantity_of(product.id);
        let new_qty = current + delta_qty;

        if new_qty <= 0 {
            self.lines.retain(|l| l.product_id != product.id);
            return Ok(0);
        }

        if new_qty > product.stock {
            return Err(CoreError::InsufficientStock {
                name: product.name.clone(),
                available: product.stock,
                requested: new_qty,
            });
        }

        if self.total_quantity() - current + new_qty > MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }

        match self.lines.iter_mut().find(|l| l.product_id == product.id) {
            Some(line) => line.quantity = new_qty,
            None => self.lines.push(CartLine::from_product(product, new_qty)),
        }

        Ok(new_qty)
    }

    /// Reviews the cart against a fresh catalog snapshot.
    ///
    /// Lines whose product has vanished, gone inactive, or dropped below
    /// the carted quantity are FLAGGED, not dropped: the caller decides
    /// how to render them. The returned total sums only clean lines.
    pub fn review<'a, F>(&self, lookup: F) -> CartView
    where
        F: Fn(i64) -> Option<&'a Product>,
    {
        let mut lines = Vec::with_capacity(self.lines.len());
        let mut total = 0i64;

        for line in &self.lines {
            let problem = line_problem(line, lookup(line.product_id));
            if problem.is_none() {
                total += line.line_total();
            }
            lines.push(CartViewLine {
                product_id: line.product_id,
                name: line.name_snapshot.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                line_total: line.line_total(),
                problem,
            });
        }

        CartView { lines, total }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Total quantity across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    fn quantity_of(&self, product_id: i64) -> i64 {
        self.lines
            .iter()
            .find(|l| l.product_id == product_id)
            .map(|l| l.quantity)
            .unwrap_or(0)
    }
}

/// Checks one cart line against its refreshed product.
pub fn line_problem(line: &CartLine, product: Option<&Product>) -> Option<CartProblem> {
    match product {
        None => Some(CartProblem::Missing),
        Some(p) if !p.is_active => Some(CartProblem::Inactive),
        Some(p) if line.quantity > p.stock => Some(CartProblem::Understocked {
            available: p.stock,
        }),
        Some(_) => None,
    }
}

// =============================================================================
// Review Output
// =============================================================================

/// Why a cart line no longer matches the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CartProblem {
    /// Product no longer exists (or was soft-deleted).
    Missing,
    /// Product was deactivated after being carted.
    Inactive,
    /// Stock dropped below the carted quantity.
    Understocked { available: i64 },
}

/// One rendered cart line, possibly flagged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartViewLine {
    pub product_id: i64,
    pub name: String,
    pub unit_price: i64,
    pub quantity: i64,
    pub line_total: i64,
    pub problem: Option<CartProblem>,
}

///// Cart review result: all lines (flagged ones included) plus the total
/// over clean lines only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartView {
    pub lines: Vec<CartViewLine>,
    pub total: i64,
}

impl CartView {
    /// True when every line is clean.
    pub fn is_clean(&self) -> bool {
        self.lines.iter().all(|l| l.problem.is_none())
    }

    /// The flagged lines, for checkout rejection reporting.
    pub fn problems(&self) -> Vec<&CartViewLine> {
        self.lines.iter().filter(|l| l.problem.is_some()).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

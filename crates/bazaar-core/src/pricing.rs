//! # Pricing Engine
//!
//! The single source of truth for order totals.
//!
//! ## Why One Function
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Every Mutation Routes Through Here                     │
//! │                                                                         │
//! │  increase-by-pack ──┐                                                   │
//! │  decrease-by-pack ──┤                                                   │
//! │  set-quantity ──────┼──► recompute(items, discount, now) ──► persist    │
//! │  remove-item ───────┤                                                   │
//! │  apply-discount ────┘                                                   │
//! │                                                                         │
//! │  An earlier revision of this system updated quantities without          │
//! │  recomputing, leaving gross/net stale after item removal and pack       │
//! │  changes. Recomputation is therefore mandatory, not optional.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Algorithm
//! 1. Derive any missing unit price as `pack_price / pack_quantity`
//!    (zero-guard) and write it back onto the item, so the derivation
//!    happens once and repeated recomputes are idempotent.
//! 2. `line_total = unit_price * quantity`; gross is the sum.
//! 3. An unusable discount (inactive, outside window, exhausted, below
//!    min purchase) contributes zero. Percentage discounts are capped by
//!    `max_discount`; fixed discounts are taken at face value.
//! 4. `net = max(gross - discount, 0)`.

use chrono::{DateTime, Utc};

use crate::money::Money;
use crate::types::{DiscountCode, DiscountKind, OrderItem};

// =============================================================================
// Totals
// =============================================================================

/// Order-level pricing summary, always derived from the item list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct OrderTotals {
    /// Sum of line totals before discount.
    pub gross: i64,
    /// Discount amount applied (zero if no usable code).
    pub discount: i64,
    /// `max(gross - discount, 0)`.
    pub net: i64,
}

impl OrderTotals {
    #[inline]
    pub fn gross(&self) -> Money {
        Money::from_units(self.gross)
    }

    #[inline]
    pub fn net(&self) -> Money {
        Money::from_units(self.net)
    }
}

// =============================================================================
// Recompute
// =============================================================================

/// Recomputes per-item and order-level totals in place.
///
/// ## Arguments
/// * `items` - the order's current item list; `unit_price` and
///   `line_total` are rewritten on every call
/// * `discount` - the resolved discount code, if the order carries one
/// * `now` - evaluation instant for the validity window (a parameter,
///   so tests are deterministic)
///
/// ## Idempotence
/// Calling this twice with the same inputs yields identical totals:
/// unit prices are derived at most once and all arithmetic is integer.
pub fn recompute(
    items: &mut [OrderItem],
    discount: Option<&DiscountCode>,
    now: DateTime<Utc>,
) -> OrderTotals {
    let mut gross = Money::zero();

    for item in items.iter_mut() {
        if item.unit_price == 0 {
            item.unit_price = derive_unit_price(item.pack_price, item.pack_quantity);
        }

        item.line_total = item.unit_price * item.quantity;
        gross += Money::from_units(item.line_total);
    }

    let discount_amount = match discount {
        Some(code) => discount_amount(code, gross, now),
        None => Money::zero(),
    };

    let net = gross.saturating_sub_floor_zero(discount_amount);

    OrderTotals {
        gross: gross.units(),
        discount: discount_amount.units(),
        net: net.units(),
    }
}

/// Derives a unit price from pack data, guarding division by zero.
///
/// Items recorded before unit prices were captured only carry
/// `pack_price`; the derived value is persisted onto the item by
/// [`recompute`] so this runs at most once per item.
fn derive_unit_price(pack_price: Option<i64>, pack_quantity: i64) -> i64 {
    match pack_price {
        Some(pack_price) if pack_quantity > 0 => pack_price / pack_quantity,
        _ => 0,
    }
}

/// Computes the discount a code yields against a gross total.
///
/// Unusable codes yield zero (the caller surfaces *why* separately via
/// [`DiscountCode::usable`]).
pub fn discount_amount(code: &DiscountCode, gross: Money, now: DateTime<Utc>) -> Money {
    if code.usable(gross, now).is_err() {
        return Money::zero();
    }
    amount_for(code, gross)
}

/// The discount formula alone, with no usability gating.
///
/// Used when recomputing an order that already redeemed its code: the
/// redemption bumped `used_count`, so re-running the usability check
/// would wrongly zero the discount on a limit-1 code. A fixed discount
/// is not capped by the gross; the net clamps at zero instead.
pub fn amount_for(code: &DiscountCode, gross: Money) -> Money {
    match code.kind {
        DiscountKind::Percentage => {
            let raw = gross.percentage(code.value);
            match code.max_discount {
                Some(cap) => raw.min(Money::from_units(cap)),
                None => raw,
            }
        }
        DiscountKind::Fixed => Money::from_units(code.value),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Domain Types
//!
//! Core domain types used throughout the storefront engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Order       │   │  DiscountCode   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (i64)       │   │  id (i64)       │   │  code (unique)  │       │
//! │  │  name, price    │   │  actor_id       │   │  kind, value    │       │
//! │  │  stock          │   │  gross/net      │   │  usage window   │       │
//! │  │  is_active      │   │  status         │   │  used_count     │       │
//! │  └─────────────────┘   └────────┬────────┘   └─────────────────┘       │
//! │                                 │                                       │
//! │                        ┌────────▼────────┐                              │
//! │                        │   OrderItem     │  snapshot pattern:           │
//! │                        │  name_snapshot  │  frozen at order time so     │
//! │                        │  unit_price     │  later product edits never   │
//! │                        │  pack_quantity  │  rewrite history             │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Typed Records at the Boundary
//! All core logic operates on these types. Raw database rows are converted
//! exactly once, at the persistence boundary, never as positional tuples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A product available in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (database rowid).
    pub id: i64,

    /// Display name shown in the catalog and on orders.
    pub name: String,

    /// Optional free-text description.
    pub description: Option<String>,

    /// Unit price in whole currency units.
    pub price: i64,

    /// Current stock level (never negative).
    pub stock: i64,

    /// Opaque image reference (chat platform file token).
    pub image_ref: Option<String>,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    /// Opaque reference to the published catalog listing, if any.
    pub channel_ref: Option<String>,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the unit price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_units(self.price)
    }

    /// Checks if the product can satisfy the requested quantity.
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.is_active && self.stock >= quantity
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// The status of an order.
///
/// ## Lifecycle
/// ```text
/// pending ──► confirmed ──► completed
///    │
///    └──────► cancelled
/// ```
/// `completed` and `cancelled` are terminal: the order becomes immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order placed, awaiting operator review.
    Pending,
    /// Operator accepted the order.
    Confirmed,
    /// Order fulfilled. Terminal.
    Completed,
    /// Order rejected or withdrawn. Terminal.
    Cancelled,
}

impl OrderStatus {
    /// Checks whether a one-way transition to `next` is allowed.
    ///
    /// Allowed: `pending→confirmed`, `pending→cancelled`,
    /// `confirmed→completed`. Everything else is rejected.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Confirmed)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Confirmed, OrderStatus::Completed)
        )
    }

    /// Terminal orders are immutable (no item edits, no transitions).
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Stable lowercase name (matches the database representation).
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Order
// =============================================================================

/// A placed order with its pricing summary.
///
/// Items live in [`OrderItem`] rows; `gross`/`discount`/`net` are always
/// the output of the pricing engine over the current item list, never
/// edited independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: i64,
    /// Actor (chat user) who placed the order.
    pub actor_id: i64,
    /// Total before discount, whole currency units.
    pub gross: i64,
    /// Discount amount applied.
    pub discount: i64,
    /// Total after discount (`max(gross - discount, 0)`).
    pub net: i64,
    /// Discount code applied at checkout, if any.
    pub discount_code: Option<String>,
    pub status: OrderStatus,
    /// Free-text operator notes.
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
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
// Order Item
// =============================================================================

/// A line item in an order.
///
/// Uses the snapshot pattern: product name, pack label, and unit price
/// are frozen at order time so historical orders survive product edits.
///
/// ## Invariant
/// `line_total == unit_price * quantity` after every mutation. The value
/// is stored for display but is *always* re-derived by
/// [`crate::pricing::recompute`]; no code path updates quantity without
/// recomputing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    /// Product name at order time (frozen).
    pub name_snapshot: String,
    /// Pack label at order time (e.g. "box of 6"), if sold in packs.
    pub pack_label: Option<String>,
    /// Price per base unit at order time (frozen). Zero means "derive
    /// from pack data on next recompute".
    pub unit_price: i64,
    /// Purchasing multiple: ➕/➖ adjustments step by this amount.
    pub pack_quantity: i64,
    /// Price of one pack at order time, used to derive `unit_price`
    /// when it was not captured directly.
    pub pack_price: Option<i64>,
    /// Quantity in base units (not packs).
    pub quantity: i64,
    /// `unit_price * quantity`, re-derived on every recompute.
    pub line_total: i64,
}

impl OrderItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_units(self.unit_price)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_units(self.line_total)
    }
}

// =============================================================================
// Discount Code
// =============================================================================

/// Discount calculation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// `value`% off the gross, optionally capped by `max_discount`.
    Percentage,
    /// Flat `value` off the gross (net clamps at zero).
    Fixed,
}

impl fmt::Display for DiscountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiscountKind::Percentage => "percentage",
            DiscountKind::Fixed => "fixed",
        })
    }
}

/// A discount code with tiered rules and expiry/usage constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DiscountCode {
    pub id: i64,
    /// Unique, uppercased, ASCII alphanumeric, 3-20 chars.
    pub code: String,
    pub kind: DiscountKind,
    /// Percent (1-100) for `Percentage`, whole currency units for `Fixed`.
    pub value: i64,
    /// Minimum gross required before the code applies. Zero = none.
    pub min_purchase: i64,
    /// Cap on the computed discount (percentage kind only).
    pub max_discount: Option<i64>,
    /// Maximum number of redemptions. None = unlimited.
    pub usage_limit: Option<i64>,
    /// Successful redemptions so far. Never exceeds `usage_limit`
    /// (enforced by an atomic conditional update at the persistence
    /// layer, not just here).
    pub used_count: i64,
    /// Validity window start. None = usable immediately.
    pub starts_at: Option<DateTime<Utc>>,
    /// Validity window end. None = no expiry.
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Why a discount code cannot be applied right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountRejection {
    /// Toggled off by the operator.
    Inactive,
    /// Validity window hasn't opened yet.
    NotStarted,
    /// Validity window has closed.
    Expired,
    /// `used_count` reached `usage_limit`.
    Exhausted,
    /// Gross is below the minimum-purchase threshold.
    BelowMinPurchase { min: i64 },
}

impl fmt::Display for DiscountRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscountRejection::Inactive => write!(f, "code is inactive"),
            DiscountRejection::NotStarted => write!(f, "code is not valid yet"),
            DiscountRejection::Expired => write!(f, "code has expired"),
            DiscountRejection::Exhausted => write!(f, "usage limit reached"),
            DiscountRejection::BelowMinPurchase { min } => {
                write!(f, "minimum purchase of {} not met", Money::from_units(*min))
            }
        }
    }
}

impl DiscountCode {
    /// Checks every gate except the amount calculation: active flag,
    /// validity window, usage exhaustion, minimum purchase.
    ///
    /// A code failing any gate contributes a zero discount; the pricing
    /// engine and the redemption preview both route through here so the
    /// two can never disagree.
    pub fn usable(&self, gross: Money, now: DateTime<Utc>) -> Result<(), DiscountRejection> {
        if !self.is_active {
            return Err(DiscountRejection::Inactive);
        }

        if let Some(starts_at) = self.starts_at {
            if now < starts_at {
                return Err(DiscountRejection::NotStarted);
            }
        }

        if let Some(ends_at) = self.ends_at {
            if now > ends_at {
                return Err(DiscountRejection::Expired);
            }
        }

        if let Some(limit) = self.usage_limit {
            if self.used_count >= limit {
                return Err(DiscountRejection::Exhausted);
            }
        }

        if gross.units() < self.min_purchase {
            return Err(DiscountRejection::BelowMinPurchase {
                min: self.min_purchase,
            });
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
    use chrono::Duration;

    fn sample_code() -> DiscountCode {
        DiscountCode {
            id: 1,
            code: "SAVE10".to_string(),
            kind: DiscountKind::Percentage,
            value: 10,
            min_purchase: 100_000,
            max_discount: Some(15_000),
            usage_limit: None,
            used_count: 0,
            starts_at: None,
            ends_at: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_transitions() {
        use OrderStatus::*;

        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Completed));

        assert!(!Confirmed.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Confirmed.is_terminal());
    }

    #[test]
    fn test_discount_usable_happy_path() {
        let code = sample_code();
        assert!(code.usable(Money::from_units(200_000), Utc::now()).is_ok());
    }

    #[test]
    fn test_discount_inactive_rejected() {
        let mut code = sample_code();
        code.is_active = false;
        assert_eq!(
            code.usable(Money::from_units(200_000), Utc::now()),
            Err(DiscountRejection::Inactive)
        );
    }

    #[test]
    fn test_discount_window() {
        let now = Utc::now();

        let mut code = sample_code();
        code.starts_at = Some(now + Duration::days(1));
        assert_eq!(
            code.usable(Money::from_units(200_000), now),
            Err(DiscountRejection::NotStarted)
        );

        let mut code = sample_code();
        code.ends_at = Some(now - Duration::days(1));
        assert_eq!(
            code.usable(Money::from_units(200_000), now),
            Err(DiscountRejection::Expired)
        );
    }

    #[test]
    fn test_discount_exhausted_regardless_of_other_fields() {
        let mut code = sample_code();
        code.usage_limit = Some(1);
        code.used_count = 1;
        assert_eq!(
            code.usable(Money::from_units(200_000), Utc::now()),
            Err(DiscountRejection::Exhausted)
        );
    }

    #[test]
    fn test_discount_below_min_purchase() {
        let code = sample_code();
        assert_eq!(
            code.usable(Money::from_units(99_999), Utc::now()),
            Err(DiscountRejection::BelowMinPurchase { min: 100_000 })
        );
    }

    #[test]
    fn test_product_can_sell() {
        let product = Product {
            id: 1,
            name: "Saffron 5g".to_string(),
            description: None,
            price: 450_000,
            stock: 3,
            image_ref: None,
            is_active: true,
            channel_ref: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(product.can_sell(3));
        assert!(!product.can_sell(4));
    }
}

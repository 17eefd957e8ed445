//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004   WRONG!                             │
//! │                                                                         │
//! │  OUR SOLUTION: integer whole units                                      │
//! │    The shop currency has no minor unit in practice, so Money is a       │
//! │    plain i64 count of whole units. Percentage math widens to i128       │
//! │    and truncates, so repeated recomputation never drifts.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bazaar_core::money::Money;
//!
//! let price = Money::from_units(50_000);
//! let line = price * 3;
//! assert_eq!(line.units(), 150_000);
//! assert_eq!(format!("{}", line), "150,000");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in whole currency units.
///
/// ## Design Decisions
/// - **i64 (signed)**: allows negative intermediate values (discounts)
/// - **Single-field tuple struct**: zero-cost abstraction over i64
/// - **Derives**: full serde support for structured results
///
/// Every monetary value in the system (product price, line total, gross,
/// discount, net) flows through this type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from whole currency units.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Money(units)
    }

    /// Returns the value in whole currency units.
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::money::Money;
    ///
    /// let unit_price = Money::from_units(50_000);
    /// assert_eq!(unit_price.multiply_quantity(3).units(), 150_000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Computes `percent`% of this amount, truncating toward zero.
    ///
    /// ## Implementation
    /// Widens to i128 so large gross totals can't overflow:
    /// `amount * percent / 100`.
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::money::Money;
    ///
    /// let gross = Money::from_units(200_000);
    /// assert_eq!(gross.percentage(10).units(), 20_000);
    /// ```
    pub fn percentage(&self, percent: i64) -> Money {
        let amount = self.0 as i128 * percent as i128 / 100;
        Money(amount as i64)
    }

    /// Subtracts `other`, clamping the result at zero.
    ///
    /// Used for `net = max(gross - discount, 0)`: a fixed discount larger
    /// than the gross never produces a negative total.
    #[inline]
    pub fn saturating_sub_floor_zero(&self, other: Money) -> Money {
        Money((self.0 - other.0).max(0))
    }

    /// Returns the smaller of two amounts.
    #[inline]
    pub fn min(self, other: Money) -> Money {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display with thousands separators, e.g. `1,250,000`.
///
/// ## Note
/// This is for logs and operator-facing summaries. The chat shell owns
/// localization (digit script, currency word).
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let negative = self.0 < 0;
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        if negative {
            write!(f, "-{}", grouped)
        } else {
            write!(f, "{}", grouped)
        }
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

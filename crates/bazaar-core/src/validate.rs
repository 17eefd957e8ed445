//! # Validation Module
//!
//! Input validation and normalization for raw actor text.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Conversation step (this module)                              │
//! │  ├── Parse, normalize, range-check the raw text                        │
//! │  └── Failure re-prompts the SAME step with actionable guidance         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Business rules (pricing, cart, lifecycle)                    │
//! │  └── Stock, capacity, discount usability                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  └── NOT NULL / UNIQUE / CHECK constraints                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Totality
//! Every validator is a total function: malformed input returns a
//! structured [`ValidationError`], never a panic. Successful validation
//! returns the *normalized* value (separators stripped, case folded,
//! whitespace collapsed) so callers never re-normalize.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::ValidationError;
use crate::{DISCOUNT_CODE_MAX_LEN, DISCOUNT_CODE_MIN_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Earliest calendar year accepted for discount windows. Catches typos
/// like `1024-12-31`.
const MIN_DATE_YEAR: i32 = 2020;
/// Latest calendar year accepted for discount windows.
const MAX_DATE_YEAR: i32 = 2030;

/// Hard cap applied by [`sanitize`] on persisted free text.
const SANITIZE_MAX_LEN: usize = 1000;

// =============================================================================
// Numeric Validators
// =============================================================================

/// Strips thousands separators and whitespace from numeric text.
fn strip_separators(text: &str) -> String {
    text.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect()
}

/// Validates a price entered as text.
///
/// ## Rules
/// - Thousands separators (`,`) and spaces are removed before parsing
/// - Must parse as a non-negative integer
/// - Must fall within `[min, max]`
///
/// ## Example
/// ```rust
/// use bazaar_core::validate::price;
///
/// assert_eq!(price("50,000", 0, 1_000_000_000).unwrap(), 50_000);
/// assert!(price("abc", 0, 1_000_000_000).is_err());
/// ```
pub fn price(text: &str, min: i64, max: i64) -> ValidationResult<i64> {
    let cleaned = strip_separators(text);

    if cleaned.is_empty() {
        return Err(ValidationError::required("price"));
    }

    let value: i64 = cleaned
        .parse()
        .map_err(|_| ValidationError::not_numeric("price"))?;

    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min,
            max,
        });
    }

    Ok(value)
}

/// Validates a quantity entered as text.
///
/// Same separator handling as [`price`]; the field name in errors is
/// `quantity` so re-prompts read correctly.
pub fn quantity(text: &str, min: i64, max: i64) -> ValidationResult<i64> {
    let cleaned = strip_separators(text);

    if cleaned.is_empty() {
        return Err(ValidationError::required("quantity"));
    }

    let value: i64 = cleaned
        .parse()
        .map_err(|_| ValidationError::not_numeric("quantity"))?;

    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min,
            max,
        });
    }

    Ok(value)
}

/// Validates a percentage value (0-100 inclusive).
pub fn percentage(value: i64) -> ValidationResult<()> {
    if !(0..=100).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field: "percentage".to_string(),
            min: 0,
            max: 100,
        });
    }

    Ok(())
}

// =============================================================================
// Discount Code
// =============================================================================

/// Validates and normalizes a discount code.
///
/// ## Rules
/// - Trimmed and uppercased (codes are case-insensitive on entry)
/// - 3 to 20 characters
/// - ASCII alphanumeric only
///
/// ## Example
/// ```rust
/// use bazaar_core::validate::discount_code;
///
/// assert_eq!(discount_code(" summer2024 ").unwrap(), "SUMMER2024");
/// assert!(discount_code("ab").is_err());
/// assert!(discount_code("SAVE-10").is_err());
/// ```
pub fn discount_code(text: &str) -> ValidationResult<String> {
    let code = text.trim().to_ascii_uppercase();

    if code.is_empty() {
        return Err(ValidationError::required("code"));
    }

    if code.len() < DISCOUNT_CODE_MIN_LEN {
        return Err(ValidationError::TooShort {
            field: "code".to_string(),
            min: DISCOUNT_CODE_MIN_LEN,
        });
    }

    if code.len() > DISCOUNT_CODE_MAX_LEN {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: DISCOUNT_CODE_MAX_LEN,
        });
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "only English letters and digits are allowed".to_string(),
        });
    }

    Ok(code)
}

// =============================================================================
// Date Validator
// =============================================================================

/// Validates an optional date in `YYYY-MM-DD` form.
///
/// ## Rules
/// - The sentinel `"0"` means "no constraint" and returns `None`
/// - Otherwise must parse as `YYYY-MM-DD`
/// - Year must fall in 2020-2030 to catch typos
///
/// The returned timestamp is midnight UTC of the given day.
pub fn date(text: &str) -> ValidationResult<Option<DateTime<Utc>>> {
    let text = text.trim();

    if text.is_empty() || text == "0" {
        return Ok(None);
    }

    let parsed = NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| {
        ValidationError::InvalidFormat {
            field: "date".to_string(),
            reason: "expected YYYY-MM-DD, e.g. 2026-12-31".to_string(),
        }
    })?;

    let year = {
        use chrono::Datelike;
        parsed.year()
    };

    if !(MIN_DATE_YEAR..=MAX_DATE_YEAR).contains(&year) {
        return Err(ValidationError::OutOfRange {
            field: "date".to_string(),
            min: MIN_DATE_YEAR as i64,
            max: MAX_DATE_YEAR as i64,
        });
    }

    let midnight = parsed.and_time(chrono::NaiveTime::MIN);

    Ok(Some(DateTime::from_naive_utc_and_offset(midnight, Utc)))
}

// =============================================================================
// Text Validators
// =============================================================================

/// Collapses runs of whitespace into single spaces and trims.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Checks a character against the name alphabet: Persian letters,
/// Latin letters, and space.
fn is_name_char(c: char) -> bool {
    c == ' ' || c.is_ascii_alphabetic() || ('\u{0600}'..='\u{06FF}').contains(&c)
}

/// Validates and normalizes a name (product, pack, person).
///
/// ## Rules
/// - Whitespace runs collapsed
/// - Length within `[min, max]` (counted in characters, not bytes)
/// - Persian or Latin letters and spaces only
pub fn name(text: &str, min: usize, max: usize) -> ValidationResult<String> {
    let cleaned = collapse_whitespace(text);

    if cleaned.is_empty() {
        return Err(ValidationError::required("name"));
    }

    let len = cleaned.chars().count();
    if len < min {
        return Err(ValidationError::TooShort {
            field: "name".to_string(),
            min,
        });
    }
    if len > max {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max,
        });
    }

    if !cleaned.chars().all(is_name_char) {
        return Err(ValidationError::InvalidFormat {
            field: "name".to_string(),
            reason: "only Persian or English letters are allowed".to_string(),
        });
    }

    Ok(cleaned)
}

/// Validates and normalizes a free-text field with length bounds only
/// (addresses, descriptions). No character-class restriction beyond
/// what [`sanitize`] applies before persistence.
pub fn text(input: &str, min: usize, max: usize) -> ValidationResult<String> {
    let cleaned = collapse_whitespace(input);

    if cleaned.is_empty() {
        return Err(ValidationError::required("text"));
    }

    let len = cleaned.chars().count();
    if len < min {
        return Err(ValidationError::TooShort {
            field: "text".to_string(),
            min,
        });
    }
    if len > max {
        return Err(ValidationError::TooLong {
            field: "text".to_string(),
            max,
        });
    }

    Ok(cleaned)
}

/// Strips HTML-like tags and control characters from free text and caps
/// its length. Applied before any free text is persisted.
///
/// ## Example
/// ```rust
/// use bazaar_core::validate::sanitize;
///
/// assert_eq!(sanitize("hello <b>world</b>"), "hello world");
/// assert_eq!(sanitize("line\u{0007}noise"), "linenoise");
/// ```
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;

    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            // Keep newlines and tabs, drop other control characters
            c if c.is_control() && c != '\n' && c != '\t' => {}
            c => out.push(c),
        }
    }

    if out.chars().count() > SANITIZE_MAX_LEN {
        out = out.chars().take(SANITIZE_MAX_LEN).collect();
    }

    out.trim().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

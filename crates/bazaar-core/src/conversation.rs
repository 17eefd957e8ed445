//! # Conversation Flows
//!
//! Per-actor finite state machines for guided multi-turn data entry.
//! One active flow per actor; each flow is a fixed linear sequence of
//! steps, each gated by a validator.
//!
//! ## Transition Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Step Transition Rule                              │
//! │                                                                         │
//! │  raw input ──► "/cancel"? ──yes──► Cancelled (discard all fields)       │
//! │                   │no                                                   │
//! │                   ▼                                                     │
//! │              validate(input)                                            │
//! │              │           │                                              │
//! │           failure     success                                           │
//! │              │           │                                              │
//! │              ▼           ▼                                              │
//! │   Retry (same step,   record field, advance                             │
//! │    nothing recorded)  │          │                                      │
//! │                     mid-flow   last step                                │
//! │                       │          │                                      │
//! │                       ▼          ▼                                      │
//! │                     Next      Commit(draft)                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each flow holds only its own typed fields; starting a new flow
//! replaces any incomplete one wholesale, so no field ever bleeds from
//! one flow into another. The commit drafts are plain data: persistence
//! is the caller's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::DiscountKind;
use crate::{validate, CANCEL_TOKEN};

/// Sentinel meaning "skip / no constraint" for optional steps, matching
/// the date validator's sentinel.
pub const SKIP_TOKEN: &str = "0";

const NAME_MIN: usize = 2;
const NAME_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 500;
const PRICE_MIN: i64 = 1_000;
const PRICE_MAX: i64 = 1_000_000_000;
const STOCK_MAX: i64 = 100_000;
const USAGE_LIMIT_MAX: i64 = 1_000_000;

// =============================================================================
// Flow Events
// =============================================================================

/// What a single step advance produced.
///
/// `Cancelled` and `Commit` terminate the flow; the session layer drops
/// it. `Retry` and `Blocked` leave the flow exactly where it was.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    /// Universal cancel token; all collected fields are discarded.
    Cancelled,
    /// Validation failed; re-enter the same step, nothing recorded.
    Retry { error: ValidationError },
    /// Field recorded, flow advanced to its next step.
    Next,
    /// Final step passed; the caller persists the draft.
    Commit(FlowCommit),
    /// Non-advancing refusal: zeroing the last remaining order item.
    /// The operator must reject the whole order instead.
    Blocked { order_id: i64 },
}

/// The typed output of a completed flow.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowCommit {
    Product(ProductDraft),
    Discount(DiscountDraft),
    ItemQuantity(QuantityDecision),
}

/// Fields collected by a completed add-product flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub price: i64,
    pub stock: i64,
    pub description: Option<String>,
    pub image_ref: Option<String>,
}

/// Fields collected by a completed create-discount flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountDraft {
    pub code: String,
    pub kind: DiscountKind,
    pub value: i64,
    pub min_purchase: i64,
    pub max_discount: Option<i64>,
    pub usage_limit: Option<i64>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

/// Outcome of the edit-item-quantity flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityDecision {
    pub order_id: i64,
    pub item_index: usize,
    /// New quantity; zero means remove the item.
    pub quantity: i64,
}

impl QuantityDecision {
    pub fn removes_item(&self) -> bool {
        self.quantity == 0
    }
}

// =============================================================================
// Flow (tagged union)
// =============================================================================

/// The active conversation flow for one actor, if any.
///
/// Stored in the per-actor session; starting a new flow overwrites an
/// incomplete one without merging.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    AddProduct(AddProductFlow),
    CreateDiscount(CreateDiscountFlow),
    EditItemQuantity(EditItemQuantityFlow),
}

impl Flow {
    /// Feeds one raw actor input into the flow.
    ///
    /// The cancel token short-circuits every step.
    pub fn advance(&mut self, input: &str) -> FlowEvent {
        if input.trim() == CANCEL_TOKEN {
            return FlowEvent::Cancelled;
        }
        match self {
            Flow::AddProduct(flow) => flow.advance(input),
            Flow::CreateDiscount(flow) => flow.advance(input),
            Flow::EditItemQuantity(flow) => flow.advance(input),
        }
    }
}

// =============================================================================
// Add Product
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddProductStep {
    Name,
    Price,
    Stock,
    Description,
    Image,
}

/// name → price → stock → description (skippable) → image (skippable).
#[derive(Debug, Clone, PartialEq)]
pub struct AddProductFlow {
    step: AddProductStep,
    name: Option<String>,
    price: Option<i64>,
    stock: Option<i64>,
    description: Option<String>,
}

impl AddProductFlow {
    pub fn new() -> Self {
        AddProductFlow {
            step: AddProductStep::Name,
            name: None,
            price: None,
            stock: None,
            description: None,
        }
    }

    pub fn step(&self) -> AddProductStep {
        self.step
    }

    fn advance(&mut self, input: &str) -> FlowEvent {
        match self.step {
            AddProductStep::Name => match validate::name(input, NAME_MIN, NAME_MAX) {
                Ok(name) => {
                    self.name = Some(name);
                    self.step = AddProductStep::Price;
                    FlowEvent::Next
                }
                Err(error) => FlowEvent::Retry { error },
            },
            AddProductStep::Price => match validate::price(input, PRICE_MIN, PRICE_MAX) {
                Ok(price) => {
                    self.price = Some(price);
                    self.step = AddProductStep::Stock;
                    FlowEvent::Next
                }
                Err(error) => FlowEvent::Retry { error },
            },
            AddProductStep::Stock => match validate::quantity(input, 0, STOCK_MAX) {
                Ok(stock) => {
                    self.stock = Some(stock);
                    self.step = AddProductStep::Description;
                    FlowEvent::Next
                }
                Err(error) => FlowEvent::Retry { error },
            },
            AddProductStep::Description => {
                if input.trim() == SKIP_TOKEN {
                    self.description = None;
                    self.step = AddProductStep::Image;
                    return FlowEvent::Next;
                }
                match validate::text(input, 1, DESCRIPTION_MAX) {
                    Ok(description) => {
                        self.description = Some(validate::sanitize(&description));
                        self.step = AddProductStep::Image;
                        FlowEvent::Next
                    }
                    Err(error) => FlowEvent::Retry { error },
                }
            }
            AddProductStep::Image => {
                // The shell passes an opaque upload token here.
                let image_ref = match input.trim() {
                    "" => {
                        return FlowEvent::Retry {
                            error: ValidationError::required("image"),
                        }
                    }
                    SKIP_TOKEN => None,
                    token => Some(token.to_string()),
                };
                FlowEvent::Commit(FlowCommit::Product(ProductDraft {
                    // All earlier steps recorded these fields.
                    name: self.name.clone().unwrap_or_default(),
                    price: self.price.unwrap_or_default(),
                    stock: self.stock.unwrap_or_default(),
                    description: self.description.clone(),
                    image_ref,
                }))
            }
        }
    }
}

impl Default for AddProductFlow {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Create Discount
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreateDiscountStep {
    Code,
    Kind,
    Value,
    MinPurchase,
    /// Percentage kind only; fixed skips straight to UsageLimit.
    MaxDiscount,
    UsageLimit,
    StartDate,
    EndDate,
}

/// code → kind → value → min-purchase → [percentage only] max-cap →
/// usage-limit → start-date → end-date.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateDiscountFlow {
    step: CreateDiscountStep,
    code: Option<String>,
    kind: Option<DiscountKind>,
    value: Option<i64>,
    min_purchase: Option<i64>,
    max_discount: Option<i64>,
    usage_limit: Option<i64>,
    starts_at: Option<DateTime<Utc>>,
}

impl CreateDiscountFlow {
    pub fn new() -> Self {
        CreateDiscountFlow {
            step: CreateDiscountStep::Code,
            code: None,
            kind: None,
            value: None,
            min_purchase: None,
            max_discount: None,
            usage_limit: None,
            starts_at: None,
        }
    }

    pub fn step(&self) -> CreateDiscountStep {
        self.step
    }

    /// The normalized code collected so far, for the caller's
    /// store-uniqueness check after the Code step passes.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Pushes the flow back to the Code step after the caller found the
    /// code already taken. Uniqueness lives in the store, so the flow
    /// itself cannot check it.
    pub fn reject_duplicate_code(&mut self) -> FlowEvent {
        let value = self.code.take().unwrap_or_default();
        self.step = CreateDiscountStep::Code;
        FlowEvent::Retry {
            error: ValidationError::Duplicate {
                field: "code".to_string(),
                value,
            },
        }
    }

    fn advance(&mut self, input: &str) -> FlowEvent {
        match self.step {
            CreateDiscountStep::Code => match validate::discount_code(input) {
                Ok(code) => {
                    self.code = Some(code);
                    self.step = CreateDiscountStep::Kind;
                    FlowEvent::Next
                }
                Err(error) => FlowEvent::Retry { error },
            },
            CreateDiscountStep::Kind => {
                match input.trim().to_ascii_lowercase().as_str() {
                    "percentage" | "percent" => {
                        self.kind = Some(DiscountKind::Percentage);
                        self.step = CreateDiscountStep::Value;
                        FlowEvent::Next
                    }
                    "fixed" => {
                        self.kind = Some(DiscountKind::Fixed);
                        self.step = CreateDiscountStep::Value;
                        FlowEvent::Next
                    }
                    _ => FlowEvent::Retry {
                        error: ValidationError::InvalidFormat {
                            field: "kind".to_string(),
                            reason: "must be 'percentage' or 'fixed'".to_string(),
                        },
                    },
                }
            }
            CreateDiscountStep::Value => {
                let result = match self.kind {
                    Some(DiscountKind::Percentage) => validate::quantity(input, 1, 100)
                        .and_then(|v| validate::percentage(v).map(|_| v)),
                    _ => validate::price(input, 1, PRICE_MAX),
                };
                match result {
                    Ok(value) => {
                        self.value = Some(value);
                        self.step = CreateDiscountStep::MinPurchase;
                        FlowEvent::Next
                    }
                    Err(error) => FlowEvent::Retry { error },
                }
            }
            CreateDiscountStep::MinPurchase => match validate::price(input, 0, PRICE_MAX) {
                Ok(min_purchase) => {
                    self.min_purchase = Some(min_purchase);
                    self.step = match self.kind {
                        Some(DiscountKind::Percentage) => CreateDiscountStep::MaxDiscount,
                        _ => CreateDiscountStep::UsageLimit,
                    };
                    FlowEvent::Next
                }
                Err(error) => FlowEvent::Retry { error },
            },
            CreateDiscountStep::MaxDiscount => {
                if input.trim() == SKIP_TOKEN {
                    self.max_discount = None;
                    self.step = CreateDiscountStep::UsageLimit;
                    return FlowEvent::Next;
                }
                match validate::price(input, 1, PRICE_MAX) {
                    Ok(cap) => {
                        self.max_discount = Some(cap);
                        self.step = CreateDiscountStep::UsageLimit;
                        FlowEvent::Next
                    }
                    Err(error) => FlowEvent::Retry { error },
                }
            }
            CreateDiscountStep::UsageLimit => {
                if input.trim() == SKIP_TOKEN {
                    self.usage_limit = None;
                    self.step = CreateDiscountStep::StartDate;
                    return FlowEvent::Next;
                }
                match validate::quantity(input, 1, USAGE_LIMIT_MAX) {
                    Ok(limit) => {
                        self.usage_limit = Some(limit);
                        self.step = CreateDiscountStep::StartDate;
                        FlowEvent::Next
                    }
                    Err(error) => FlowEvent::Retry { error },
                }
            }
            CreateDiscountStep::StartDate => match validate::date(input) {
                Ok(starts_at) => {
                    self.starts_at = starts_at;
                    self.step = CreateDiscountStep::EndDate;
                    FlowEvent::Next
                }
                Err(error) => FlowEvent::Retry { error },
            },
            CreateDiscountStep::EndDate => match validate::date(input) {
                Ok(ends_at) => {
                    if let (Some(start), Some(end)) = (self.starts_at, ends_at) {
                        if end < start {
                            return FlowEvent::Retry {
                                error: ValidationError::InvalidFormat {
                                    field: "end date".to_string(),
                                    reason: "must not be before start date".to_string(),
                                },
                            };
                        }
                    }
                    FlowEvent::Commit(FlowCommit::Discount(DiscountDraft {
                        code: self.code.clone().unwrap_or_default(),
                        kind: self.kind.unwrap_or(DiscountKind::Percentage),
                        value: self.value.unwrap_or_default(),
                        min_purchase: self.min_purchase.unwrap_or_default(),
                        max_discount: self.max_discount,
                        usage_limit: self.usage_limit,
                        starts_at: self.starts_at,
                        ends_at,
                    }))
                }
                Err(error) => FlowEvent::Retry { error },
            },
        }
    }
}

impl Default for CreateDiscountFlow {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Edit Item Quantity
// =============================================================================

/// Single-step flow: collect a new quantity for one order item.
///
/// Constructed with the order's current item count so the last-item
/// guard needs no lookup mid-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditItemQuantityFlow {
    order_id: i64,
    item_index: usize,
    item_count: usize,
}

impl EditItemQuantityFlow {
    pub fn new(order_id: i64, item_index: usize, item_count: usize) -> Self {
        EditItemQuantityFlow {
            order_id,
            item_index,
            item_count,
        }
    }

    pub fn order_id(&self) -> i64 {
        self.order_id
    }

    fn advance(&mut self, input: &str) -> FlowEvent {
        match validate::quantity(input, 0, crate::MAX_ITEM_QUANTITY) {
            Ok(0) if self.item_count <= 1 => FlowEvent::Blocked {
                order_id: self.order_id,
            },
            Ok(quantity) => FlowEvent::Commit(FlowCommit::ItemQuantity(QuantityDecision {
                order_id: self.order_id,
                item_index: self.item_index,
                quantity,
            })),
            Err(error) => FlowEvent::Retry { error },
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

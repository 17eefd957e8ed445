//! # Repository Module
//!
//! Database repository implementations for the storefront.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Service call                                                           │
//! │       │                                                                 │
//! │       │  db.products().get(42)                                          │
//! │       ▼                                                                 │
//! │  ProductRepository                                                      │
//! │  ├── get(&self, id)                                                     │
//! │  ├── insert(&self, new)                                                 │
//! │  └── decrement_stock(&self, id, qty)                                    │
//! │       │                                                                 │
//! │       │  SQL                                                            │
//! │       ▼                                                                 │
//! │  SQLite                                                                 │
//! │                                                                         │
//! │  Benefits: SQL isolated in one place, typed records constructed once    │
//! │  at this boundary, business logic never touches raw rows.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - catalog CRUD, stock, soft delete
//! - [`order::OrderRepository`] - checkout, item adjustment, status
//! - [`discount::DiscountRepository`] - discount codes, atomic redemption

pub mod discount;
pub mod order;
pub mod product;

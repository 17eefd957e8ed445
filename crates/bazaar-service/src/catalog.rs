//! # Catalog Publication
//!
//! After the add-product flow commits, the listing is pushed to the
//! sales channel and the resulting reference is stored on the product.
//! Actual delivery belongs to the chat shell; this crate only owns the
//! seam.

use bazaar_core::Product;

/// Pushes a product listing to the sales channel.
///
/// Returns an opaque publication reference (message id, listing URL)
/// when the channel accepted the listing, or `None` when publication is
/// unavailable. Publication failure never fails product creation.
pub trait CatalogPublisher: Send + Sync {
    fn publish(&self, product: &Product) -> Option<String>;
}

/// Publisher used when no sales channel is wired up.
#[derive(Debug, Default)]
pub struct NoopPublisher;

impl CatalogPublisher for NoopPublisher {
    fn publish(&self, _product: &Product) -> Option<String> {
        None
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Publisher that hands back a deterministic reference.
    #[derive(Debug, Default)]
    pub struct FakePublisher;

    impl CatalogPublisher for FakePublisher {
        fn publish(&self, product: &Product) -> Option<String> {
            Some(format!("listing:{}", product.id))
        }
    }
}

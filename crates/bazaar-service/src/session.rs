//! # Session Store
//!
//! Per-actor ephemeral state: the cart and the active conversation
//! flow. Process-lifetime only; a restart empties every session, which
//! matches the cart's "not persisted until checkout" contract.
//!
//! ## Thread Safety
//! One `Mutex` over the whole map. Sessions are touched for
//! microseconds (no I/O under the lock - callers clone state out,
//! await, then write back), and the platform serializes inbound events
//! per actor, so contention is cross-actor only.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use bazaar_core::cart::Cart;
use bazaar_core::conversation::Flow;

/// One actor's ephemeral state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub cart: Cart,
    /// Active conversation flow, if any. Starting a new flow replaces
    /// an incomplete one wholesale.
    pub flow: Option<Flow>,
}

/// All actors' sessions, keyed by actor id.
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: Mutex<HashMap<i64, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs a closure against one actor's session, creating it on first
    /// touch. The closure must not block.
    pub fn with_session<T>(&self, actor_id: i64, f: impl FnOnce(&mut Session) -> T) -> T {
        let mut sessions = self.lock();
        f(sessions.entry(actor_id).or_default())
    }

    /// Clones the actor's cart out of the store.
    pub fn cart(&self, actor_id: i64) -> Cart {
        self.with_session(actor_id, |s| s.cart.clone())
    }

    /// Takes the actor's flow out of the store, leaving `None`.
    ///
    /// The caller advances the flow without holding the lock and puts
    /// it back with [`set_flow`](Self::set_flow) unless it finished.
    pub fn take_flow(&self, actor_id: i64) -> Option<Flow> {
        self.with_session(actor_id, |s| s.flow.take())
    }

    /// Stores (or replaces) the actor's flow.
    pub fn set_flow(&self, actor_id: i64, flow: Flow) {
        self.with_session(actor_id, |s| s.flow = Some(flow));
    }

    /// Drops an actor's session entirely.
    pub fn clear(&self, actor_id: i64) {
        self.lock().remove(&actor_id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, Session>> {
        // A poisoned lock only means another thread panicked mid-write;
        // session state is per-actor and safe to keep serving.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::conversation::AddProductFlow;

    #[test]
    fn test_session_created_on_first_touch() {
        let store = SessionStore::new();
        let empty = store.cart(42);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_flow_take_and_set() {
        let store = SessionStore::new();
        assert!(store.take_flow(42).is_none());

        store.set_flow(42, Flow::AddProduct(AddProductFlow::new()));
        let flow = store.take_flow(42);
        assert!(flow.is_some());
        // take leaves None behind
        assert!(store.take_flow(42).is_none());
    }

    #[test]
    fn test_new_flow_replaces_old_silently() {
        let store = SessionStore::new();
        store.set_flow(42, Flow::AddProduct(AddProductFlow::new()));
        store.set_flow(
            42,
            Flow::CreateDiscount(bazaar_core::conversation::CreateDiscountFlow::new()),
        );

        match store.take_flow(42) {
            Some(Flow::CreateDiscount(_)) => {}
            other => panic!("expected replacement flow, got {other:?}"),
        }
    }

    #[test]
    fn test_clear_drops_everything() {
        let store = SessionStore::new();
        store.set_flow(42, Flow::AddProduct(AddProductFlow::new()));
        store.clear(42);
        assert!(store.take_flow(42).is_none());
    }
}

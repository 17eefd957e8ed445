//! Rate-limit gate shared by every service entry point.
//!
//! Thin synchronized wrapper over the core sliding-window limiter; the
//! service checks the overall window first, then the operation's named
//! window, and maps a rejection to the core error the shell renders
//! with the exact wait time.

use std::sync::{Arc, Mutex, PoisonError};

use bazaar_core::ratelimit::{RateDecision, RateLimiter};
use bazaar_core::CoreError;

use crate::config::RateRule;

#[derive(Clone)]
pub(crate) struct Gate {
    limiter: Arc<Mutex<RateLimiter>>,
    overall: RateRule,
}

impl Gate {
    pub fn new(limiter: Arc<Mutex<RateLimiter>>, overall: RateRule) -> Self {
        Gate { limiter, overall }
    }

    /// Overall window only.
    pub fn check(&self, actor_id: i64) -> Result<(), CoreError> {
        let decision = self
            .lock()
            .check(actor_id, self.overall.window(), self.overall.max_requests);
        to_result(decision)
    }

    /// Overall window, then the named action's window.
    pub fn check_action(&self, actor_id: i64, action: &str, rule: RateRule) -> Result<(), CoreError> {
        self.check(actor_id)?;
        let decision =
            self.lock()
                .check_action(actor_id, action, rule.window(), rule.max_requests);
        to_result(decision)
    }

    /// Operator override: clears every window for the actor.
    pub fn reset(&self, actor_id: i64) {
        self.lock().reset(actor_id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RateLimiter> {
        self.limiter.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn to_result(decision: RateDecision) -> Result<(), CoreError> {
    match decision {
        RateDecision::Allowed => Ok(()),
        RateDecision::Limited { retry_after_secs } => {
            Err(CoreError::RateLimited { retry_after_secs })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_maps_limit_to_core_error() {
        let gate = Gate::new(
            Arc::new(Mutex::new(RateLimiter::new())),
            RateRule::new(10, 1),
        );

        assert!(gate.check(7).is_ok());
        match gate.check(7) {
            Err(CoreError::RateLimited { retry_after_secs }) => assert!(retry_after_secs > 0),
            other => panic!("expected rate limit, got {other:?}"),
        }

        gate.reset(7);
        assert!(gate.check(7).is_ok());
    }

    #[test]
    fn test_action_window_checked_after_overall() {
        let gate = Gate::new(
            Arc::new(Mutex::new(RateLimiter::new())),
            RateRule::new(10, 100),
        );
        let rule = RateRule::new(3600, 1);

        assert!(gate.check_action(7, "order", rule).is_ok());
        assert!(gate.check_action(7, "order", rule).is_err());
        // Other actions unaffected
        assert!(gate.check_action(7, "discount", rule).is_ok());
    }
}

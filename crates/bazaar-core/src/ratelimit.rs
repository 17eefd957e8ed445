//! # Rate Limiter
//!
//! Sliding-window throttling for actor requests, process-local and
//! in-memory. A restart resets all windows; that is an accepted
//! trade-off, not a defect.
//!
//! ## Window Mechanics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Sliding Window (per key)                            │
//! │                                                                         │
//! │   timestamps:  [t1]──[t2]──[t3]──[t4]──[t5]        now                  │
//! │                  │                                  │                   │
//! │                  └── older than now - window ───────┘                   │
//! │                      dropped on every check                             │
//! │                                                                         │
//! │   remaining count >= max  →  reject, retry_after =                      │
//! │                              window - (now - oldest) + 1                │
//! │   otherwise               →  record now, accept                         │
//! │                                                                         │
//! │   Two independent window families:                                      │
//! │     overall:  keyed by actor        (capacity cap 100)                  │
//! │     action:   keyed by actor+name   (capacity cap 50)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

// Capacity caps keep a hammering actor from growing a window without
// bound between checks.
const OVERALL_CAPACITY: usize = 100;
const ACTION_CAPACITY: usize = 50;

// =============================================================================
// Decision
// =============================================================================

/// Outcome of a rate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    /// Rejected; retry after the reported number of seconds.
    Limited { retry_after_secs: u64 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed)
    }
}

// =============================================================================
// Rate Limiter
// =============================================================================

/// Per-actor sliding windows, overall and per named action.
///
/// Not internally synchronized: the owner wraps it in a `Mutex` if it is
/// shared, matching how the session layer holds per-actor state.
#[derive(Debug, Default)]
pub struct RateLimiter {
    overall: HashMap<i64, VecDeque<Instant>>,
    actions: HashMap<(i64, String), VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks the actor's overall window; records the hit when allowed.
    pub fn check(&mut self, actor_id: i64, window: Duration, max_requests: usize) -> RateDecision {
        self.check_at(actor_id, window, max_requests, Instant::now())
    }

    /// [`check`](Self::check) with an explicit clock, for deterministic tests.
    pub fn check_at(
        &mut self,
        actor_id: i64,
        window: Duration,
        max_requests: usize,
        now: Instant,
    ) -> RateDecision {
        let timestamps = self.overall.entry(actor_id).or_default();
        decide(timestamps, window, max_requests, OVERALL_CAPACITY, now)
    }

    /// Checks the actor's window for one named action (e.g. "order" at
    /// 3 per hour); records the hit when allowed.
    pub fn check_action(
        &mut self,
        actor_id: i64,
        action: &str,
        window: Duration,
        max_requests: usize,
    ) -> RateDecision {
        self.check_action_at(actor_id, action, window, max_requests, Instant::now())
    }

    pub fn check_action_at(
        &mut self,
        actor_id: i64,
        action: &str,
        window: Duration,
        max_requests: usize,
        now: Instant,
    ) -> RateDecision {
        let timestamps = self
            .actions
            .entry((actor_id, action.to_string()))
            .or_default();
        decide(timestamps, window, max_requests, ACTION_CAPACITY, now)
    }

    /// Clears all windows for one actor (operator override).
    pub fn reset(&mut self, actor_id: i64) {
        self.overall.remove(&actor_id);
        self.actions.retain(|(id, _), _| *id != actor_id);
    }
}

/// Core sliding-window decision, shared by both window families.
fn decide(
    timestamps: &mut VecDeque<Instant>,
    window: Duration,
    max_requests: usize,
    capacity: usize,
    now: Instant,
) -> RateDecision {
    while let Some(oldest) = timestamps.front() {
        if now.duration_since(*oldest) > window {
            timestamps.pop_front();
        } else {
            break;
        }
    }

    if timestamps.len() >= max_requests {
        let retry_after_secs = match timestamps.front() {
            Some(oldest) => {
                let elapsed = now.duration_since(*oldest);
                // +1 rounds the partial second up so the reported wait
                // is never an underestimate.
                window.as_secs().saturating_sub(elapsed.as_secs()) + 1
            }
            None => 1,
        };
        return RateDecision::Limited { retry_after_secs };
    }

    if timestamps.len() >= capacity {
        timestamps.pop_front();
    }
    timestamps.push_back(now);
    RateDecision::Allowed
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(10);

    #[test]
    fn test_allows_up_to_max_then_limits() {
        let mut limiter = RateLimiter::new();
        let t0 = Instant::now();

        for i in 0..3 {
            let decision = limiter.check_at(7, WINDOW, 3, t0 + Duration::from_secs(i));
            assert!(decision.is_allowed(), "request {i} should pass");
        }

        let decision = limiter.check_at(7, WINDOW, 3, t0 + Duration::from_secs(3));
        assert_eq!(
            decision,
            RateDecision::Limited {
                retry_after_secs: 8
            }
        );
    }

    #[test]
    fn test_window_slides() {
        let mut limiter = RateLimiter::new();
        let t0 = Instant::now();

        for _ in 0..3 {
            assert!(limiter.check_at(7, WINDOW, 3, t0).is_allowed());
        }
        assert!(!limiter.check_at(7, WINDOW, 3, t0).is_allowed());

        // All three timestamps age out after the window passes
        let later = t0 + Duration::from_secs(11);
        assert!(limiter.check_at(7, WINDOW, 3, later).is_allowed());
    }

    #[test]
    fn test_retry_after_counts_from_oldest() {
        let mut limiter = RateLimiter::new();
        let t0 = Instant::now();

        assert!(limiter.check_at(7, WINDOW, 2, t0).is_allowed());
        assert!(limiter
            .check_at(7, WINDOW, 2, t0 + Duration::from_secs(4))
            .is_allowed());

        // Oldest is 6s old: 10 - 6 + 1 = 5
        let decision = limiter.check_at(7, WINDOW, 2, t0 + Duration::from_secs(6));
        assert_eq!(
            decision,
            RateDecision::Limited {
                retry_after_secs: 5
            }
        );
    }

    #[test]
    fn test_actors_are_isolated() {
        let mut limiter = RateLimiter::new();
        let t0 = Instant::now();

        assert!(limiter.check_at(1, WINDOW, 1, t0).is_allowed());
        assert!(!limiter.check_at(1, WINDOW, 1, t0).is_allowed());
        // A different actor has a fresh window
        assert!(limiter.check_at(2, WINDOW, 1, t0).is_allowed());
    }

    #[test]
    fn test_action_windows_independent_of_overall() {
        let mut limiter = RateLimiter::new();
        let t0 = Instant::now();

        assert!(limiter.check_at(7, WINDOW, 1, t0).is_allowed());
        assert!(!limiter.check_at(7, WINDOW, 1, t0).is_allowed());

        // Named action has its own window for the same actor
        assert!(limiter
            .check_action_at(7, "order", WINDOW, 1, t0)
            .is_allowed());
        assert!(!limiter
            .check_action_at(7, "order", WINDOW, 1, t0)
            .is_allowed());
        // And different actions do not share
        assert!(limiter
            .check_action_at(7, "discount", WINDOW, 1, t0)
            .is_allowed());
    }

    #[test]
    fn test_reset_clears_all_windows_for_actor() {
        let mut limiter = RateLimiter::new();
        let t0 = Instant::now();

        assert!(limiter.check_at(7, WINDOW, 1, t0).is_allowed());
        assert!(limiter
            .check_action_at(7, "order", WINDOW, 1, t0)
            .is_allowed());
        assert!(!limiter.check_at(7, WINDOW, 1, t0).is_allowed());

        limiter.reset(7);
        assert!(limiter.check_at(7, WINDOW, 1, t0).is_allowed());
        assert!(limiter
            .check_action_at(7, "order", WINDOW, 1, t0)
            .is_allowed());

        // Other actors untouched
        assert!(limiter.check_at(8, WINDOW, 1, t0).is_allowed());
    }

    #[test]
    fn test_capacity_cap_bounds_memory() {
        let mut limiter = RateLimiter::new();
        let t0 = Instant::now();

        // Max above capacity: the deque never grows past the cap
        for i in 0..500u64 {
            limiter.check_at(7, Duration::from_secs(3600), 1000, t0 + Duration::from_millis(i));
        }
        assert!(limiter.overall.get(&7).map(|q| q.len()).unwrap_or(0) <= OVERALL_CAPACITY);
    }
}

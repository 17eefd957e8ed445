//! # Operator Notification
//!
//! Injected collaborator for surfacing internal failures to the
//! operator. The service constructs one notifier at process start and
//! passes it down; nothing here is a global.
//!
//! ## Throttling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Repeated failures (a dead database, a broken channel) would flood      │
//! │  the operator. Per (severity, context) key:                             │
//! │                                                                         │
//! │    Critical  →  always delivered                                        │
//! │    High      →  at most one per 120s                                    │
//! │    Medium/Low →  at most one per 300s                                   │
//! │                                                                         │
//! │  Suppressed notifications are still logged at debug level.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

/// How urgent a notification is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Minimum spacing between deliveries of the same (severity,
    /// context) pair. `None` = never throttled.
    fn min_interval(&self) -> Option<Duration> {
        match self {
            Severity::Critical => None,
            Severity::High => Some(Duration::from_secs(120)),
            Severity::Medium | Severity::Low => Some(Duration::from_secs(300)),
        }
    }
}

/// Delivery interface for operator notifications.
///
/// The chat shell implements this against its transport; tests and the
/// default wiring use [`TracingNotifier`].
pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, context: &str, message: &str);
}

/// Notifier that writes to the tracing log.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, severity: Severity, context: &str, message: &str) {
        match severity {
            Severity::Critical | Severity::High => {
                error!(?severity, context, message, "operator notification")
            }
            Severity::Medium => warn!(context, message, "operator notification"),
            Severity::Low => debug!(context, message, "operator notification"),
        }
    }
}

/// Wraps any notifier with per-(severity, context) throttling.
pub struct ThrottledNotifier<N> {
    inner: N,
    last_sent: Mutex<HashMap<(Severity, String), Instant>>,
}

impl<N: Notifier> ThrottledNotifier<N> {
    pub fn new(inner: N) -> Self {
        ThrottledNotifier {
            inner,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    fn should_send(&self, severity: Severity, context: &str, now: Instant) -> bool {
        let Some(interval) = severity.min_interval() else {
            return true;
        };

        let mut last_sent = self
            .last_sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let key = (severity, context.to_string());
        match last_sent.get(&key) {
            Some(last) if now.duration_since(*last) < interval => false,
            _ => {
                last_sent.insert(key, now);
                true
            }
        }
    }
}

impl<N: Notifier> Notifier for ThrottledNotifier<N> {
    fn notify(&self, severity: Severity, context: &str, message: &str) {
        if self.should_send(severity, context, Instant::now()) {
            self.inner.notify(severity, context, message);
        } else {
            debug!(?severity, context, "notification suppressed by throttle");
        }
    }
}

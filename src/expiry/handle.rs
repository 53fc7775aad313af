//! Cancellation handle for a scheduled expiry.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Handle to one scheduled expiry action.
///
/// Clones share the same armed flag, so stopping any clone stops the action.
#[derive(Clone, Debug)]
pub(crate) struct ExpiryHandle {
    armed: Arc<AtomicBool>,
    deadline: DateTime<Utc>,
}

impl ExpiryHandle {
    pub(crate) fn new(deadline: DateTime<Utc>) -> Self {
        Self {
            armed: Arc::new(AtomicBool::new(true)),
            deadline,
        }
    }

    /// Stop the action. Returns true if this call disarmed it, false if it
    /// was already stopped or has fired.
    pub(crate) fn stop(&self) -> bool {
        self.armed.swap(false, Ordering::AcqRel)
    }

    /// Whether the action is still waiting to fire.
    pub(crate) fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// The wall-clock time the action is scheduled for.
    pub(crate) fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    /// Whether both handles refer to the same scheduled action.
    pub(crate) fn same_action(&self, other: &ExpiryHandle) -> bool {
        Arc::ptr_eq(&self.armed, &other.armed)
    }
}

//! Timed expiry of silences.
//!
//! Every stored silence owns one [`ExpiryHandle`]. The [`ExpiryScheduler`]
//! keeps a deadline-ordered queue of armed handles on a background worker
//! and, when a deadline passes, hands the silence ID back to the owner
//! through a callback.
//!
//! # Example
//!
//! ```ignore
//! let (scheduler, worker) = ExpiryScheduler::new();
//! let thread = worker.spawn(|id, handle| println!("{id} expired"))?;
//! scheduler.attach(thread);
//!
//! let handle = scheduler.arm(SilenceId(1), Utc::now() + chrono::Duration::seconds(5));
//! // Changed our mind:
//! handle.stop();
//! ```

mod handle;
mod scheduler;

pub(crate) use handle::ExpiryHandle;
pub(crate) use scheduler::ExpiryScheduler;

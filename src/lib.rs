//! # Silence Store
//!
//! A registry of operator-created silences for an alert pipeline: rules that
//! suppress matching alert events until they expire.
//!
//! ## Core Concepts
//!
//! - **Silences**: Time-bounded rules with a creator, comment and label filters
//! - **Filters**: Label matchers; a silence covers an event when all match
//! - **Expiry**: Every silence is removed automatically at its end time
//! - **Inhibition**: Looking up whether any silence covers an event
//!
//! ## Example
//!
//! ```no_run
//! use chrono::{Duration, Utc};
//! use silencer::{Event, Silence, SilenceStore};
//!
//! let store = SilenceStore::new()?;
//!
//! let id = store.add(
//!     Silence::new("alice", Utc::now() + Duration::hours(2))
//!         .with_comment("database maintenance")
//!         .with_filter("job", "db"),
//! )?;
//!
//! let event = Event::new().with_label("job", "db");
//! assert_eq!(store.is_inhibited(&event).map(|s| s.id), Some(id));
//!
//! store.save_to_file("silences.json")?;
//! # Ok::<(), silencer::StoreError>(())
//! ```

pub mod codec;
pub mod error;
mod expiry;
pub mod filters;
pub mod store;
pub mod types;

// Re-exports
pub use codec::{decode_silences, encode_silences, WireSilence, DEFAULT_SILENCE_SECS};
pub use error::{Result, StoreError};
pub use filters::{Filter, Filters};
pub use store::{Inhibitor, SilenceStore, StoreConfig};
pub use types::*;

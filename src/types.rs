//! Core types for the silence store.

use crate::filters::{Filter, Filters};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::BuildHasher;
use std::time::Duration;

/// Unique identifier for a silence.
///
/// `SilenceId(0)` is reserved to mean "not yet assigned"; the store hands out
/// IDs starting at 1.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct SilenceId(pub u64);

impl SilenceId {
    /// The unassigned ID.
    pub const UNSET: SilenceId = SilenceId(0);

    /// Whether this is [`UNSET`](Self::UNSET).
    pub fn is_unset(self) -> bool {
        self.0 == 0
    }

    /// The following ID, or `None` once `u64::MAX` is reached.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(SilenceId)
    }
}

impl fmt::Debug for SilenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SilenceId({})", self.0)
    }
}

impl fmt::Display for SilenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A time-bounded suppression rule.
///
/// Equality covers the record content only. The expiry action that removes
/// the silence from a store lives inside the store, next to the record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "crate::codec::WireSilence", try_from = "crate::codec::WireSilence")]
pub struct Silence {
    /// Numeric ID (assigned by the store when unset).
    pub id: SilenceId,

    /// Name/email of the silence creator.
    pub created_by: String,

    /// When the silence was first created.
    pub created_at: DateTime<Utc>,

    /// When the silence expires.
    pub ends_at: DateTime<Utc>,

    /// Additional comment about the silence.
    pub comment: String,

    /// Filters that determine which events are silenced.
    pub filters: Filters,
}

impl Silence {
    /// Create a silence with no ID, no comment and no filters, created now.
    pub fn new(created_by: impl Into<String>, ends_at: DateTime<Utc>) -> Self {
        Self {
            id: SilenceId::UNSET,
            created_by: created_by.into(),
            created_at: Utc::now(),
            ends_at,
            comment: String::new(),
            filters: Filters::default(),
        }
    }

    /// Use an explicit ID.
    pub fn with_id(mut self, id: SilenceId) -> Self {
        self.id = id;
        self
    }

    /// Set the comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Override the creation time.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Append a label filter.
    pub fn with_filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter::new(name, value));
        self
    }

    /// Whether `ends_at` has already passed.
    pub fn is_expired(&self) -> bool {
        self.ends_at <= Utc::now()
    }

    /// Time left until expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        (self.ends_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Read access to the labels of an event.
///
/// This is the only view the store has of an event; anything that can
/// answer label lookups can be checked for inhibition.
pub trait LabelSet {
    /// Value of the label `name`, if present.
    fn label(&self, name: &str) -> Option<&str>;
}

impl<S: BuildHasher> LabelSet for HashMap<String, String, S> {
    fn label(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl LabelSet for BTreeMap<String, String> {
    fn label(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl<T: LabelSet + ?Sized> LabelSet for &T {
    fn label(&self, name: &str) -> Option<&str> {
        (**self).label(name)
    }
}

/// A labeled alert occurrence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub labels: BTreeMap<String, String>,
}

impl Event {
    /// An event with no labels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a label.
    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }
}

impl LabelSet for Event {
    fn label(&self, name: &str) -> Option<&str> {
        self.labels.label(name)
    }
}

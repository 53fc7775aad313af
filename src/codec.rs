//! JSON wire format for silences.
//!
//! On disk a silence is a flat record with second-precision Unix timestamps
//! and its filters flattened into a `label -> value` map:
//!
//! ```json
//! {"id":1,"createdBy":"alice","createdAtSeconds":1700000000,
//!  "endsAtSeconds":1700003600,"comment":"","filters":{"job":"db"}}
//! ```
//!
//! The flattening is lossy: two filters on the same label collapse into one
//! (the later one wins).

use crate::error::{Result, StoreError};
use crate::filters::{Filter, Filters};
use crate::types::{Silence, SilenceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Expiry applied to imported silences that carry no end time (seconds).
pub const DEFAULT_SILENCE_SECS: i64 = 60 * 60;

/// Flat external representation of a [`Silence`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireSilence {
    pub id: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub created_by: String,
    pub created_at_seconds: i64,
    pub ends_at_seconds: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub comment: String,
    #[serde(deserialize_with = "null_as_default")]
    pub filters: BTreeMap<String, String>,
}

/// A timestamp that chrono cannot represent.
#[derive(Debug, Error)]
#[error("timestamp out of range: {0} seconds")]
pub struct TimestampOutOfRange(pub i64);

impl From<Silence> for WireSilence {
    fn from(silence: Silence) -> Self {
        let filters = silence
            .filters
            .iter()
            .map(|f| (f.name.clone(), f.value.clone()))
            .collect();

        Self {
            id: silence.id.0,
            created_by: silence.created_by,
            created_at_seconds: silence.created_at.timestamp(),
            ends_at_seconds: silence.ends_at.timestamp(),
            comment: silence.comment,
            filters,
        }
    }
}

impl TryFrom<WireSilence> for Silence {
    type Error = TimestampOutOfRange;

    fn try_from(wire: WireSilence) -> std::result::Result<Self, Self::Error> {
        let now = Utc::now().timestamp();
        let created_at_seconds = match wire.created_at_seconds {
            0 => now,
            secs => secs,
        };
        let ends_at_seconds = match wire.ends_at_seconds {
            0 => now + DEFAULT_SILENCE_SECS,
            secs => secs,
        };

        let filters: Filters = wire
            .filters
            .into_iter()
            .map(|(name, value)| Filter::new(name, value))
            .collect();

        Ok(Silence {
            id: SilenceId(wire.id),
            created_by: wire.created_by,
            created_at: from_seconds(created_at_seconds)?,
            ends_at: from_seconds(ends_at_seconds)?,
            comment: wire.comment,
            filters,
        })
    }
}

fn from_seconds(secs: i64) -> std::result::Result<DateTime<Utc>, TimestampOutOfRange> {
    DateTime::from_timestamp(secs, 0).ok_or(TimestampOutOfRange(secs))
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Encode silences as a JSON array.
pub fn encode_silences(silences: &[Silence]) -> Result<Vec<u8>> {
    serde_json::to_vec(silences).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Decode a JSON array of silences.
///
/// Decoding is all-or-nothing: any malformed entry fails the whole document.
pub fn decode_silences(bytes: &[u8]) -> Result<Vec<Silence>> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Deserialization(e.to_string()))
}

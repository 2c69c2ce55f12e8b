//! Serde helpers that write `std::time::Duration` as integer milliseconds.
//!
//! Use with `#[serde(with = "forgebot_core::millis")]`, or
//! `#[serde(default, with = "forgebot_core::millis::option")]` for optional
//! durations.

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Serializes a duration as whole milliseconds, saturating at `u64::MAX`.
pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(as_millis(duration))
}

/// Deserializes a duration from whole milliseconds.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

fn as_millis(duration: &Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Optional variant of the millisecond helpers.
pub mod option {
    use super::as_millis;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serializes an optional duration as whole milliseconds.
    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match duration {
            Some(duration) => serializer.serialize_some(&as_millis(duration)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes an optional duration from whole milliseconds.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}

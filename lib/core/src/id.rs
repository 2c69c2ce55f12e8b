//! Strongly-typed keys for domain entities.
//!
//! Triggers, chains, and ceremonies are addressed by stable, human-authored
//! string keys (e.g. `daily-content-generation`, `validate_sponsor`). Each key
//! kind gets its own newtype so a chain id can never be passed where an
//! action key is expected.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing a key from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseKeyError {
    /// The type of key that failed to parse.
    pub key_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.key_type, self.reason)
    }
}

impl std::error::Error for ParseKeyError {}

/// Macro to generate a strongly-typed key wrapper around `String`.
macro_rules! define_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a key from any string-like value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the key as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the key, returning the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseKeyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(ParseKeyError {
                        key_type: stringify!($name),
                        reason: "key must not be empty".to_string(),
                    });
                }
                if trimmed.len() != s.len() {
                    return Err(ParseKeyError {
                        key_type: stringify!($name),
                        reason: format!("key '{s}' has surrounding whitespace"),
                    });
                }
                Ok(Self(s.to_string()))
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_key!(
    /// Unique, stable identifier for a timeline trigger.
    TriggerId
);

define_key!(
    /// Unique, stable identifier for a ritual chain definition.
    ChainId
);

define_key!(
    /// Identifier of a ceremony (an externally implemented action).
    ActionKey
);

//! Prefixed identifiers for exercises and exercise links
//!
//! Identifiers travel as `exercise-<uuid>` / `exerciselink-<uuid>` strings on
//! every outer surface. Parsing is lenient: anything malformed becomes the
//! empty (nil) id, which the validation pipeline rejects structurally.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! prefixed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(Uuid);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub const fn empty() -> Self {
                Self(Uuid::nil())
            }

            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_nil()
            }

            /// Parse `<prefix>-<uuid>`; returns the empty id on any mismatch.
            pub fn parse_or_empty(raw: &str) -> Self {
                raw.parse().unwrap_or_default()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", Self::PREFIX, self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let rest = s
                    .trim()
                    .strip_prefix(Self::PREFIX)
                    .and_then(|r| r.strip_prefix('-'))
                    .ok_or_else(|| IdParseError {
                        expected: Self::PREFIX,
                        raw: s.to_string(),
                    })?;
                Uuid::parse_str(rest).map(Self).map_err(|_| IdParseError {
                    expected: Self::PREFIX,
                    raw: s.to_string(),
                })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Ok(Self::parse_or_empty(&raw))
            }
        }
    };
}

prefixed_id!(
    /// Identifier of an exercise (`exercise-<uuid>`)
    ExerciseId,
    "exercise"
);

prefixed_id!(
    /// Identifier of a directed exercise link (`exerciselink-<uuid>`)
    ExerciseLinkId,
    "exerciselink"
);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {expected} id: {raw:?}")]
pub struct IdParseError {
    pub expected: &'static str,
    pub raw: String,
}

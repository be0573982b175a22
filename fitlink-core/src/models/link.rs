use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{ExerciseId, ExerciseLinkId};

/// Role a directed edge plays between two exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExerciseLinkType {
    Warmup,
    Cooldown,
    Workout,
    Alternative,
}

impl ExerciseLinkType {
    pub const ALL: [Self; 4] = [Self::Warmup, Self::Cooldown, Self::Workout, Self::Alternative];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warmup => "WARMUP",
            Self::Cooldown => "COOLDOWN",
            Self::Workout => "WORKOUT",
            Self::Alternative => "ALTERNATIVE",
        }
    }

    /// Parse a link type, accepting the legacy `Warmup`/`Cooldown` spellings.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "WARMUP" => Some(Self::Warmup),
            "COOLDOWN" => Some(Self::Cooldown),
            "WORKOUT" => Some(Self::Workout),
            "ALTERNATIVE" => Some(Self::Alternative),
            _ => None,
        }
    }

    /// The type of the edge maintained in the opposite direction, if any.
    pub const fn reverse(self) -> Option<Self> {
        match self {
            Self::Warmup | Self::Cooldown => Some(Self::Workout),
            Self::Alternative => Some(Self::Alternative),
            Self::Workout => None,
        }
    }

    /// Reverse types to search, in priority order, when deleting an edge of this type.
    pub const fn reverse_delete_candidates(self) -> &'static [Self] {
        match self {
            Self::Warmup | Self::Cooldown => &[Self::Workout],
            Self::Alternative => &[Self::Alternative],
            Self::Workout => &[Self::Warmup, Self::Cooldown],
        }
    }

    /// Warmup and cooldown edges point one way and take part in cycle checks.
    pub const fn is_directional(self) -> bool {
        matches!(self, Self::Warmup | Self::Cooldown)
    }
}

impl fmt::Display for ExerciseLinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed, typed edge between two exercises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseLink {
    pub id: ExerciseLinkId,
    pub source_exercise_id: ExerciseId,
    pub target_exercise_id: ExerciseId,
    pub link_type: ExerciseLinkType,
    pub display_order: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExerciseLink {
    /// Largest display order the store can hold (a signed 32-bit column).
    pub const MAX_DISPLAY_ORDER: u32 = i32::MAX as u32;

    /// Fresh active edge with a new id.
    pub fn new(
        source: ExerciseId,
        target: ExerciseId,
        link_type: ExerciseLinkType,
        display_order: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ExerciseLinkId::new(),
            source_exercise_id: source,
            target_exercise_id: target,
            link_type,
            display_order,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_self_link(&self) -> bool {
        self.source_exercise_id == self.target_exercise_id
    }

    /// Whether `other` is the reverse of this edge for the given type.
    pub fn is_reversed_by(&self, other: &ExerciseLink, link_type: ExerciseLinkType) -> bool {
        other.source_exercise_id == self.target_exercise_id
            && other.target_exercise_id == self.source_exercise_id
            && other.link_type == link_type
    }
}

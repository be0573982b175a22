use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::ids::ExerciseId;

/// Type tag carried by an exercise. An exercise may carry several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExerciseTypeTag {
    Workout,
    Warmup,
    Cooldown,
    Rest,
}

impl ExerciseTypeTag {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Workout => "WORKOUT",
            Self::Warmup => "WARMUP",
            Self::Cooldown => "COOLDOWN",
            Self::Rest => "REST",
        }
    }

    /// Case-insensitive parse of the stored tag names.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "WORKOUT" => Some(Self::Workout),
            "WARMUP" => Some(Self::Warmup),
            "COOLDOWN" => Some(Self::Cooldown),
            "REST" => Some(Self::Rest),
            _ => None,
        }
    }
}

impl fmt::Display for ExerciseTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the link core needs to know about an exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseSnapshot {
    pub id: ExerciseId,
    pub is_active: bool,
    pub tags: BTreeSet<ExerciseTypeTag>,
}

impl ExerciseSnapshot {
    pub fn new(id: ExerciseId, tags: impl IntoIterator<Item = ExerciseTypeTag>) -> Self {
        Self {
            id,
            is_active: true,
            tags: tags.into_iter().collect(),
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn has_tag(&self, tag: ExerciseTypeTag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn is_rest(&self) -> bool {
        self.has_tag(ExerciseTypeTag::Rest)
    }

    pub fn is_workout(&self) -> bool {
        self.has_tag(ExerciseTypeTag::Workout)
    }
}

//! Link-type compatibility matrix
//!
//! | link type   | source      | target            |
//! |-------------|-------------|-------------------|
//! | WARMUP      | not REST    | carries WORKOUT   |
//! | COOLDOWN    | not REST    | carries WORKOUT   |
//! | ALTERNATIVE | not REST    | not REST          |
//! | WORKOUT     | never created directly            |
//!
//! Empty tag sets are never compatible.

use std::collections::BTreeSet;

use crate::models::{ExerciseLinkType, ExerciseTypeTag};

pub fn is_compatible(
    source_tags: &BTreeSet<ExerciseTypeTag>,
    target_tags: &BTreeSet<ExerciseTypeTag>,
    link_type: ExerciseLinkType,
) -> bool {
    if source_tags.is_empty() || target_tags.is_empty() {
        return false;
    }

    if source_tags.contains(&ExerciseTypeTag::Rest) || target_tags.contains(&ExerciseTypeTag::Rest) {
        return false;
    }

    match link_type {
        ExerciseLinkType::Warmup | ExerciseLinkType::Cooldown => {
            target_tags.contains(&ExerciseTypeTag::Workout)
        }
        ExerciseLinkType::Alternative => true,
        ExerciseLinkType::Workout => false,
    }
}

/// Message reported when the target fails the matrix for `link_type`.
pub fn incompatibility_message(link_type: ExerciseLinkType) -> &'static str {
    match link_type {
        ExerciseLinkType::Warmup => "Warmup exercises can only be linked to workout exercises",
        ExerciseLinkType::Cooldown => "Cooldown exercises can only be linked to workout exercises",
        ExerciseLinkType::Alternative => "Alternative exercises cannot be rest exercises",
        ExerciseLinkType::Workout => {
            "WORKOUT links are created automatically and cannot be created directly"
        }
    }
}

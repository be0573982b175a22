pub mod exercise;
pub mod link;

pub use exercise::{ExerciseSnapshot, ExerciseTypeTag};
pub use link::{ExerciseLink, ExerciseLinkType};

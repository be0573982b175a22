//! Concrete implementations of the gateway traits

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::{PgExerciseLookup, PgLinkRepository};

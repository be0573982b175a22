//! Collaborator contracts consumed by the link graph core
//!
//! - `ExerciseLookup` resolves an exercise id to its active flag and type tags
//! - `LinkRepository` reads committed edges and applies `LinkWriteBatch`es as
//!   a single unit of work
//!
//! Implementations live in `crate::store` (PostgreSQL and in-memory).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{ExerciseId, ExerciseLinkId};
use crate::models::{ExerciseLink, ExerciseLinkType, ExerciseSnapshot};

#[derive(Error, Debug)]
pub enum RepositoryError {
    /// The batch would break a uniqueness or capacity invariant.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A deactivated or updated link was missing or already inactive.
    #[error("Link not found: {0}")]
    NotFound(ExerciseLinkId),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait ExerciseLookup: Send + Sync {
    /// `Ok(None)` when the exercise does not exist.
    async fn get_by_id(&self, id: ExerciseId) -> Result<Option<ExerciseSnapshot>, RepositoryError>;
}

#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Any link by id, active or not.
    async fn get_by_id(&self, id: ExerciseLinkId) -> Result<Option<ExerciseLink>, RepositoryError>;

    /// Active edges leaving `exercise_id`, ordered by type (WARMUP,
    /// COOLDOWN, WORKOUT, ALTERNATIVE), then display order, then creation.
    async fn get_outbound_edges(
        &self,
        exercise_id: ExerciseId,
    ) -> Result<Vec<ExerciseLink>, RepositoryError>;

    /// Active edges pointing at `exercise_id`, in the same order as
    /// `get_outbound_edges`.
    async fn get_inbound_edges(
        &self,
        exercise_id: ExerciseId,
    ) -> Result<Vec<ExerciseLink>, RepositoryError>;

    async fn exists_edge(
        &self,
        source: ExerciseId,
        target: ExerciseId,
        link_type: ExerciseLinkType,
    ) -> Result<bool, RepositoryError>;

    async fn count_outbound_edges(
        &self,
        source: ExerciseId,
        link_type: ExerciseLinkType,
    ) -> Result<u32, RepositoryError>;

    /// Active links grouped by `(target, link_type)`, most used first.
    async fn most_used_links(&self, count: u32) -> Result<Vec<LinkUsage>, RepositoryError>;

    /// Apply every mutation in `batch` atomically. Returns the links that were
    /// actually inserted, in batch order. Updating or deactivating a link that
    /// is missing or already inactive fails with `RepositoryError::NotFound`.
    async fn commit(&self, batch: LinkWriteBatch) -> Result<Vec<ExerciseLink>, RepositoryError>;

    async fn get_outbound_edges_by_type(
        &self,
        exercise_id: ExerciseId,
        link_type: Option<ExerciseLinkType>,
    ) -> Result<Vec<ExerciseLink>, RepositoryError> {
        let edges = self.get_outbound_edges(exercise_id).await?;
        Ok(match link_type {
            Some(t) => edges.into_iter().filter(|e| e.link_type == t).collect(),
            None => edges,
        })
    }
}

/// A representative link for a frequently used `(target, link_type)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkUsage {
    pub link: ExerciseLink,
    pub usage_count: u32,
}

/// What to do when an insert collides with an existing active edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Fail the whole batch with `RepositoryError::Conflict`.
    Reject,
    /// Leave the existing edge in place and carry on.
    Skip,
}

#[derive(Debug, Clone)]
pub struct BatchInsert {
    pub link: ExerciseLink,
    pub on_duplicate: DuplicatePolicy,
}

/// Re-checked by the repository inside the unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityGuard {
    pub source: ExerciseId,
    pub link_type: ExerciseLinkType,
    pub max: u32,
}

/// One unit of work against the link store.
#[derive(Debug, Clone, Default)]
pub struct LinkWriteBatch {
    pub inserts: Vec<BatchInsert>,
    pub updates: Vec<ExerciseLink>,
    pub deactivations: Vec<ExerciseLinkId>,
    pub guards: Vec<CapacityGuard>,
}

impl LinkWriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, link: ExerciseLink) -> Self {
        self.inserts.push(BatchInsert {
            link,
            on_duplicate: DuplicatePolicy::Reject,
        });
        self
    }

    pub fn insert_if_absent(mut self, link: ExerciseLink) -> Self {
        self.inserts.push(BatchInsert {
            link,
            on_duplicate: DuplicatePolicy::Skip,
        });
        self
    }

    pub fn update(mut self, link: ExerciseLink) -> Self {
        self.updates.push(link);
        self
    }

    pub fn deactivate(mut self, id: ExerciseLinkId) -> Self {
        self.deactivations.push(id);
        self
    }

    pub fn guard(mut self, guard: CapacityGuard) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deactivations.is_empty()
    }
}

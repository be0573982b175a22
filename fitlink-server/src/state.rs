//! Shared server state
//!
//! One `AppState` backs both the Unix socket and the HTTP API. The link
//! service is storage agnostic; `pool` is only present in PostgreSQL mode
//! and is used for health reporting.

use std::path::Path;
use std::sync::Arc;

use fitlink_core::store::{InMemoryStore, PgExerciseLookup, PgLinkRepository};
use fitlink_core::{ExerciseSnapshot, FitlinkError, LinkGraphService, LinksConfig};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub service: LinkGraphService,
    pub pool: Option<PgPool>,
    pub socket_path: String,
}

impl AppState {
    pub fn postgres(pool: PgPool, links: LinksConfig, socket_path: impl Into<String>) -> Self {
        let service = LinkGraphService::new(
            Arc::new(PgLinkRepository::new(pool.clone())),
            Arc::new(PgExerciseLookup::new(pool.clone())),
            links,
        );
        Self {
            service,
            pool: Some(pool),
            socket_path: socket_path.into(),
        }
    }

    pub fn in_memory(
        store: Arc<InMemoryStore>,
        links: LinksConfig,
        socket_path: impl Into<String>,
    ) -> Self {
        Self {
            service: LinkGraphService::new(store.clone(), store, links),
            pool: None,
            socket_path: socket_path.into(),
        }
    }

    pub fn storage_name(&self) -> &'static str {
        if self.pool.is_some() {
            "postgresql"
        } else {
            "in-memory"
        }
    }
}

/// Load exercises from a JSON array of snapshots into `store`.
pub async fn seed_exercises(store: &InMemoryStore, path: &Path) -> Result<usize, FitlinkError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let exercises: Vec<ExerciseSnapshot> = serde_json::from_str(&raw)
        .map_err(|e| FitlinkError::Other(format!("invalid seed file {}: {}", path.display(), e)))?;

    let count = exercises.len();
    for exercise in exercises {
        store.put_exercise(exercise).await;
    }
    tracing::info!(count = count, path = %path.display(), "Seeded in-memory exercises");
    Ok(count)
}

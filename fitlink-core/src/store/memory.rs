//! In-memory link store
//!
//! Implements both `ExerciseLookup` and `LinkRepository` over
//! `tokio::sync::RwLock<HashMap<..>>` collections. Every batch is applied
//! under a single write lock, which serialises concurrent creates for the
//! same source exactly like the advisory lock does in PostgreSQL.
//!
//! Used by the unit tests, the server's `--in-memory` mode and the HTTP
//! integration tests. `fail_lookups_for` injects lookup failures for a
//! given exercise.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use crate::gateway::{
    DuplicatePolicy, ExerciseLookup, LinkRepository, LinkUsage, LinkWriteBatch, RepositoryError,
};
use crate::ids::{ExerciseId, ExerciseLinkId};
use crate::models::{ExerciseLink, ExerciseLinkType, ExerciseSnapshot};

#[derive(Default)]
pub struct InMemoryStore {
    exercises: RwLock<HashMap<ExerciseId, ExerciseSnapshot>>,
    links: RwLock<HashMap<ExerciseLinkId, ExerciseLink>>,
    failing: RwLock<HashSet<ExerciseId>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_exercise(&self, exercise: ExerciseSnapshot) {
        self.exercises.write().await.insert(exercise.id, exercise);
    }

    /// Insert links as-is, without any checks.
    pub async fn seed_links(&self, links: impl IntoIterator<Item = ExerciseLink>) {
        let mut guard = self.links.write().await;
        for link in links {
            guard.insert(link.id, link);
        }
    }

    /// Make exercise lookups and outbound-edge reads for `id` fail.
    pub async fn fail_lookups_for(&self, id: ExerciseId) {
        self.failing.write().await.insert(id);
    }

    pub async fn clear_failures(&self) {
        self.failing.write().await.clear();
    }

    /// Every stored link, active or not.
    pub async fn all_links(&self) -> Vec<ExerciseLink> {
        let mut links: Vec<ExerciseLink> = self.links.read().await.values().cloned().collect();
        sort_links(&mut links);
        links
    }

    pub async fn active_links(&self) -> Vec<ExerciseLink> {
        let mut links: Vec<ExerciseLink> = self
            .links
            .read()
            .await
            .values()
            .filter(|l| l.is_active)
            .cloned()
            .collect();
        sort_links(&mut links);
        links
    }

    async fn check_available(&self, id: ExerciseId) -> Result<(), RepositoryError> {
        if self.failing.read().await.contains(&id) {
            return Err(RepositoryError::Unavailable(format!(
                "lookup failed for {}",
                id
            )));
        }
        Ok(())
    }
}

fn sort_links(links: &mut [ExerciseLink]) {
    links.sort_by(|a, b| {
        a.link_type
            .cmp(&b.link_type)
            .then(a.display_order.cmp(&b.display_order))
            .then(a.created_at.cmp(&b.created_at))
    });
}

fn is_active_match(
    link: &ExerciseLink,
    source: ExerciseId,
    target: ExerciseId,
    link_type: ExerciseLinkType,
) -> bool {
    link.is_active
        && link.source_exercise_id == source
        && link.target_exercise_id == target
        && link.link_type == link_type
}

#[async_trait]
impl ExerciseLookup for InMemoryStore {
    async fn get_by_id(&self, id: ExerciseId) -> Result<Option<ExerciseSnapshot>, RepositoryError> {
        self.check_available(id).await?;
        Ok(self.exercises.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl LinkRepository for InMemoryStore {
    async fn get_by_id(&self, id: ExerciseLinkId) -> Result<Option<ExerciseLink>, RepositoryError> {
        Ok(self.links.read().await.get(&id).cloned())
    }

    async fn get_outbound_edges(
        &self,
        exercise_id: ExerciseId,
    ) -> Result<Vec<ExerciseLink>, RepositoryError> {
        self.check_available(exercise_id).await?;
        let mut edges: Vec<ExerciseLink> = self
            .links
            .read()
            .await
            .values()
            .filter(|l| l.is_active && l.source_exercise_id == exercise_id)
            .cloned()
            .collect();
        sort_links(&mut edges);
        Ok(edges)
    }

    async fn get_inbound_edges(
        &self,
        exercise_id: ExerciseId,
    ) -> Result<Vec<ExerciseLink>, RepositoryError> {
        let mut edges: Vec<ExerciseLink> = self
            .links
            .read()
            .await
            .values()
            .filter(|l| l.is_active && l.target_exercise_id == exercise_id)
            .cloned()
            .collect();
        sort_links(&mut edges);
        Ok(edges)
    }

    async fn exists_edge(
        &self,
        source: ExerciseId,
        target: ExerciseId,
        link_type: ExerciseLinkType,
    ) -> Result<bool, RepositoryError> {
        Ok(self
            .links
            .read()
            .await
            .values()
            .any(|l| is_active_match(l, source, target, link_type)))
    }

    async fn count_outbound_edges(
        &self,
        source: ExerciseId,
        link_type: ExerciseLinkType,
    ) -> Result<u32, RepositoryError> {
        let count = self
            .links
            .read()
            .await
            .values()
            .filter(|l| l.is_active && l.source_exercise_id == source && l.link_type == link_type)
            .count();
        Ok(count as u32)
    }

    async fn most_used_links(&self, count: u32) -> Result<Vec<LinkUsage>, RepositoryError> {
        let links = self.active_links().await;

        let mut groups: HashMap<(ExerciseId, ExerciseLinkType), LinkUsage> = HashMap::new();
        for link in links {
            groups
                .entry((link.target_exercise_id, link.link_type))
                .and_modify(|u| u.usage_count += 1)
                .or_insert(LinkUsage {
                    link,
                    usage_count: 1,
                });
        }

        let mut usages: Vec<LinkUsage> = groups.into_values().collect();
        usages.sort_by(|a, b| {
            b.usage_count
                .cmp(&a.usage_count)
                .then(a.link.created_at.cmp(&b.link.created_at))
        });
        usages.truncate(count as usize);
        Ok(usages)
    }

    async fn commit(&self, batch: LinkWriteBatch) -> Result<Vec<ExerciseLink>, RepositoryError> {
        let mut links = self.links.write().await;

        // Stage against a copy so a failure leaves the store untouched.
        let mut staged = links.clone();
        let mut inserted = Vec::new();

        for id in &batch.deactivations {
            match staged.get_mut(id) {
                Some(link) if link.is_active => {
                    link.is_active = false;
                    link.updated_at = chrono::Utc::now();
                }
                _ => return Err(RepositoryError::NotFound(*id)),
            }
        }

        for update in &batch.updates {
            match staged.get(&update.id) {
                Some(link) if link.is_active => {
                    staged.insert(update.id, update.clone());
                }
                _ => return Err(RepositoryError::NotFound(update.id)),
            }
        }

        for insert in batch.inserts {
            let link = insert.link;
            let duplicate = staged.values().any(|l| {
                is_active_match(l, link.source_exercise_id, link.target_exercise_id, link.link_type)
            });
            if duplicate {
                match insert.on_duplicate {
                    DuplicatePolicy::Skip => continue,
                    DuplicatePolicy::Reject => {
                        return Err(RepositoryError::Conflict(format!(
                            "{} link from {} to {} already exists",
                            link.link_type, link.source_exercise_id, link.target_exercise_id
                        )));
                    }
                }
            }
            staged.insert(link.id, link.clone());
            inserted.push(link);
        }

        for guard in &batch.guards {
            let count = staged
                .values()
                .filter(|l| {
                    l.is_active && l.source_exercise_id == guard.source && l.link_type == guard.link_type
                })
                .count() as u32;
            if count > guard.max {
                return Err(RepositoryError::Conflict(format!(
                    "{} already has the maximum of {} {} links",
                    guard.source, guard.max, guard.link_type
                )));
            }
        }

        *links = staged;
        Ok(inserted)
    }
}

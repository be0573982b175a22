//! Link graph service
//!
//! Public entry point for every link operation. Each call runs the
//! validation pipeline, hands a validated intent to the orchestrator, and
//! returns either the resulting link(s) or a `LinkServiceError`. The service
//! holds no per-request state and is cheap to clone.

use chrono::Utc;
use std::sync::Arc;

use crate::config::LinksConfig;
use crate::error::LinkServiceError;
use crate::gateway::{ExerciseLookup, LinkRepository};
use crate::ids::{ExerciseId, ExerciseLinkId};
use crate::models::{ExerciseLink, ExerciseLinkType};
use crate::orchestrator;
use crate::validation::{self, messages, CreateLinkCommand, UpdateLinkCommand};

#[derive(Clone)]
pub struct LinkGraphService {
    links: Arc<dyn LinkRepository>,
    exercises: Arc<dyn ExerciseLookup>,
    settings: LinksConfig,
}

impl LinkGraphService {
    pub fn new(
        links: Arc<dyn LinkRepository>,
        exercises: Arc<dyn ExerciseLookup>,
        settings: LinksConfig,
    ) -> Self {
        Self {
            links,
            exercises,
            settings,
        }
    }

    pub fn settings(&self) -> &LinksConfig {
        &self.settings
    }

    pub async fn create_link(&self, cmd: CreateLinkCommand) -> Result<ExerciseLink, LinkServiceError> {
        let validated = validation::validate_create(
            &cmd,
            self.exercises.as_ref(),
            self.links.as_ref(),
            self.settings.max_links_per_type,
        )
        .await
        .inspect_err(|e| {
            tracing::debug!(
                source = %cmd.source_exercise_id,
                target = %cmd.target_exercise_id,
                link_type = %cmd.link_type,
                error = %e,
                "Create link rejected"
            );
        })?;

        orchestrator::create(
            self.links.as_ref(),
            &validated,
            self.settings.max_links_per_type,
            Utc::now(),
        )
        .await
    }

    pub async fn update_link(&self, cmd: UpdateLinkCommand) -> Result<ExerciseLink, LinkServiceError> {
        let validated = validation::validate_update(&cmd, self.links.as_ref()).await?;
        orchestrator::update(self.links.as_ref(), validated, Utc::now()).await
    }

    /// Delete a link and its reverse.
    pub async fn delete_link(
        &self,
        source: ExerciseId,
        link_id: ExerciseLinkId,
    ) -> Result<(), LinkServiceError> {
        self.delete_link_with_options(source, link_id, true).await
    }

    pub async fn delete_link_with_options(
        &self,
        source: ExerciseId,
        link_id: ExerciseLinkId,
        delete_reverse: bool,
    ) -> Result<(), LinkServiceError> {
        let link = validation::validate_delete(source, link_id, self.links.as_ref()).await?;
        orchestrator::delete(self.links.as_ref(), &link, delete_reverse).await
    }

    /// Active outbound links, optionally filtered by type.
    pub async fn get_links_for_exercise(
        &self,
        source: ExerciseId,
        link_type: Option<ExerciseLinkType>,
    ) -> Result<Vec<ExerciseLink>, LinkServiceError> {
        validation::check_exercise_id(source, messages::INVALID_SOURCE_EXERCISE_ID)?;
        Ok(self.links.get_outbound_edges_by_type(source, link_type).await?)
    }

    /// Active links pointing at `target`.
    pub async fn get_links_to_exercise(
        &self,
        target: ExerciseId,
    ) -> Result<Vec<ExerciseLink>, LinkServiceError> {
        validation::check_exercise_id(target, messages::INVALID_TARGET_EXERCISE_ID)?;
        Ok(self.links.get_inbound_edges(target).await?)
    }

    /// Active links of `link_type` with `exercise` at either end.
    pub async fn get_bidirectional_links(
        &self,
        exercise: ExerciseId,
        link_type: ExerciseLinkType,
    ) -> Result<Vec<ExerciseLink>, LinkServiceError> {
        validation::check_exercise_id(exercise, messages::INVALID_EXERCISE_ID)?;
        let mut links = self
            .links
            .get_outbound_edges_by_type(exercise, Some(link_type))
            .await?;
        links.extend(
            self.links
                .get_inbound_edges(exercise)
                .await?
                .into_iter()
                .filter(|l| l.link_type == link_type),
        );
        Ok(links)
    }

    pub async fn exists_bidirectional(
        &self,
        source: ExerciseId,
        target: ExerciseId,
        link_type: ExerciseLinkType,
    ) -> Result<bool, LinkServiceError> {
        Ok(orchestrator::exists_bidirectional(self.links.as_ref(), source, target, link_type).await?)
    }

    /// The most used links across the graph, `count` in `1..=20`.
    pub async fn get_suggested_links(
        &self,
        exercise: ExerciseId,
        count: i64,
    ) -> Result<Vec<ExerciseLink>, LinkServiceError> {
        validation::check_exercise_id(exercise, messages::INVALID_EXERCISE_ID)?;
        let count = validation::check_suggested_count(count, self.settings.suggested_limit())?;
        let usages = self.links.most_used_links(count).await?;
        Ok(usages.into_iter().map(|u| u.link).collect())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::models::{ExerciseSnapshot, ExerciseTypeTag};
    use crate::store::memory::InMemoryStore;

    async fn setup() -> (Arc<InMemoryStore>, LinkGraphService) {
        let store = Arc::new(InMemoryStore::new());
        let service = LinkGraphService::new(store.clone(), store.clone(), LinksConfig::default());
        (store, service)
    }

    async fn workout(store: &InMemoryStore) -> ExerciseId {
        let id = ExerciseId::new();
        store
            .put_exercise(ExerciseSnapshot::new(id, [ExerciseTypeTag::Workout]))
            .await;
        id
    }

    fn create(source: ExerciseId, target: ExerciseId, link_type: &str) -> CreateLinkCommand {
        CreateLinkCommand {
            source_exercise_id: source,
            target_exercise_id: target,
            link_type: link_type.to_string(),
            display_order: None,
        }
    }

    // ========================================================================
    // TEST 1: Warmup creates the authored edge and its WORKOUT reverse
    // ========================================================================

    #[tokio::test]
    async fn test_warmup_link_creates_workout_reverse() {
        let (store, service) = setup().await;
        let a = workout(&store).await;
        let b = workout(&store).await;

        let link = service.create_link(create(a, b, "WARMUP")).await.unwrap();
        assert_eq!(link.link_type, ExerciseLinkType::Warmup);
        assert_eq!(link.display_order, 1);

        let forward = service
            .get_links_for_exercise(a, Some(ExerciseLinkType::Warmup))
            .await
            .unwrap();
        assert_eq!(forward, vec![link]);

        let reverse = service.get_links_for_exercise(b, None).await.unwrap();
        assert_eq!(reverse.len(), 1);
        assert_eq!(reverse[0].link_type, ExerciseLinkType::Workout);
        assert_eq!(reverse[0].target_exercise_id, a);

        let inbound = service.get_links_to_exercise(a).await.unwrap();
        assert_eq!(inbound.len(), 1);
    }

    // ========================================================================
    // TEST 2: Self links and cycles are rejected
    // ========================================================================

    #[tokio::test]
    async fn test_self_link_rejected_without_lookups() {
        let (store, service) = setup().await;
        let a = workout(&store).await;
        store.fail_lookups_for(a).await;

        let err = service.create_link(create(a, a, "ALTERNATIVE")).await.unwrap_err();
        assert_eq!(err.errors()[0].message, messages::CANNOT_LINK_TO_SELF);
        assert!(store.all_links().await.is_empty());
    }

    #[tokio::test]
    async fn test_warmup_chain_cannot_close_cycle() {
        let (store, service) = setup().await;
        let a = workout(&store).await;
        let b = workout(&store).await;
        let c = workout(&store).await;

        service.create_link(create(a, b, "WARMUP")).await.unwrap();
        service.create_link(create(b, c, "WARMUP")).await.unwrap();
        let before = store.all_links().await.len();

        let err = service.create_link(create(c, a, "WARMUP")).await.unwrap_err();
        assert_eq!(err.errors()[0].message, messages::CIRCULAR_REFERENCE);
        assert_eq!(store.all_links().await.len(), before);
    }

    // ========================================================================
    // TEST 3: Alternative pairs and bidirectional queries
    // ========================================================================

    #[tokio::test]
    async fn test_alternative_pair_and_bidirectional_queries() {
        let (store, service) = setup().await;
        let a = workout(&store).await;
        let b = workout(&store).await;

        service.create_link(create(a, b, "alternative")).await.unwrap();

        assert!(service
            .exists_bidirectional(b, a, ExerciseLinkType::Alternative)
            .await
            .unwrap());
        let both = service
            .get_bidirectional_links(a, ExerciseLinkType::Alternative)
            .await
            .unwrap();
        assert_eq!(both.len(), 2);

        // Either side now reports the pair as a duplicate.
        let err = service.create_link(create(b, a, "ALTERNATIVE")).await.unwrap_err();
        assert!(err.has_code(ErrorCode::Conflict));
    }

    // ========================================================================
    // TEST 4: Capacity limit, sequential and concurrent
    // ========================================================================

    #[tokio::test]
    async fn test_eleventh_warmup_rejected() {
        let (store, service) = setup().await;
        let a = workout(&store).await;

        for _ in 0..10 {
            let target = workout(&store).await;
            service.create_link(create(a, target, "WARMUP")).await.unwrap();
        }
        let target = workout(&store).await;
        let err = service.create_link(create(a, target, "WARMUP")).await.unwrap_err();

        assert!(err.has_code(ErrorCode::Conflict));
        let count = service
            .get_links_for_exercise(a, Some(ExerciseLinkType::Warmup))
            .await
            .unwrap()
            .len();
        assert_eq!(count, 10);
        let last = service
            .get_links_for_exercise(a, Some(ExerciseLinkType::Warmup))
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.display_order)
            .max();
        assert_eq!(last, Some(10));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_respect_limit() {
        let (store, service) = setup().await;
        let a = workout(&store).await;
        let mut targets = Vec::new();
        for _ in 0..11 {
            targets.push(workout(&store).await);
        }

        let handles: Vec<_> = targets
            .into_iter()
            .map(|t| {
                let service = service.clone();
                tokio::spawn(async move { service.create_link(create(a, t, "COOLDOWN")).await })
            })
            .collect();

        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }

        assert_eq!(ok, 10);
        assert_eq!(
            store
                .count_outbound_edges(a, ExerciseLinkType::Cooldown)
                .await
                .unwrap(),
            10
        );
    }

    // ========================================================================
    // TEST 5: Update and delete
    // ========================================================================

    #[tokio::test]
    async fn test_update_changes_display_order_only() {
        let (store, service) = setup().await;
        let a = workout(&store).await;
        let b = workout(&store).await;
        let link = service.create_link(create(a, b, "COOLDOWN")).await.unwrap();

        let updated = service
            .update_link(UpdateLinkCommand {
                source_exercise_id: a,
                link_id: link.id,
                display_order: 7,
                is_active: true,
            })
            .await
            .unwrap();
        assert_eq!(updated.display_order, 7);
        assert_eq!(updated.link_type, ExerciseLinkType::Cooldown);
        assert_eq!(updated.target_exercise_id, b);
        assert!(updated.updated_at >= link.updated_at);

        let err = service
            .update_link(UpdateLinkCommand {
                source_exercise_id: a,
                link_id: link.id,
                display_order: -1,
                is_active: true,
            })
            .await
            .unwrap_err();
        assert_eq!(err.errors()[0].message, messages::DISPLAY_ORDER_NEGATIVE);
    }

    #[tokio::test]
    async fn test_double_delete_is_not_found() {
        let (store, service) = setup().await;
        let a = workout(&store).await;
        let b = workout(&store).await;
        let link = service.create_link(create(a, b, "WARMUP")).await.unwrap();

        service.delete_link(a, link.id).await.unwrap();
        assert!(store.active_links().await.is_empty());

        let err = service.delete_link(a, link.id).await.unwrap_err();
        assert_eq!(err.primary_code(), ErrorCode::NotFound);

        let err = service.delete_link(a, ExerciseLinkId::new()).await.unwrap_err();
        assert_eq!(err.primary_code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_deactivating_alternative_by_update_retires_pair() {
        let (store, service) = setup().await;
        let a = workout(&store).await;
        let b = workout(&store).await;
        let link = service.create_link(create(a, b, "ALTERNATIVE")).await.unwrap();

        let updated = service
            .update_link(UpdateLinkCommand {
                source_exercise_id: a,
                link_id: link.id,
                display_order: link.display_order as i64,
                is_active: false,
            })
            .await
            .unwrap();
        assert!(!updated.is_active);
        assert!(store.active_links().await.is_empty());
        assert!(!service
            .exists_bidirectional(b, a, ExerciseLinkType::Alternative)
            .await
            .unwrap());

        // Nothing is left behind to block recreating the pair.
        service.create_link(create(b, a, "ALTERNATIVE")).await.unwrap();
        assert_eq!(store.active_links().await.len(), 2);
    }

    #[tokio::test]
    async fn test_deactivating_warmup_by_update_removes_workout_reverse() {
        let (store, service) = setup().await;
        let a = workout(&store).await;
        let b = workout(&store).await;
        let link = service.create_link(create(a, b, "WARMUP")).await.unwrap();

        service
            .update_link(UpdateLinkCommand {
                source_exercise_id: a,
                link_id: link.id,
                display_order: 1,
                is_active: false,
            })
            .await
            .unwrap();
        assert!(store.active_links().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_alternative_keeps_reverse_when_asked() {
        let (store, service) = setup().await;
        let a = workout(&store).await;
        let b = workout(&store).await;
        let link = service.create_link(create(a, b, "ALTERNATIVE")).await.unwrap();

        service.delete_link_with_options(a, link.id, false).await.unwrap();
        let remaining = store.active_links().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].source_exercise_id, b);
    }

    // ========================================================================
    // TEST 6: Suggested links
    // ========================================================================

    #[tokio::test]
    async fn test_suggested_links_bounds_and_ranking() {
        let (store, service) = setup().await;
        let popular = workout(&store).await;
        for _ in 0..3 {
            let s = workout(&store).await;
            service.create_link(create(s, popular, "WARMUP")).await.unwrap();
        }
        let a = workout(&store).await;

        assert!(service.get_suggested_links(a, 0).await.is_err());
        assert!(service.get_suggested_links(a, 21).await.is_err());

        let suggested = service.get_suggested_links(a, 1).await.unwrap();
        assert_eq!(suggested.len(), 1);
        assert_eq!(suggested[0].target_exercise_id, popular);
        assert_eq!(suggested[0].link_type, ExerciseLinkType::Warmup);
    }

    #[tokio::test]
    async fn test_suggested_count_capped_at_twenty_despite_config() {
        let store = Arc::new(InMemoryStore::new());
        let settings = LinksConfig {
            suggested_max_count: 50,
            ..LinksConfig::default()
        };
        let service = LinkGraphService::new(store.clone(), store.clone(), settings);
        let a = workout(&store).await;

        assert!(service.get_suggested_links(a, 20).await.is_ok());
        let err = service.get_suggested_links(a, 21).await.unwrap_err();
        assert_eq!(err.errors()[0].message, "Count must be between 1 and 20");
    }

    // ========================================================================
    // TEST 7: Read paths name the offending identifier
    // ========================================================================

    #[tokio::test]
    async fn test_empty_ids_report_which_side() {
        let (_store, service) = setup().await;
        let empty = ExerciseId::empty();

        let err = service.get_links_for_exercise(empty, None).await.unwrap_err();
        assert_eq!(err.errors()[0].message, messages::INVALID_SOURCE_EXERCISE_ID);

        let err = service.get_links_to_exercise(empty).await.unwrap_err();
        assert_eq!(err.errors()[0].message, messages::INVALID_TARGET_EXERCISE_ID);

        let err = service
            .get_bidirectional_links(empty, ExerciseLinkType::Alternative)
            .await
            .unwrap_err();
        assert_eq!(err.errors()[0].message, messages::INVALID_EXERCISE_ID);
    }
}

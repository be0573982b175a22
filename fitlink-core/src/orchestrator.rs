//! Bidirectional link orchestration
//!
//! Turns a validated intent into the physical edges it implies:
//! - ALTERNATIVE creates both directions in one batch (all or nothing)
//! - WARMUP/COOLDOWN creates the authored edge plus the derived WORKOUT edge
//!   back from the target; the derived edge is skipped if already present
//! - deletes remove the requested edge first, then look for its reverse and
//!   remove it best effort
//!
//! A WORKOUT reverse is shared when the same pair has both a WARMUP and a
//! COOLDOWN edge, so it is only removed once neither remains.

use chrono::{DateTime, Utc};

use crate::error::LinkServiceError;
use crate::gateway::{CapacityGuard, LinkRepository, LinkWriteBatch, RepositoryError};
use crate::ids::ExerciseId;
use crate::models::{ExerciseLink, ExerciseLinkType};
use crate::validation::{ValidatedCreate, ValidatedUpdate};

/// Outcome of looking up the reverse of an edge that is being deleted.
#[derive(Debug)]
pub enum ReverseLookup {
    /// Matching reverse edges, in candidate priority order. Never empty.
    Found(Vec<ExerciseLink>),
    NotFound,
    LookupError(RepositoryError),
}

/// Whether an active link of `link_type` already relates the pair.
///
/// ALTERNATIVE checks both directions; WARMUP/COOLDOWN check the forward
/// edge and then its derived WORKOUT reverse.
pub async fn exists_bidirectional(
    links: &dyn LinkRepository,
    source: ExerciseId,
    target: ExerciseId,
    link_type: ExerciseLinkType,
) -> Result<bool, RepositoryError> {
    if link_type == ExerciseLinkType::Alternative {
        return Ok(links.exists_edge(source, target, link_type).await?
            || links.exists_edge(target, source, link_type).await?);
    }

    if links.exists_edge(source, target, link_type).await? {
        return Ok(true);
    }

    match link_type.reverse() {
        Some(reverse) => links.exists_edge(target, source, reverse).await,
        None => Ok(false),
    }
}

/// Active reverse edges of `link`, searching its candidate types in order.
pub async fn find_reverse(links: &dyn LinkRepository, link: &ExerciseLink) -> ReverseLookup {
    let edges = match links.get_outbound_edges(link.target_exercise_id).await {
        Ok(edges) => edges,
        Err(e) => return ReverseLookup::LookupError(e),
    };

    let edges: &[ExerciseLink] = &edges;
    let found: Vec<ExerciseLink> = link
        .link_type
        .reverse_delete_candidates()
        .iter()
        .flat_map(move |candidate| {
            edges
                .iter()
                .filter(move |e| e.is_active && link.is_reversed_by(e, *candidate))
                .cloned()
        })
        .collect();

    if found.is_empty() {
        ReverseLookup::NotFound
    } else {
        ReverseLookup::Found(found)
    }
}

async fn next_display_order(
    links: &dyn LinkRepository,
    source: ExerciseId,
    link_type: ExerciseLinkType,
) -> Result<u32, RepositoryError> {
    Ok(links.count_outbound_edges(source, link_type).await?.saturating_add(1))
}

/// Persist a validated create and return the primary edge.
pub async fn create(
    links: &dyn LinkRepository,
    validated: &ValidatedCreate,
    max_links_per_type: u32,
    now: DateTime<Utc>,
) -> Result<ExerciseLink, LinkServiceError> {
    let source = validated.source.id;
    let target = validated.target.id;
    let link_type = validated.link_type;

    let display_order = match validated.display_order {
        Some(order) => order,
        None => next_display_order(links, source, link_type).await?,
    };

    let primary = ExerciseLink::new(source, target, link_type, display_order, now);
    let mut batch = LinkWriteBatch::new()
        .insert(primary.clone())
        .guard(CapacityGuard {
            source,
            link_type,
            max: max_links_per_type,
        });

    match link_type.reverse() {
        Some(ExerciseLinkType::Alternative) => {
            let order = next_display_order(links, target, ExerciseLinkType::Alternative).await?;
            batch = batch
                .insert(ExerciseLink::new(
                    target,
                    source,
                    ExerciseLinkType::Alternative,
                    order,
                    now,
                ))
                .guard(CapacityGuard {
                    source: target,
                    link_type: ExerciseLinkType::Alternative,
                    max: max_links_per_type,
                });
        }
        Some(reverse) => {
            let order = next_display_order(links, target, reverse).await?;
            batch = batch.insert_if_absent(ExerciseLink::new(target, source, reverse, order, now));
        }
        None => {
            return Err(LinkServiceError::Internal(format!(
                "{} links cannot be created directly",
                link_type
            )));
        }
    }

    let inserted = links.commit(batch).await?;

    tracing::info!(
        link_id = %primary.id,
        source = %source,
        target = %target,
        link_type = %link_type,
        display_order = display_order,
        edges = inserted.len(),
        "Exercise link created"
    );

    Ok(primary)
}

/// Apply a validated update to the stored link.
///
/// Setting `is_active = false` retires the link exactly like `delete` with
/// `delete_reverse`, so paired edges never outlive their partner.
pub async fn update(
    links: &dyn LinkRepository,
    validated: ValidatedUpdate,
    now: DateTime<Utc>,
) -> Result<ExerciseLink, LinkServiceError> {
    let mut link = validated.link;
    link.display_order = validated.display_order;
    link.is_active = validated.is_active;
    link.updated_at = now;

    links.commit(LinkWriteBatch::new().update(link.clone())).await?;

    tracing::info!(
        link_id = %link.id,
        display_order = link.display_order,
        is_active = link.is_active,
        "Exercise link updated"
    );

    if !link.is_active {
        remove_reverse(links, &link).await;
    }
    Ok(link)
}

/// Soft-delete `link`, then its reverse when `delete_reverse` is set.
///
/// Only the primary deactivation can fail the call. A link that is already
/// inactive by the time the batch runs is reported as not found.
pub async fn delete(
    links: &dyn LinkRepository,
    link: &ExerciseLink,
    delete_reverse: bool,
) -> Result<(), LinkServiceError> {
    links.commit(LinkWriteBatch::new().deactivate(link.id)).await?;
    tracing::info!(
        link_id = %link.id,
        link_type = %link.link_type,
        "Exercise link deleted"
    );

    if delete_reverse {
        remove_reverse(links, link).await;
    }
    Ok(())
}

/// Best-effort removal of the reverse edge(s) of a retired `link`.
async fn remove_reverse(links: &dyn LinkRepository, link: &ExerciseLink) {
    let reverses = match find_reverse(links, link).await {
        ReverseLookup::Found(reverses) => reverses,
        ReverseLookup::NotFound => {
            tracing::debug!(
                link_id = %link.id,
                link_type = %link.link_type,
                "No reverse link found, treating as already removed"
            );
            return;
        }
        ReverseLookup::LookupError(e) => {
            tracing::warn!(
                link_id = %link.id,
                error = %e,
                "Reverse link lookup failed, leaving reverse in place"
            );
            return;
        }
    };

    if link.link_type.is_directional() && sibling_still_active(links, link).await {
        return;
    }

    for reverse in &reverses {
        match links.commit(LinkWriteBatch::new().deactivate(reverse.id)).await {
            Ok(_) => {
                tracing::info!(
                    link_id = %reverse.id,
                    link_type = %reverse.link_type,
                    primary = %link.id,
                    "Reverse exercise link deleted"
                );
            }
            Err(RepositoryError::NotFound(_)) => {
                tracing::debug!(
                    link_id = %reverse.id,
                    primary = %link.id,
                    "Reverse link already removed"
                );
            }
            Err(e) => {
                tracing::warn!(
                    link_id = %reverse.id,
                    primary = %link.id,
                    error = %e,
                    "Failed to delete reverse link"
                );
            }
        }
    }
}

/// Whether the other directional type still links the same pair, keeping
/// the shared WORKOUT reverse alive. Errors count as "still active".
async fn sibling_still_active(links: &dyn LinkRepository, link: &ExerciseLink) -> bool {
    let sibling = match link.link_type {
        ExerciseLinkType::Warmup => ExerciseLinkType::Cooldown,
        ExerciseLinkType::Cooldown => ExerciseLinkType::Warmup,
        _ => return false,
    };

    match links
        .exists_edge(link.source_exercise_id, link.target_exercise_id, sibling)
        .await
    {
        Ok(true) => {
            tracing::debug!(
                link_id = %link.id,
                sibling = %sibling,
                "Reverse WORKOUT link still backs another link, keeping it"
            );
            true
        }
        Ok(false) => false,
        Err(e) => {
            tracing::warn!(
                link_id = %link.id,
                error = %e,
                "Sibling link lookup failed, leaving reverse in place"
            );
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExerciseSnapshot, ExerciseTypeTag};
    use crate::store::memory::InMemoryStore;

    fn validated(
        source: ExerciseId,
        target: ExerciseId,
        link_type: ExerciseLinkType,
        display_order: Option<u32>,
    ) -> ValidatedCreate {
        ValidatedCreate {
            source: ExerciseSnapshot::new(source, [ExerciseTypeTag::Workout]),
            target: ExerciseSnapshot::new(target, [ExerciseTypeTag::Workout]),
            link_type,
            display_order,
        }
    }

    #[tokio::test]
    async fn test_alternative_creates_symmetric_pair() {
        let store = InMemoryStore::new();
        let (a, b) = (ExerciseId::new(), ExerciseId::new());

        let link = create(&store, &validated(a, b, ExerciseLinkType::Alternative, Some(4)), 10, Utc::now())
            .await
            .unwrap();
        assert_eq!(link.display_order, 4);

        assert!(store.exists_edge(a, b, ExerciseLinkType::Alternative).await.unwrap());
        assert!(store.exists_edge(b, a, ExerciseLinkType::Alternative).await.unwrap());
        assert!(exists_bidirectional(&store, b, a, ExerciseLinkType::Alternative).await.unwrap());
    }

    #[tokio::test]
    async fn test_warmup_creates_workout_reverse_with_appended_order() {
        let store = InMemoryStore::new();
        let (a, b, c) = (ExerciseId::new(), ExerciseId::new(), ExerciseId::new());
        store
            .seed_links([ExerciseLink::new(b, c, ExerciseLinkType::Workout, 1, Utc::now())])
            .await;

        let link = create(&store, &validated(a, b, ExerciseLinkType::Warmup, None), 10, Utc::now())
            .await
            .unwrap();
        assert_eq!(link.display_order, 1);

        let reverse = store
            .get_outbound_edges_by_type(b, Some(ExerciseLinkType::Workout))
            .await
            .unwrap();
        let back = reverse.iter().find(|l| l.target_exercise_id == a).unwrap();
        assert_eq!(back.display_order, 2);
    }

    #[tokio::test]
    async fn test_cooldown_reuses_existing_workout_reverse() {
        let store = InMemoryStore::new();
        let (a, b) = (ExerciseId::new(), ExerciseId::new());

        create(&store, &validated(a, b, ExerciseLinkType::Warmup, None), 10, Utc::now())
            .await
            .unwrap();
        create(&store, &validated(a, b, ExerciseLinkType::Cooldown, None), 10, Utc::now())
            .await
            .unwrap();

        let workouts = store
            .get_outbound_edges_by_type(b, Some(ExerciseLinkType::Workout))
            .await
            .unwrap();
        assert_eq!(workouts.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_warmup_keeps_shared_reverse() {
        let store = InMemoryStore::new();
        let (a, b) = (ExerciseId::new(), ExerciseId::new());
        let warmup = create(&store, &validated(a, b, ExerciseLinkType::Warmup, None), 10, Utc::now())
            .await
            .unwrap();
        let cooldown = create(&store, &validated(a, b, ExerciseLinkType::Cooldown, None), 10, Utc::now())
            .await
            .unwrap();

        delete(&store, &warmup, true).await.unwrap();
        assert!(store.exists_edge(b, a, ExerciseLinkType::Workout).await.unwrap());

        delete(&store, &cooldown, true).await.unwrap();
        assert!(!store.exists_edge(b, a, ExerciseLinkType::Workout).await.unwrap());
        assert!(store.active_links().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_workout_removes_authored_edge() {
        let store = InMemoryStore::new();
        let (a, b) = (ExerciseId::new(), ExerciseId::new());
        create(&store, &validated(a, b, ExerciseLinkType::Warmup, None), 10, Utc::now())
            .await
            .unwrap();

        let workout = store
            .get_outbound_edges_by_type(b, Some(ExerciseLinkType::Workout))
            .await
            .unwrap()
            .remove(0);

        delete(&store, &workout, true).await.unwrap();
        assert!(store.active_links().await.is_empty());
    }

    #[tokio::test]
    async fn test_reverse_lookup_failure_does_not_fail_delete() {
        let store = InMemoryStore::new();
        let (a, b) = (ExerciseId::new(), ExerciseId::new());
        let link = create(&store, &validated(a, b, ExerciseLinkType::Alternative, None), 10, Utc::now())
            .await
            .unwrap();
        store.fail_lookups_for(b).await;

        assert!(matches!(find_reverse(&store, &link).await, ReverseLookup::LookupError(_)));
        delete(&store, &link, true).await.unwrap();

        assert!(!store.exists_edge(a, b, ExerciseLinkType::Alternative).await.unwrap());
        assert!(store.exists_edge(b, a, ExerciseLinkType::Alternative).await.unwrap());
    }

    #[tokio::test]
    async fn test_second_delete_of_same_link_is_not_found() {
        let store = InMemoryStore::new();
        let (a, b) = (ExerciseId::new(), ExerciseId::new());
        let link = create(&store, &validated(a, b, ExerciseLinkType::Alternative, None), 10, Utc::now())
            .await
            .unwrap();

        delete(&store, &link, true).await.unwrap();
        let err = delete(&store, &link, true).await.unwrap_err();
        assert!(matches!(err, LinkServiceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_to_inactive_retires_alternative_pair() {
        let store = InMemoryStore::new();
        let (a, b) = (ExerciseId::new(), ExerciseId::new());
        let link = create(&store, &validated(a, b, ExerciseLinkType::Alternative, None), 10, Utc::now())
            .await
            .unwrap();

        let updated = update(
            &store,
            ValidatedUpdate {
                link,
                display_order: 2,
                is_active: false,
            },
            Utc::now(),
        )
        .await
        .unwrap();
        assert!(!updated.is_active);
        assert!(store.active_links().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_without_reverse_flag() {
        let store = InMemoryStore::new();
        let (a, b) = (ExerciseId::new(), ExerciseId::new());
        let link = create(&store, &validated(a, b, ExerciseLinkType::Alternative, None), 10, Utc::now())
            .await
            .unwrap();

        delete(&store, &link, false).await.unwrap();
        assert!(store.exists_edge(b, a, ExerciseLinkType::Alternative).await.unwrap());
    }
}

//! Link validation pipeline
//!
//! Checks run in a fixed order against a `ValidationResult` accumulator:
//! - structural checks (ids, self link, link type, display order) stop at the
//!   first failure, since nothing after them is meaningful without them
//! - every later check (exercise state, compatibility, duplicates, capacity,
//!   cycles) records its failure and lets the rest run, so the caller gets
//!   the full list in one response
//!
//! Collaborator failures never pass as "valid": any lookup error ends the
//! pipeline with `LinkServiceError::Internal`.

use std::fmt;

use crate::compatibility::{incompatibility_message, is_compatible};
use crate::cycle::is_acyclic_after_adding;
use crate::error::{LinkServiceError, ServiceError};
use crate::gateway::{ExerciseLookup, LinkRepository, RepositoryError};
use crate::ids::{ExerciseId, ExerciseLinkId};
use crate::models::{ExerciseLink, ExerciseLinkType, ExerciseSnapshot};
use crate::orchestrator::exists_bidirectional;

pub mod messages {
    pub const INVALID_SOURCE_EXERCISE_ID: &str = "Invalid source exercise ID";
    pub const INVALID_TARGET_EXERCISE_ID: &str = "Invalid target exercise ID";
    pub const INVALID_EXERCISE_ID: &str = "Invalid exercise ID";
    pub const INVALID_LINK_ID: &str = "Invalid exercise link ID";
    pub const CANNOT_LINK_TO_SELF: &str = "An exercise cannot be linked to itself";
    pub const LINK_TYPE_REQUIRED: &str = "Link type is required";
    pub const INVALID_LINK_TYPE: &str =
        "Link type must be one of WARMUP, COOLDOWN, WORKOUT or ALTERNATIVE";
    pub const DISPLAY_ORDER_NEGATIVE: &str = "Display order must be non-negative";
    pub const DISPLAY_ORDER_TOO_LARGE: &str = "Display order is out of range";
    pub const SOURCE_EXERCISE: &str = "Source exercise";
    pub const TARGET_EXERCISE: &str = "Target exercise";
    pub const REST_CANNOT_HAVE_LINKS: &str = "REST exercises cannot have links";
    pub const REST_CANNOT_BE_LINKED: &str = "REST exercises cannot be linked";
    pub const SOURCE_MUST_BE_WORKOUT: &str =
        "Only workout exercises can have warmup or cooldown links";
    pub const LINK_ALREADY_EXISTS: &str = "A link of this type already exists between these exercises";
    pub const CIRCULAR_REFERENCE: &str = "This link would create a circular reference";
    pub const LINK_DOES_NOT_BELONG: &str = "Link does not belong to the specified exercise";
    pub const COUNT_RANGE_PREFIX: &str = "Count must be between 1 and";
}

/// Accumulates rule violations across a validation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    errors: Vec<ServiceError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `error` unless `condition` holds. Returns `condition`.
    pub fn ensure(&mut self, condition: bool, error: impl FnOnce() -> ServiceError) -> bool {
        if !condition {
            self.errors.push(error());
        }
        condition
    }

    pub fn push(&mut self, error: ServiceError) {
        self.errors.push(error);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ServiceError] {
        &self.errors
    }

    /// `Ok(value)` when nothing was recorded, otherwise every recorded error.
    pub fn finish<T>(self, value: T) -> Result<T, LinkServiceError> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(LinkServiceError::ValidationFailed(self.errors))
        }
    }
}

fn structural(message: &str) -> LinkServiceError {
    LinkServiceError::single(ServiceError::validation(message))
}

fn lookup_failed(what: &str, id: impl fmt::Display, err: RepositoryError) -> LinkServiceError {
    tracing::error!(id = %id, error = %err, "{} lookup failed", what);
    LinkServiceError::Internal(format!("{} lookup failed for {}: {}", what, id, err))
}

/// Reject the empty id, reporting `message`.
pub fn check_exercise_id(id: ExerciseId, message: &str) -> Result<(), LinkServiceError> {
    if id.is_empty() {
        return Err(structural(message));
    }
    Ok(())
}

fn check_display_order(raw: i64) -> Result<u32, LinkServiceError> {
    if raw < 0 {
        return Err(structural(messages::DISPLAY_ORDER_NEGATIVE));
    }
    match u32::try_from(raw) {
        Ok(order) if order <= ExerciseLink::MAX_DISPLAY_ORDER => Ok(order),
        _ => Err(structural(messages::DISPLAY_ORDER_TOO_LARGE)),
    }
}

/// Count must lie in `1..=max`.
pub fn check_suggested_count(count: i64, max: u32) -> Result<u32, LinkServiceError> {
    match u32::try_from(count) {
        Ok(c) if (1..=max).contains(&c) => Ok(c),
        _ => Err(LinkServiceError::single(ServiceError::validation(format!(
            "{} {}",
            messages::COUNT_RANGE_PREFIX,
            max
        )))),
    }
}

/// Active exercise by id, `None` when missing or inactive.
async fn active_exercise(
    exercises: &dyn ExerciseLookup,
    id: ExerciseId,
) -> Result<Option<ExerciseSnapshot>, LinkServiceError> {
    let snapshot = exercises
        .get_by_id(id)
        .await
        .map_err(|e| lookup_failed("Exercise", id, e))?;
    Ok(snapshot.filter(|s| s.is_active))
}

// ============================================================================
// Create
// ============================================================================

/// Raw create request as received from an outer surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateLinkCommand {
    pub source_exercise_id: ExerciseId,
    pub target_exercise_id: ExerciseId,
    pub link_type: String,
    /// `None` lets the orchestrator append the link at the end.
    pub display_order: Option<i64>,
}

/// Structural fields of a create request after the first pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateShape {
    pub source: ExerciseId,
    pub target: ExerciseId,
    pub link_type: ExerciseLinkType,
    pub display_order: Option<u32>,
}

/// A create request that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCreate {
    pub source: ExerciseSnapshot,
    pub target: ExerciseSnapshot,
    pub link_type: ExerciseLinkType,
    pub display_order: Option<u32>,
}

pub fn check_create_shape(cmd: &CreateLinkCommand) -> Result<CreateShape, LinkServiceError> {
    if cmd.source_exercise_id.is_empty() {
        return Err(structural(messages::INVALID_SOURCE_EXERCISE_ID));
    }
    if cmd.target_exercise_id.is_empty() {
        return Err(structural(messages::INVALID_TARGET_EXERCISE_ID));
    }
    if cmd.source_exercise_id == cmd.target_exercise_id {
        return Err(structural(messages::CANNOT_LINK_TO_SELF));
    }
    if cmd.link_type.trim().is_empty() {
        return Err(structural(messages::LINK_TYPE_REQUIRED));
    }
    let link_type =
        ExerciseLinkType::parse(&cmd.link_type).ok_or_else(|| structural(messages::INVALID_LINK_TYPE))?;
    if link_type == ExerciseLinkType::Workout {
        return Err(structural(incompatibility_message(link_type)));
    }
    let display_order = cmd.display_order.map(check_display_order).transpose()?;

    Ok(CreateShape {
        source: cmd.source_exercise_id,
        target: cmd.target_exercise_id,
        link_type,
        display_order,
    })
}

/// Run the full create pipeline.
pub async fn validate_create(
    cmd: &CreateLinkCommand,
    exercises: &dyn ExerciseLookup,
    links: &dyn LinkRepository,
    max_links_per_type: u32,
) -> Result<ValidatedCreate, LinkServiceError> {
    let shape = check_create_shape(cmd)?;
    let link_type = shape.link_type;
    let mut result = ValidationResult::new();

    let source = active_exercise(exercises, shape.source).await?;
    match &source {
        None => result.push(ServiceError::not_found(messages::SOURCE_EXERCISE, shape.source)),
        Some(s) => {
            result.ensure(!s.is_rest(), || {
                ServiceError::validation(messages::REST_CANNOT_HAVE_LINKS)
            });
            if link_type.is_directional() {
                result.ensure(s.is_workout(), || {
                    ServiceError::validation(messages::SOURCE_MUST_BE_WORKOUT)
                });
            }
        }
    }

    let target = active_exercise(exercises, shape.target).await?;
    match &target {
        None => result.push(ServiceError::not_found(messages::TARGET_EXERCISE, shape.target)),
        Some(t) => {
            // REST endpoints get their own messages below and above.
            if let Some(s) = source.as_ref().filter(|s| !s.is_rest() && !t.is_rest()) {
                result.ensure(is_compatible(&s.tags, &t.tags, link_type), || {
                    ServiceError::validation(incompatibility_message(link_type))
                });
            }
            result.ensure(!t.is_rest(), || {
                ServiceError::validation(messages::REST_CANNOT_BE_LINKED)
            });
        }
    }

    let (Some(source), Some(target)) = (source, target) else {
        return Err(LinkServiceError::ValidationFailed(result.errors));
    };

    let duplicate = match link_type {
        ExerciseLinkType::Alternative => {
            exists_bidirectional(links, source.id, target.id, link_type).await
        }
        _ => links.exists_edge(source.id, target.id, link_type).await,
    }
    .map_err(|e| lookup_failed("Link", source.id, e))?;
    result.ensure(!duplicate, || {
        ServiceError::conflict(messages::LINK_ALREADY_EXISTS)
    });

    let count = links
        .count_outbound_edges(source.id, link_type)
        .await
        .map_err(|e| lookup_failed("Link count", source.id, e))?;
    result.ensure(count < max_links_per_type, || {
        ServiceError::conflict(format!(
            "Maximum number of {} links ({}) reached",
            link_type, max_links_per_type
        ))
    });

    // The mirrored ALTERNATIVE edge counts against the target's own limit.
    if link_type == ExerciseLinkType::Alternative {
        let target_count = links
            .count_outbound_edges(target.id, link_type)
            .await
            .map_err(|e| lookup_failed("Link count", target.id, e))?;
        result.ensure(target_count < max_links_per_type, || {
            ServiceError::conflict(format!(
                "Target exercise already has the maximum number of {} links ({})",
                link_type, max_links_per_type
            ))
        });
    }

    if link_type.is_directional() {
        let acyclic = is_acyclic_after_adding(links, source.id, target.id)
            .await
            .map_err(|e| lookup_failed("Cycle check", target.id, e))?;
        result.ensure(acyclic, || {
            ServiceError::validation(messages::CIRCULAR_REFERENCE)
        });
    }

    result.finish(ValidatedCreate {
        source,
        target,
        link_type,
        display_order: shape.display_order,
    })
}

// ============================================================================
// Update and delete
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateLinkCommand {
    pub source_exercise_id: ExerciseId,
    pub link_id: ExerciseLinkId,
    pub display_order: i64,
    pub is_active: bool,
}

/// The stored link plus the checked display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUpdate {
    pub link: ExerciseLink,
    pub display_order: u32,
    pub is_active: bool,
}

/// Active link `link_id` owned by `source`.
async fn owned_active_link(
    links: &dyn LinkRepository,
    source: ExerciseId,
    link_id: ExerciseLinkId,
) -> Result<ExerciseLink, LinkServiceError> {
    let link = links
        .get_by_id(link_id)
        .await
        .map_err(|e| lookup_failed("Link", link_id, e))?
        .filter(|l| l.is_active)
        .ok_or_else(|| LinkServiceError::link_not_found(link_id))?;

    if link.source_exercise_id != source {
        return Err(structural(messages::LINK_DOES_NOT_BELONG));
    }
    Ok(link)
}

pub async fn validate_update(
    cmd: &UpdateLinkCommand,
    links: &dyn LinkRepository,
) -> Result<ValidatedUpdate, LinkServiceError> {
    check_exercise_id(cmd.source_exercise_id, messages::INVALID_SOURCE_EXERCISE_ID)?;
    if cmd.link_id.is_empty() {
        return Err(structural(messages::INVALID_LINK_ID));
    }
    let display_order = check_display_order(cmd.display_order)?;

    let link = owned_active_link(links, cmd.source_exercise_id, cmd.link_id).await?;
    Ok(ValidatedUpdate {
        link,
        display_order,
        is_active: cmd.is_active,
    })
}

pub async fn validate_delete(
    source: ExerciseId,
    link_id: ExerciseLinkId,
    links: &dyn LinkRepository,
) -> Result<ExerciseLink, LinkServiceError> {
    check_exercise_id(source, messages::INVALID_SOURCE_EXERCISE_ID)?;
    if link_id.is_empty() {
        return Err(structural(messages::INVALID_LINK_ID));
    }
    owned_active_link(links, source, link_id).await
}

// ============================================================================
// TESTS
// ============================================================================

use fitlink_core::ipc::{LinkRequest, LinkResponse};
use fitlink_core::{
    CreateLinkCommand, ExerciseId, ExerciseLinkId, ExerciseLinkType, LinkServiceError,
    UpdateLinkCommand,
};
use serde::Serialize;

use crate::state::AppState;

/// Health payload shared by the IPC `health` action and `GET /health`.
pub async fn health_status(state: &AppState) -> Result<serde_json::Value, String> {
    let mut body = serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "storage": state.storage_name(),
        "socket": state.socket_path,
    });

    if let Some(pool) = &state.pool {
        let pg_ver = fitlink_core::db::health_check(pool)
            .await
            .map_err(|e| format!("DB Health Check failed: {}", e))?;
        body["postgresql"] = serde_json::json!(pg_ver);
    }

    Ok(body)
}

/// Parse an optional link type filter, rejecting unknown names.
pub fn parse_link_type_filter(
    raw: Option<&str>,
) -> Result<Option<ExerciseLinkType>, LinkServiceError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => ExerciseLinkType::parse(s).map(Some).ok_or_else(|| {
            LinkServiceError::single(fitlink_core::ServiceError::validation(
                fitlink_core::validation::messages::INVALID_LINK_TYPE,
            ))
        }),
    }
}

fn to_response<T: Serialize>(result: Result<T, LinkServiceError>) -> LinkResponse {
    match result {
        Ok(value) => match serde_json::to_value(value) {
            Ok(data) => LinkResponse::ok(data),
            Err(e) => LinkResponse::err(format!("Serialization error: {}", e)),
        },
        Err(e) => LinkResponse::from_service_error(&e),
    }
}

pub async fn handle_request(request: LinkRequest, state: &AppState) -> LinkResponse {
    let service = &state.service;

    match request {
        LinkRequest::Ping => LinkResponse::pong(),
        LinkRequest::Health => match health_status(state).await {
            Ok(body) => LinkResponse::ok(body),
            Err(e) => LinkResponse::err(e),
        },
        LinkRequest::CreateLink {
            exercise_id,
            target_exercise_id,
            link_type,
            display_order,
        } => {
            let cmd = CreateLinkCommand {
                source_exercise_id: ExerciseId::parse_or_empty(&exercise_id),
                target_exercise_id: ExerciseId::parse_or_empty(&target_exercise_id),
                link_type,
                display_order,
            };
            to_response(service.create_link(cmd).await)
        }
        LinkRequest::ListLinks {
            exercise_id,
            link_type,
        } => {
            let result = match parse_link_type_filter(link_type.as_deref()) {
                Ok(filter) => {
                    service
                        .get_links_for_exercise(ExerciseId::parse_or_empty(&exercise_id), filter)
                        .await
                }
                Err(e) => Err(e),
            };
            to_response(result)
        }
        LinkRequest::ListInbound { exercise_id } => to_response(
            service
                .get_links_to_exercise(ExerciseId::parse_or_empty(&exercise_id))
                .await,
        ),
        LinkRequest::Bidirectional {
            exercise_id,
            link_type,
        } => {
            let result = match parse_link_type_filter(Some(&link_type)) {
                Ok(Some(t)) => {
                    service
                        .get_bidirectional_links(ExerciseId::parse_or_empty(&exercise_id), t)
                        .await
                }
                Ok(None) => Err(LinkServiceError::single(
                    fitlink_core::ServiceError::validation(
                        fitlink_core::validation::messages::LINK_TYPE_REQUIRED,
                    ),
                )),
                Err(e) => Err(e),
            };
            to_response(result)
        }
        LinkRequest::Suggest { exercise_id, count } => {
            let count =
                count.unwrap_or_else(|| i64::from(service.settings().suggested_default_count));
            to_response(
                service
                    .get_suggested_links(ExerciseId::parse_or_empty(&exercise_id), count)
                    .await,
            )
        }
        LinkRequest::UpdateLink {
            exercise_id,
            link_id,
            display_order,
            is_active,
        } => {
            let cmd = UpdateLinkCommand {
                source_exercise_id: ExerciseId::parse_or_empty(&exercise_id),
                link_id: ExerciseLinkId::parse_or_empty(&link_id),
                display_order,
                is_active,
            };
            to_response(service.update_link(cmd).await)
        }
        LinkRequest::DeleteLink {
            exercise_id,
            link_id,
            delete_reverse,
        } => {
            let result = service
                .delete_link_with_options(
                    ExerciseId::parse_or_empty(&exercise_id),
                    ExerciseLinkId::parse_or_empty(&link_id),
                    delete_reverse,
                )
                .await
                .map(|()| serde_json::json!({ "deleted": true, "id": link_id }));
            to_response(result)
        }
    }
}

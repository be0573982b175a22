//! Fitlink HTTP REST API
//!
//! Axum-based HTTP server exposing the exercise link graph. Runs alongside
//! the Unix socket IPC server on port 8780 (configurable).
//!
//! Each endpoint has a thin axum handler that delegates to an inner function
//! returning `(StatusCode, serde_json::Value)`; the inner functions are
//! tested directly without axum dispatch.
//!
//! Endpoints:
//! - GET    /health
//! - GET    /version
//! - POST   /api/exercises/:exercise_id/links                      201 / 400
//! - GET    /api/exercises/:exercise_id/links?linkType=            200 / 400
//! - GET    /api/exercises/:exercise_id/links/suggested?count=     200 / 400
//! - PUT    /api/exercises/:exercise_id/links/:link_id             200 / 400 / 404
//! - DELETE /api/exercises/:exercise_id/links/:link_id?deleteReverse=  204 / 400 / 404
//!
//! Failures always carry `{ "errors": [{ "code", "message" }] }`.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use fitlink_core::{
    CreateLinkCommand, ExerciseId, ExerciseLinkId, LinkGraphService, LinkServiceError,
    UpdateLinkCommand,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::router::{health_status, parse_link_type_filter};
use crate::state::AppState;

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route(
            "/api/exercises/:exercise_id/links",
            get(list_links_handler).post(create_link_handler),
        )
        .route(
            "/api/exercises/:exercise_id/links/suggested",
            get(suggested_links_handler),
        )
        .route(
            "/api/exercises/:exercise_id/links/:link_id",
            put(update_link_handler).delete(delete_link_handler),
        )
        .with_state(state)
}

/// Start the HTTP server on `host:port`.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<AppState>,
    host: &str,
    port: u16,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", host, port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Fitlink HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkRequest {
    #[serde(default)]
    pub target_exercise_id: String,
    #[serde(default)]
    pub link_type: String,
    pub display_order: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLinkRequest {
    pub display_order: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListLinksQuery {
    pub link_type: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SuggestedQuery {
    pub count: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeleteLinkQuery {
    pub delete_reverse: Option<bool>,
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

/// Map a service failure to its status code and `{ "errors": [...] }` body.
pub fn error_response(err: &LinkServiceError) -> (StatusCode, serde_json::Value) {
    let status = match err {
        LinkServiceError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
        LinkServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
        LinkServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, serde_json::json!({ "errors": err.errors() }))
}

fn json_or_500<T: serde::Serialize>(status: StatusCode, value: &T) -> (StatusCode, serde_json::Value) {
    match serde_json::to_value(value) {
        Ok(body) => (status, body),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "errors": [{ "code": "internal", "message": e.to_string() }] }),
        ),
    }
}

pub async fn health_inner(state: &AppState) -> (StatusCode, serde_json::Value) {
    match health_status(state).await {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": e,
            }),
        ),
    }
}

/// Pure, no IO.
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "fitlink/1",
    })
}

pub async fn create_link_inner(
    service: &LinkGraphService,
    exercise_id: &str,
    req: CreateLinkRequest,
) -> (StatusCode, serde_json::Value) {
    let cmd = CreateLinkCommand {
        source_exercise_id: ExerciseId::parse_or_empty(exercise_id),
        target_exercise_id: ExerciseId::parse_or_empty(&req.target_exercise_id),
        link_type: req.link_type,
        display_order: req.display_order,
    };

    match service.create_link(cmd).await {
        Ok(link) => json_or_500(StatusCode::CREATED, &link),
        Err(e) => error_response(&e),
    }
}

pub async fn list_links_inner(
    service: &LinkGraphService,
    exercise_id: &str,
    query: ListLinksQuery,
) -> (StatusCode, serde_json::Value) {
    let filter = match parse_link_type_filter(query.link_type.as_deref()) {
        Ok(f) => f,
        Err(e) => return error_response(&e),
    };
    let id = ExerciseId::parse_or_empty(exercise_id);

    match service.get_links_for_exercise(id, filter).await {
        Ok(links) => (
            StatusCode::OK,
            serde_json::json!({
                "exerciseId": id,
                "links": links,
                "totalCount": links.len(),
            }),
        ),
        Err(e) => error_response(&e),
    }
}

pub async fn suggested_links_inner(
    service: &LinkGraphService,
    exercise_id: &str,
    query: SuggestedQuery,
) -> (StatusCode, serde_json::Value) {
    let count = query
        .count
        .unwrap_or_else(|| i64::from(service.settings().suggested_default_count));

    match service
        .get_suggested_links(ExerciseId::parse_or_empty(exercise_id), count)
        .await
    {
        Ok(links) => json_or_500(StatusCode::OK, &links),
        Err(e) => error_response(&e),
    }
}

pub async fn update_link_inner(
    service: &LinkGraphService,
    exercise_id: &str,
    link_id: &str,
    req: UpdateLinkRequest,
) -> (StatusCode, serde_json::Value) {
    let cmd = UpdateLinkCommand {
        source_exercise_id: ExerciseId::parse_or_empty(exercise_id),
        link_id: ExerciseLinkId::parse_or_empty(link_id),
        display_order: req.display_order,
        is_active: req.is_active,
    };

    match service.update_link(cmd).await {
        Ok(link) => json_or_500(StatusCode::OK, &link),
        Err(e) => error_response(&e),
    }
}

/// 204 carries an empty JSON object; the handler drops the body.
pub async fn delete_link_inner(
    service: &LinkGraphService,
    exercise_id: &str,
    link_id: &str,
    query: DeleteLinkQuery,
) -> (StatusCode, serde_json::Value) {
    match service
        .delete_link_with_options(
            ExerciseId::parse_or_empty(exercise_id),
            ExerciseLinkId::parse_or_empty(link_id),
            query.delete_reverse.unwrap_or(true),
        )
        .await
    {
        Ok(()) => (StatusCode::NO_CONTENT, serde_json::json!({})),
        Err(e) => error_response(&e),
    }
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn create_link_handler(
    State(state): State<Arc<AppState>>,
    Path(exercise_id): Path<String>,
    Json(req): Json<CreateLinkRequest>,
) -> impl IntoResponse {
    let (status, body) = create_link_inner(&state.service, &exercise_id, req).await;
    (status, Json(body))
}

pub async fn list_links_handler(
    State(state): State<Arc<AppState>>,
    Path(exercise_id): Path<String>,
    Query(query): Query<ListLinksQuery>,
) -> impl IntoResponse {
    let (status, body) = list_links_inner(&state.service, &exercise_id, query).await;
    (status, Json(body))
}

pub async fn suggested_links_handler(
    State(state): State<Arc<AppState>>,
    Path(exercise_id): Path<String>,
    Query(query): Query<SuggestedQuery>,
) -> impl IntoResponse {
    let (status, body) = suggested_links_inner(&state.service, &exercise_id, query).await;
    (status, Json(body))
}

pub async fn update_link_handler(
    State(state): State<Arc<AppState>>,
    Path((exercise_id, link_id)): Path<(String, String)>,
    Json(req): Json<UpdateLinkRequest>,
) -> impl IntoResponse {
    let (status, body) = update_link_inner(&state.service, &exercise_id, &link_id, req).await;
    (status, Json(body))
}

pub async fn delete_link_handler(
    State(state): State<Arc<AppState>>,
    Path((exercise_id, link_id)): Path<(String, String)>,
    Query(query): Query<DeleteLinkQuery>,
) -> axum::response::Response {
    let (status, body) = delete_link_inner(&state.service, &exercise_id, &link_id, query).await;
    if status == StatusCode::NO_CONTENT {
        status.into_response()
    } else {
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================

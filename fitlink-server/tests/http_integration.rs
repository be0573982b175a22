//! HTTP integration tests for the exercise link API
//!
//! Full axum dispatch through `oneshot` against the in-memory store, so these
//! run without PostgreSQL. Covers routing, path/query extraction, status
//! codes and JSON shapes.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use fitlink_core::store::InMemoryStore;
use fitlink_core::{ExerciseId, ExerciseSnapshot, ExerciseTypeTag, LinksConfig};
use fitlink_server::http::build_router;
use fitlink_server::state::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct Fixture {
    state: Arc<AppState>,
    store: Arc<InMemoryStore>,
}

impl Fixture {
    async fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let state = Arc::new(AppState::in_memory(
            store.clone(),
            LinksConfig::default(),
            "/tmp/fitlink-http-test.sock",
        ));
        Self { state, store }
    }

    async fn exercise(&self, tags: &[ExerciseTypeTag]) -> ExerciseId {
        let id = ExerciseId::new();
        self.store
            .put_exercise(ExerciseSnapshot::new(id, tags.iter().copied()))
            .await;
        id
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let resp = build_router(self.state.clone()).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}

fn links_uri(exercise: ExerciseId) -> String {
    format!("/api/exercises/{}/links", exercise)
}

// ===========================================================================
// TEST 1: GET /health and /version
// ===========================================================================
#[tokio::test]
async fn test_health_and_version() {
    let fx = Fixture::new().await;

    let (status, body) = fx.send("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "in-memory");

    let (status, body) = fx.send("GET", "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["protocol"], "fitlink/1");
}

// ===========================================================================
// TEST 2: POST warmup → 201, reverse WORKOUT link visible on the target
// ===========================================================================
#[tokio::test]
async fn test_create_warmup_and_list_both_sides() {
    let fx = Fixture::new().await;
    let a = fx.exercise(&[ExerciseTypeTag::Workout]).await;
    let b = fx.exercise(&[ExerciseTypeTag::Workout, ExerciseTypeTag::Warmup]).await;

    let (status, created) = fx
        .send(
            "POST",
            &links_uri(a),
            Some(json!({ "targetExerciseId": b.to_string(), "linkType": "WARMUP" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "body: {}", created);
    assert_eq!(created["displayOrder"], 1);
    assert!(created["id"].as_str().unwrap().starts_with("exerciselink-"));

    let (status, listed) = fx.send("GET", &links_uri(a), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["totalCount"], 1);
    assert_eq!(listed["exerciseId"], a.to_string());

    let (_, reverse) = fx
        .send("GET", &format!("{}?linkType=WORKOUT", links_uri(b)), None)
        .await;
    assert_eq!(reverse["totalCount"], 1);
    assert_eq!(reverse["links"][0]["targetExerciseId"], a.to_string());
}

// ===========================================================================
// TEST 3: validation failures → 400 with an errors array
// ===========================================================================
#[tokio::test]
async fn test_create_rejections() {
    let fx = Fixture::new().await;
    let a = fx.exercise(&[ExerciseTypeTag::Workout]).await;
    let rest = fx.exercise(&[ExerciseTypeTag::Rest]).await;

    // Self link
    let (status, body) = fx
        .send(
            "POST",
            &links_uri(a),
            Some(json!({ "targetExerciseId": a.to_string(), "linkType": "ALTERNATIVE" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["code"], "validation");

    // Direct WORKOUT link
    let (status, _) = fx
        .send(
            "POST",
            &links_uri(a),
            Some(json!({ "targetExerciseId": rest.to_string(), "linkType": "WORKOUT" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // REST target
    let (status, body) = fx
        .send(
            "POST",
            &links_uri(a),
            Some(json!({ "targetExerciseId": rest.to_string(), "linkType": "ALTERNATIVE" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!body["errors"].as_array().unwrap().is_empty());

    // Malformed source id in the path
    let (status, _) = fx
        .send(
            "POST",
            "/api/exercises/not-an-id/links",
            Some(json!({ "targetExerciseId": a.to_string(), "linkType": "ALTERNATIVE" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(fx.store.all_links().await.is_empty());
}

// ===========================================================================
// TEST 4: PUT updates display order; DELETE → 204 then 404
// ===========================================================================
#[tokio::test]
async fn test_update_then_delete_twice() {
    let fx = Fixture::new().await;
    let a = fx.exercise(&[ExerciseTypeTag::Workout]).await;
    let b = fx.exercise(&[ExerciseTypeTag::Workout]).await;

    let (_, created) = fx
        .send(
            "POST",
            &links_uri(a),
            Some(json!({ "targetExerciseId": b.to_string(), "linkType": "ALTERNATIVE", "displayOrder": 2 })),
        )
        .await;
    let link_id = created["id"].as_str().unwrap().to_string();
    let link_uri = format!("{}/{}", links_uri(a), link_id);

    let (status, updated) = fx
        .send("PUT", &link_uri, Some(json!({ "displayOrder": 5, "isActive": true })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["displayOrder"], 5);

    // Wrong owner
    let (status, _) = fx
        .send(
            "PUT",
            &format!("{}/{}", links_uri(b), link_id),
            Some(json!({ "displayOrder": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = fx.send("DELETE", &link_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
    assert!(fx.store.active_links().await.is_empty(), "reverse removed too");

    let (status, body) = fx.send("DELETE", &link_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errors"][0]["code"], "not_found");
}

// ===========================================================================
// TEST 5: DELETE ?deleteReverse=false keeps the mirrored alternative
// ===========================================================================
#[tokio::test]
async fn test_delete_without_reverse() {
    let fx = Fixture::new().await;
    let a = fx.exercise(&[ExerciseTypeTag::Workout]).await;
    let b = fx.exercise(&[ExerciseTypeTag::Cooldown]).await;

    let (_, created) = fx
        .send(
            "POST",
            &links_uri(a),
            Some(json!({ "targetExerciseId": b.to_string(), "linkType": "ALTERNATIVE" })),
        )
        .await;
    let uri = format!(
        "{}/{}?deleteReverse=false",
        links_uri(a),
        created["id"].as_str().unwrap()
    );

    let (status, _) = fx.send("DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, remaining) = fx.send("GET", &links_uri(b), None).await;
    assert_eq!(remaining["totalCount"], 1);
}

// ===========================================================================
// TEST 6: GET suggested: default count, bounds 0 and 21 rejected
// ===========================================================================
#[tokio::test]
async fn test_suggested_links_route() {
    let fx = Fixture::new().await;
    let popular = fx.exercise(&[ExerciseTypeTag::Workout]).await;
    for _ in 0..2 {
        let s = fx.exercise(&[ExerciseTypeTag::Workout]).await;
        fx.send(
            "POST",
            &links_uri(s),
            Some(json!({ "targetExerciseId": popular.to_string(), "linkType": "COOLDOWN" })),
        )
        .await;
    }

    let (status, body) = fx
        .send("GET", &format!("{}/suggested", links_uri(popular)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let suggestions = body.as_array().unwrap();
    assert!(!suggestions.is_empty() && suggestions.len() <= 5);
    assert_eq!(suggestions[0]["targetExerciseId"], popular.to_string());

    for count in [0, 21] {
        let (status, _) = fx
            .send(
                "GET",
                &format!("{}/suggested?count={}", links_uri(popular), count),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

// ===========================================================================
// TEST 7: eleventh warmup → 400 conflict
// ===========================================================================
#[tokio::test]
async fn test_eleventh_warmup_rejected_over_http() {
    let fx = Fixture::new().await;
    let a = fx.exercise(&[ExerciseTypeTag::Workout]).await;

    for i in 0..11 {
        let t = fx.exercise(&[ExerciseTypeTag::Workout]).await;
        let (status, body) = fx
            .send(
                "POST",
                &links_uri(a),
                Some(json!({ "targetExerciseId": t.to_string(), "linkType": "WARMUP" })),
            )
            .await;
        if i < 10 {
            assert_eq!(status, StatusCode::CREATED);
        } else {
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["errors"][0]["code"], "conflict");
        }
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end coverage of the REST surface in spec §6, driven with
//! `tower::ServiceExt::oneshot` against the real router (no network
//! socket bound).

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use mission_config::MissionConfig;
use mission_daemon::{build_router, AppState};
use mission_store::connect;
use sqlx::SqlitePool;
use tower::ServiceExt;

async fn test_state() -> (AppState, tempfile::TempDir) {
    let pool: SqlitePool = connect("sqlite::memory:").await.unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let mut config = MissionConfig::default();
    config.trace_dir = tmp.path().to_string_lossy().to_string();
    (AppState::new(pool, config), tmp)
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let (state, _tmp) = test_state().await;
    let app = build_router(state);

    let resp = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn liveness_returns_alive() {
    let (state, _tmp) = test_state().await;
    let app = build_router(state);

    let resp =
        app.oneshot(Request::builder().uri("/health/liveness").body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "alive");
}

#[tokio::test]
async fn create_then_list_missions() {
    let (state, _tmp) = test_state().await;
    let app = build_router(state);

    let create_req = json_request(
        "POST",
        "/api/missions",
        serde_json::json!({"project_slug": "demo", "title": "Ship the thing"}),
    );
    let resp = app.clone().oneshot(create_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await;
    assert_eq!(created["title"], "Ship the thing");
    assert_eq!(created["status"], "pending");

    let resp = app.oneshot(Request::builder().uri("/api/missions").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let list = body_json(resp).await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["title"], "Ship the thing");
    assert_eq!(list[0]["task_group_count"], 0);
}

#[tokio::test]
async fn create_mission_rejects_blank_title() {
    let (state, _tmp) = test_state().await;
    let app = build_router(state);

    let resp = app
        .oneshot(json_request("POST", "/api/missions", serde_json::json!({"project_slug": "demo", "title": "  "})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert_eq!(json["code"], "MO-V002");
}

#[tokio::test]
async fn artifacts_on_unknown_mission_is_not_found() {
    let (state, _tmp) = test_state().await;
    let app = build_router(state);
    let missing = uuid::Uuid::new_v4();

    let resp = app
        .oneshot(Request::builder().uri(format!("/missions/{missing}/artifacts")).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let json = body_json(resp).await;
    assert_eq!(json["code"], "MO-N001");
}

#[tokio::test]
async fn run_mission_with_no_task_groups_is_rejected() {
    let (state, _tmp) = test_state().await;
    let app = build_router(state);

    let create_req = json_request("POST", "/api/missions", serde_json::json!({"project_slug": "demo", "title": "Empty"}));
    let resp = app.clone().oneshot(create_req).await.unwrap();
    let created = body_json(resp).await;
    let mission_id = created["id"].as_str().unwrap();

    let resp = app
        .oneshot(Request::builder().method("POST").uri(format!("/missions/{mission_id}/run")).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert_eq!(json["code"], "MO-C001");
}

#[tokio::test]
async fn create_artifact_with_knowledge_summary_also_creates_knowledge() {
    let (state, _tmp) = test_state().await;
    let pool = state.pool.clone();
    let app = build_router(state);

    let create_req = json_request("POST", "/api/missions", serde_json::json!({"project_slug": "demo", "title": "Artifacts"}));
    let resp = app.clone().oneshot(create_req).await.unwrap();
    let created = body_json(resp).await;
    let mission_id = created["id"].as_str().unwrap();

    let sha = "a".repeat(64);
    let artifact_req = json_request(
        "POST",
        &format!("/missions/{mission_id}/artifacts"),
        serde_json::json!({
            "type": "plan",
            "path": "plan/v1.json",
            "version": "1",
            "sha256": sha,
            "knowledge_summary": "initial plan",
        }),
    );
    let resp = app.oneshot(artifact_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let artifact = body_json(resp).await;
    assert_eq!(artifact["sha256"], sha);

    let summary: String = sqlx::query_scalar(
        "SELECT summary FROM knowledge WHERE source_artifact_id = ?",
    )
    .bind(artifact["id"].as_str().unwrap())
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(summary, "initial plan");
}

#[tokio::test]
async fn signals_crud_round_trips() {
    let (state, _tmp) = test_state().await;
    let pool = state.pool.clone();
    let app = build_router(state);

    let project = mission_store::ProjectRepo::new(&pool).ensure_project("demo").await.unwrap();

    let create_req = json_request(
        "POST",
        "/api/signals",
        serde_json::json!({
            "project_id": project.id,
            "type": "dangerous_command",
            "severity": "warning",
            "message": "rm -rf attempted",
        }),
    );
    let resp = app.clone().oneshot(create_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let signal = body_json(resp).await;
    assert_eq!(signal["status"], "pending");

    let resp = app
        .oneshot(Request::builder().uri(format!("/api/signals?project={}", project.id)).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let list = body_json(resp).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn schema_route_serves_known_kinds_and_404s_unknown() {
    let (state, _tmp) = test_state().await;
    let app = build_router(state);

    let resp = app.clone().oneshot(Request::builder().uri("/schema/mission").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.oneshot(Request::builder().uri("/schema/nonexistent").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn every_response_carries_a_request_id_header() {
    let (state, _tmp) = test_state().await;
    let app = build_router(state);

    let resp = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();

    assert!(resp.headers().contains_key("x-request-id"));
}

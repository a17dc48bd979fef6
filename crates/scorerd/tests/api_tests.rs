//! Integration tests for the scorerd HTTP API

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use scorer_lib::{
    health::{components, DEFAULT_FAILURE_THRESHOLD},
    topology::{Core, Node, Socket},
    InMemoryTelemetryStore, Metric, MetricSample, PriorityAdapter, ProfileCatalog,
    SelectorConfig, SocketSelector, StructuredLogger, TelemetryCache, Topology,
};
use scorerd::api::{create_router, tracked_health_registry, AppState};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn node(name: &str, uuid: &str) -> Node {
    Node {
        name: name.to_string(),
        uuid: uuid.to_string(),
        threads_per_core: 1,
        max_ghz: 2.0,
        l1d_cache_kb: 32,
        l1i_cache_kb: 32,
        l2_cache_kb: 256,
        l3_cache_kb: 8192,
        sockets: vec![
            Socket {
                id: 0,
                cores: (0..4).map(|id| Core { id }).collect(),
            },
            Socket {
                id: 1,
                cores: (4..8).map(|id| Core { id }).collect(),
            },
        ],
    }
}

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let topology = Arc::new(
        Topology::new(vec![node("kube-01", "uuid-1"), node("kube-02", "uuid-2")], vec![]).unwrap(),
    );
    let cache = Arc::new(TelemetryCache::new(
        Duration::from_secs(10),
        topology.socket_keys(),
    ));

    let store = Arc::new(InMemoryTelemetryStore::new());
    for socket in [0, 1] {
        store
            .push(
                "uuid-1",
                socket,
                MetricSample::new(1)
                    .with(Metric::Ipc, 1.0 + socket as f64)
                    .with(Metric::MemRead, 0.5)
                    .with(Metric::MemWrite, 0.5),
            )
            .await;
        store
            .extend(
                "uuid-1",
                socket,
                (socket * 4..socket * 4 + 4)
                    .map(|core| MetricSample::new(1).on_core(core).with(Metric::C6Res, 0.5)),
            )
            .await;
    }

    let health_registry = tracked_health_registry(DEFAULT_FAILURE_THRESHOLD).await;

    let selector = Arc::new(
        SocketSelector::new(topology, cache, store, SelectorConfig::default())
            .with_health(health_registry.clone()),
    );
    let adapter = Arc::new(PriorityAdapter::new(
        selector,
        Arc::new(ProfileCatalog::builtin()),
        StructuredLogger::new("api-test"),
    ));

    let state = Arc::new(AppState::new(health_registry, adapter));
    (create_router(state.clone()), state)
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let response = app.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health = json_body(response).await;
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_lists_only_reporting_components() {
    let (app, _state) = setup_test_app().await;

    // scoring exercises the store, which reports its outcome
    app.clone()
        .oneshot(get("/api/v1/nodes/kube-01/score"))
        .await
        .unwrap();
    let response = app.oneshot(get("/healthz")).await.unwrap();
    let health = json_body(response).await;

    let tracked = health["components"].as_object().unwrap();
    assert_eq!(tracked.len(), 1);
    assert_eq!(
        health["components"][components::TELEMETRY_STORE]["status"],
        "healthy"
    );
}

#[tokio::test]
async fn test_readyz_follows_registry() {
    let (app, state) = setup_test_app().await;

    let response = app.clone().oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    state.health_registry.set_ready(true).await;
    let response = app.oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_scorer_metrics() {
    let (app, _state) = setup_test_app().await;

    app.clone()
        .oneshot(get("/api/v1/nodes/kube-01/score"))
        .await
        .unwrap();
    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("socket_scorer_scoring_latency_seconds"));
}

#[tokio::test]
async fn test_score_node_picks_best_socket() {
    let (app, _state) = setup_test_app().await;

    let response = app.oneshot(get("/api/v1/nodes/kube-01/score")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let result = json_body(response).await;
    assert_eq!(result["node"], "kube-01");
    assert_eq!(result["socket"], 1);
    assert_eq!(result["core_count"], 4);
    assert_eq!(result["window_secs"], 20);
    assert_eq!(result["sockets"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_score_unknown_node_is_not_found() {
    let (app, _state) = setup_test_app().await;

    let response = app.oneshot(get("/api/v1/nodes/kube-42/score")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = json_body(response).await;
    assert_eq!(body["code"], "topology_not_found");
}

#[tokio::test]
async fn test_prioritize_returns_host_priorities() {
    let (app, _state) = setup_test_app().await;

    let request = post_json(
        "/api/v1/prioritize",
        serde_json::json!({
            "workload": {"name": "leslie-0", "profile": "spec-leslie"},
            "nodes": ["kube-01", "kube-02", "kube-42"]
        }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let list = json_body(response).await;
    let priorities = list["priorities"].as_array().unwrap();
    assert_eq!(priorities[0]["host"], "kube-01");
    assert_eq!(priorities[0]["socket"], 1);
    assert_eq!(priorities[0]["num_cores"], 4);

    // kube-02 has no telemetry: scored, but without a winning socket
    assert_eq!(priorities[1]["host"], "kube-02");
    assert!(priorities[1]["socket"].is_null());

    let failures = list["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["host"], "kube-42");
}

#[tokio::test]
async fn test_placement_feedback_and_cache_endpoints() {
    let (app, _state) = setup_test_app().await;

    app.clone()
        .oneshot(get("/api/v1/nodes/kube-01/score"))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/placements",
            serde_json::json!({"node": "kube-01", "socket": 0, "profile": "scikit-lasso"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.clone().oneshot(get("/api/v1/cache")).await.unwrap();
    let rows = json_body(response).await;
    let row = rows
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["node"] == "kube-01" && r["socket"] == 0)
        .unwrap()
        .clone();
    assert_eq!(row["fresh"], true);
    assert!((row["mem_read"].as_f64().unwrap() - (0.5 + 0.1753)).abs() < 1e-9);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/v1/cache")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(get("/api/v1/cache")).await.unwrap();
    let rows = json_body(response).await;
    assert!(rows.as_array().unwrap().iter().all(|r| r["fresh"] == false));
}

#[tokio::test]
async fn test_placement_with_unknown_profile_is_rejected() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/v1/placements",
            serde_json::json!({"node": "kube-01", "socket": 0, "profile": "redis"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], "unknown_profile");
}

#[tokio::test]
async fn test_idle_capacity_endpoint() {
    let (app, _state) = setup_test_app().await;

    let response = app.oneshot(get("/api/v1/nodes/kube-01/idle")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    // two sockets of four cores at 50% idle
    assert!((body["idle_core_equivalent"].as_f64().unwrap() - 4.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_profiles_endpoint_lists_catalog() {
    let (app, _state) = setup_test_app().await;

    let response = app.oneshot(get("/api/v1/profiles")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["profiles"]["spec-astar"]["duration_secs"], 468);
}

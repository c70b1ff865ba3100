mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{body_json, body_text, post_json, provision, test_state};
use janus_server::app;
use janus_types::AgentTier;
use serde_json::json;
use tower::ServiceExt;

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_counts() {
    let state = test_state();
    state
        .connections
        .register("jaguar".into(), vec!["sync".into()], None)
        .await;

    let response = app(state).oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["active_agents"], 1);
    assert_eq!(json["active_websockets"], 0);
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn health_is_idempotent() {
    let state = test_state();
    let metrics = state.metrics.clone();
    let router = app(state);

    let first = body_json(router.clone().oneshot(get("/health")).await.unwrap()).await;
    let second = body_json(router.oneshot(get("/health")).await.unwrap()).await;

    assert_eq!(first["status"], second["status"]);
    assert_eq!(first["active_agents"], second["active_agents"]);
    assert_eq!(first["active_websockets"], second["active_websockets"]);

    let snap = metrics.snapshot();
    assert_eq!(snap.messages_processed, 0);
    assert_eq!(snap.auth_failures, 0);
}

#[tokio::test]
async fn metrics_exposes_counters_as_text() {
    let state = test_state();
    let sigil = provision(&state, "jaguar", AgentTier::Tier1);
    let router = app(state);

    let ok = json!({
        "agent_id": "jaguar",
        "auth_sigil": sigil,
        "directive": "HEARTBEAT",
        "payload": {},
    });
    let bad = json!({
        "agent_id": "jaguar",
        "auth_sigil": "MW-JGN-TIER1-SNTNL-00000000000000000000:0000000000000000",
        "directive": "HEARTBEAT",
        "payload": {},
    });
    router.clone().oneshot(post_json("/invoke", &ok)).await.unwrap();
    router.clone().oneshot(post_json("/invoke", &bad)).await.unwrap();

    let response = router.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));

    let text = body_text(response).await;
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines.contains(&"neural_link_messages_processed_total 1"));
    assert!(lines.contains(&"neural_link_messages_failed_total 0"));
    assert!(lines.contains(&"neural_link_auth_failures_total 1"));
    assert!(lines.contains(&"neural_link_active_connections 0"));
    assert!(lines.contains(&"neural_link_registered_agents 0"));
}

mod common;

use async_trait::async_trait;
use axum::http::StatusCode;
use common::{body_json, post_json, provision, test_state};
use janus_server::app;
use janus_server::routing::{DirectiveHandler, RouteError, RoutedDirective};
use janus_types::AgentTier;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn envelope(agent_id: &str, sigil: &str, directive: &str) -> Value {
    json!({
        "agent_id": agent_id,
        "auth_sigil": sigil,
        "directive": directive,
        "payload": {},
    })
}

#[tokio::test]
async fn heartbeat_with_tier1_sentinel_succeeds() {
    let state = test_state();
    let sigil = provision(&state, "jaguar", AgentTier::Tier1);
    assert!(sigil.starts_with("MW-JGN-TIER1-SNTNL-"));
    let metrics = state.metrics.clone();

    let body = json!({
        "agent_id": "jaguar",
        "auth_sigil": sigil,
        "directive": "HEARTBEAT",
        "payload": {},
        "metadata": { "correlation_id": "corr-1" },
    });
    let response = app(state)
        .oneshot(post_json("/invoke", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "success");
    assert_eq!(json["message"], "Message routed successfully");
    assert_eq!(json["correlation_id"], "corr-1");
    assert!(json["timestamp"].is_string());
    assert!(json["data"]["server_time"].is_string());
    assert!(json.get("error_code").is_none());
    assert_eq!(metrics.snapshot().messages_processed, 1);
}

#[tokio::test]
async fn unknown_directive_is_rejected() {
    let state = test_state();
    let sigil = provision(&state, "jaguar", AgentTier::Tier1);

    let response = app(state)
        .oneshot(post_json("/invoke", &envelope("jaguar", &sigil, "FOO_BAR")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["status"], "error");
    assert_eq!(json["error_code"], "INVALID_DIRECTIVE");
    assert_eq!(json["message"], "Unknown directive: FOO_BAR");
}

#[tokio::test]
async fn tier3_cannot_issue_tier1_directive() {
    let state = test_state();
    let sigil = provision(&state, "worker", AgentTier::Tier3);

    let response = app(state)
        .oneshot(post_json(
            "/invoke",
            &envelope("worker", &sigil, "EMERGENCY_SHUTDOWN"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["error_code"], "PERMISSION_DENIED");
    assert_eq!(json["message"], "Insufficient permissions. Required: TIER1");
}

#[tokio::test]
async fn tier2_can_issue_tier2_and_tier3_directives() {
    let state = test_state();
    let sigil = provision(&state, "steward", AgentTier::Tier2);

    for directive in ["SYNC_MEMORY", "QUERY_MEMORY"] {
        let response = app(state.clone())
            .oneshot(post_json("/invoke", &envelope("steward", &sigil, directive)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{directive}");
        let json = body_json(response).await;
        assert_eq!(json["data"]["routed_to"], "handler");
    }
}

#[tokio::test]
async fn tampered_sigil_fails_authentication() {
    let state = test_state();
    let sigil = provision(&state, "jaguar", AgentTier::Tier1);
    let metrics = state.metrics.clone();

    let mut tampered = sigil.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == '0' { '1' } else { '0' });

    let response = app(state)
        .oneshot(post_json("/invoke", &envelope("jaguar", &tampered, "HEARTBEAT")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error_code"], "AUTH_FAILED");
    assert_eq!(metrics.snapshot().auth_failures, 1);
    assert_eq!(metrics.snapshot().messages_processed, 0);
}

#[tokio::test]
async fn sigil_of_another_agent_fails_authentication() {
    let state = test_state();
    let sigil = provision(&state, "jaguar", AgentTier::Tier1);
    provision(&state, "impostor", AgentTier::Tier3);

    let response = app(state)
        .oneshot(post_json("/invoke", &envelope("impostor", &sigil, "HEARTBEAT")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_agent_fails_authentication() {
    let state = test_state();
    let sigil = provision(&state, "jaguar", AgentTier::Tier1);

    let response = app(state)
        .oneshot(post_json("/invoke", &envelope("nobody", &sigil, "HEARTBEAT")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error_code"], "AUTH_FAILED");
}

#[tokio::test]
async fn malformed_sigil_counts_as_auth_failure() {
    let state = test_state();
    provision(&state, "jaguar", AgentTier::Tier1);
    let metrics = state.metrics.clone();

    let response = app(state)
        .oneshot(post_json("/invoke", &envelope("jaguar", "MW-JGN", "HEARTBEAT")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(metrics.snapshot().auth_failures, 1);
}

#[tokio::test]
async fn invalid_json_is_rejected() {
    let state = test_state();
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/invoke")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();

    let response = app(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error_code"], "INVALID_JSON");
}

#[tokio::test]
async fn missing_fields_are_rejected() {
    let state = test_state();
    let sigil = provision(&state, "jaguar", AgentTier::Tier1);

    let body = json!({
        "agent_id": "jaguar",
        "auth_sigil": sigil,
        "directive": "HEARTBEAT",
    });
    let response = app(state.clone())
        .oneshot(post_json("/invoke", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error_code"], "MISSING_FIELDS");

    let response = app(state)
        .oneshot(post_json("/invoke", &envelope("", &sigil, "HEARTBEAT")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error_code"], "MISSING_FIELDS");
}

#[tokio::test]
async fn lower_case_directive_is_invalid() {
    let state = test_state();
    let sigil = provision(&state, "jaguar", AgentTier::Tier1);

    let response = app(state)
        .oneshot(post_json("/invoke", &envelope("jaguar", &sigil, "heartbeat")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error_code"], "INVALID_DIRECTIVE");
}

#[tokio::test]
async fn query_capability_reports_tier_permissions() {
    let state = test_state();
    let sigil = provision(&state, "jaguar", AgentTier::Tier1);

    let response = app(state)
        .oneshot(post_json(
            "/invoke",
            &envelope("jaguar", &sigil, "QUERY_CAPABILITY"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["tier"], "TIER1");
    assert_eq!(json["data"]["directives"].as_array().unwrap().len(), 13);
}

struct Failing;

#[async_trait]
impl DirectiveHandler for Failing {
    async fn handle(&self, _request: RoutedDirective<'_>) -> Result<Value, RouteError> {
        Err(RouteError::Handler("memory store offline".to_string()))
    }
}

#[tokio::test]
async fn handler_failure_is_internal_error() {
    let state = test_state().with_handler(Arc::new(Failing));
    let sigil = provision(&state, "jaguar", AgentTier::Tier1);
    let metrics = state.metrics.clone();

    let response = app(state)
        .oneshot(post_json("/invoke", &envelope("jaguar", &sigil, "SYNC_MEMORY")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error_code"], "INTERNAL_ERROR");

    let snap = metrics.snapshot();
    assert_eq!(snap.messages_failed, 1);
    assert_eq!(snap.messages_processed, 0);
}

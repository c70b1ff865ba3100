#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response},
};
use janus_server::{app, AppState};
use janus_sigil::{AgentSecretStore, SigilAuthenticator};
use janus_types::{AgentPrefix, AgentRole, AgentTier, SigilType};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub const MASTER_SECRET: &str = "5ec7e75ec7e75ec7e75ec7e75ec7e75ec7e75ec7e75ec7e75ec7e75ec7e75ec7";

/// A bridge state with a fixed master secret and an empty secret store.
pub fn test_state() -> AppState {
    AppState::new(
        Arc::new(SigilAuthenticator::new(MASTER_SECRET)),
        AgentSecretStore::new(),
    )
}

/// Provisions `agent_id` with an `MW-JGN-<tier>-SNTNL` sigil and returns it.
pub fn provision(state: &AppState, agent_id: &str, tier: AgentTier) -> String {
    provision_as(state, agent_id, AgentPrefix::Microwave, AgentRole::Juggernaut, tier)
}

pub fn provision_as(
    state: &AppState,
    agent_id: &str,
    prefix: AgentPrefix,
    role: AgentRole,
    tier: AgentTier,
) -> String {
    state
        .secrets
        .provision(
            &state.authenticator,
            agent_id,
            prefix,
            role,
            tier,
            SigilType::Sentinel,
        )
        .sigil
}

/// Serves the bridge on an ephemeral port and returns its address.
pub async fn spawn_server(state: AppState) -> SocketAddr {
    let app = app(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    addr
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

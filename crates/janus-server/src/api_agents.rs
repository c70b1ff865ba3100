//! Agent registration, discovery and sigil rotation.

use crate::api::{parse_json_body, ApiError};
use crate::connections::AgentConnection;
use crate::middleware::AgentContext;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Extension, Json},
};
use janus_protocol::NeuralResponse;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Request body for agent registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub agent_id: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    pub endpoint: Option<String>,
}

/// Response body for successful registration.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub status: String,
    pub message: String,
    pub agent_id: String,
}

/// Response body for agent discovery.
#[derive(Debug, Serialize)]
pub struct DiscoverResponse {
    pub status: String,
    pub agents: Vec<AgentConnection>,
    pub count: usize,
}

/// Request body for sigil rotation.
#[derive(Debug, Deserialize)]
pub struct RotateRequest {
    pub agent_id: String,
    pub auth_sigil: String,
}

/// Handler for `POST /agents/register`.
///
/// Requires authentication; an agent may only register itself.
pub async fn register_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<AgentContext>,
    body: Bytes,
) -> Result<Json<RegisterResponse>, ApiError> {
    let request: RegisterRequest = parse_json_body(&body)?;
    let agent_id = request
        .agent_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::MissingFields("agent_id required".to_string()))?;

    if agent_id != caller.agent_id {
        tracing::warn!(
            caller = %caller.agent_id,
            agent_id = %agent_id,
            "rejected registration on behalf of another agent"
        );
        return Err(ApiError::PermissionDenied(
            "Agents may only register themselves".to_string(),
        ));
    }

    state
        .connections
        .register(agent_id.clone(), request.capabilities, request.endpoint)
        .await;
    tracing::info!(agent_id = %agent_id, tier = %caller.sigil.tier, "agent registered");

    Ok(Json(RegisterResponse {
        status: "success".to_string(),
        message: "Agent registered".to_string(),
        agent_id,
    }))
}

/// Handler for `GET /agents/discover`.
pub async fn discover_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(_caller): Extension<AgentContext>,
) -> Json<DiscoverResponse> {
    let agents = state.connections.list().await;
    Json(DiscoverResponse {
        status: "success".to_string(),
        count: agents.len(),
        agents,
    })
}

/// Handler for `POST /sigils/rotate`.
///
/// Re-issues the caller's sigil with a fresh token. The agent secret is
/// unchanged, so the response carries only the new sigil.
pub async fn rotate_sigil_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<NeuralResponse>, ApiError> {
    let request: RotateRequest = parse_json_body(&body)?;

    let rotated = state
        .secrets
        .get(&request.agent_id)
        .and_then(|secret| state.authenticator.rotate(&request.auth_sigil, &secret));
    let Some(rotated) = rotated else {
        state.metrics.record_auth_failure();
        tracing::warn!(agent_id = %request.agent_id, "sigil rotation rejected");
        return Err(ApiError::AuthFailed("Authentication failed".to_string()));
    };

    tracing::info!(agent_id = %request.agent_id, "sigil rotated");
    Ok(Json(
        NeuralResponse::success("Sigil rotated").with_data(json!({ "sigil": rotated.sigil })),
    ))
}

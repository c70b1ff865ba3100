use crate::api::ApiError;
use crate::AppState;
use axum::{body::Body, http::Request, middleware::Next, response::Response};
use janus_sigil::Sigil;
use std::sync::Arc;

/// Header carrying the caller's agent id on authenticated routes.
pub const AGENT_ID_HEADER: &str = "X-Janus-Agent-Id";

/// Header carrying the caller's sigil on authenticated routes.
pub const SIGIL_HEADER: &str = "X-Janus-Sigil";

/// Authenticated caller, stored in request extensions.
#[derive(Clone, Debug)]
pub struct AgentContext {
    pub agent_id: String,
    pub sigil: Sigil,
}

/// Verifies `sigil` with the secret the bridge holds for `agent_id`.
///
/// Unknown agents and bad sigils are indistinguishable to the caller; both
/// count as auth failures.
pub fn authenticate_agent(state: &AppState, agent_id: &str, sigil: &str) -> Result<Sigil, ApiError> {
    let Some(secret) = state.secrets.get(agent_id) else {
        state.metrics.record_auth_failure();
        tracing::warn!(agent_id, "authentication failed: no secret for agent");
        return Err(ApiError::AuthFailed("Authentication failed".to_string()));
    };

    state.authenticator.verify(sigil, &secret).map_err(|e| {
        state.metrics.record_auth_failure();
        tracing::warn!(agent_id, reason = %e, "authentication failed");
        ApiError::AuthFailed("Authentication failed".to_string())
    })
}

/// Middleware authenticating requests via the agent id and sigil headers.
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    // 1. Extract credentials from headers
    let credentials = {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        (header(AGENT_ID_HEADER), header(SIGIL_HEADER))
    };
    let (Some(agent_id), Some(sigil)) = credentials else {
        return Err(ApiError::AuthFailed(format!(
            "Missing {AGENT_ID_HEADER} or {SIGIL_HEADER} header"
        )));
    };

    // 2. Get AppState
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or_else(|| ApiError::Internal("application state missing".to_string()))?
        .clone();

    // 3. Verify sigil
    let sigil = authenticate_agent(&state, &agent_id, &sigil)?;

    // 4. Insert into extensions
    req.extensions_mut().insert(AgentContext { agent_id, sigil });

    Ok(next.run(req).await)
}

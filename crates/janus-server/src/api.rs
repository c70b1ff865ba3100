//! HTTP handlers for invocation, health and metrics.

use crate::middleware::authenticate_agent;
use crate::routing::RoutedDirective;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Extension, Json},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use janus_protocol::{
    timestamp_now, Directive, DirectiveRegistry, EnvelopeError, ErrorCode, NeuralMessage,
    NeuralResponse,
};
use janus_sigil::Sigil;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Top-level keys every `/invoke` body must carry.
const REQUIRED_FIELDS: [&str; 4] = ["agent_id", "auth_sigil", "directive", "payload"];

/// API error type mapping to HTTP status codes and stable error codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    MissingFields(String),
    #[error("{0}")]
    InvalidJson(String),
    #[error("{0}")]
    AuthFailed(String),
    #[error("{0}")]
    InvalidDirective(String),
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::MissingFields(_) => ErrorCode::MissingFields,
            ApiError::InvalidJson(_) => ErrorCode::InvalidJson,
            ApiError::AuthFailed(_) => ErrorCode::AuthFailed,
            ApiError::InvalidDirective(_) => ErrorCode::InvalidDirective,
            ApiError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            ApiError::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingFields(_)
            | ApiError::InvalidJson(_)
            | ApiError::InvalidDirective(_) => StatusCode::BAD_REQUEST,
            ApiError::AuthFailed(_) => StatusCode::UNAUTHORIZED,
            ApiError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The error as a response envelope (also used for WebSocket frames).
    pub fn to_envelope(&self) -> NeuralResponse {
        NeuralResponse::error(self.code(), self.to_string())
    }
}

impl From<EnvelopeError> for ApiError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::EmptyField(_) => ApiError::MissingFields(err.to_string()),
            EnvelopeError::MalformedSigil => ApiError::AuthFailed(err.to_string()),
            EnvelopeError::DirectiveNotUppercase(_) => ApiError::InvalidDirective(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_envelope())).into_response()
    }
}

/// Parses a JSON request body, reporting syntax errors as `INVALID_JSON`.
pub(crate) fn parse_json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::InvalidJson(format!("Invalid JSON payload: {e}")))
}

/// Structural validation, counting malformed sigils as auth failures.
pub(crate) fn check_envelope(state: &AppState, message: &NeuralMessage) -> Result<(), ApiError> {
    message.check().map_err(|err| {
        if err == EnvelopeError::MalformedSigil {
            state.metrics.record_auth_failure();
        }
        ApiError::from(err)
    })
}

/// Resolves a directive and checks the sigil's tier against it.
pub fn authorize_directive(name: &str, sigil: &Sigil) -> Result<Directive, ApiError> {
    let directive = DirectiveRegistry::lookup(name)
        .ok_or_else(|| ApiError::InvalidDirective(format!("Unknown directive: {name}")))?;

    let required = directive.required_tier();
    if !sigil.tier.satisfies(required) {
        return Err(ApiError::PermissionDenied(format!(
            "Insufficient permissions. Required: {required}"
        )));
    }
    Ok(directive)
}

/// Routes an authorized directive, counting the outcome.
pub(crate) async fn dispatch(
    state: &AppState,
    directive: Directive,
    sigil: &Sigil,
    message: &NeuralMessage,
) -> Result<Value, ApiError> {
    let routed = RoutedDirective {
        directive,
        sigil,
        message,
    };
    match state.router.route(routed).await {
        Ok(data) => {
            state.metrics.record_processed();
            Ok(data)
        }
        Err(e) => {
            state.metrics.record_failed();
            tracing::error!(
                agent_id = %message.agent_id,
                %directive,
                "error routing directive: {}",
                e
            );
            Err(ApiError::Internal(e.to_string()))
        }
    }
}

/// Handler for `POST /invoke`.
///
/// Structural validation, sigil verification, directive lookup, tier check
/// and routing run in that order; the first failure short-circuits.
pub async fn invoke_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<NeuralResponse>, ApiError> {
    let value: Value = parse_json_body(&body)?;

    if REQUIRED_FIELDS.iter().any(|field| value.get(field).is_none()) {
        return Err(ApiError::MissingFields(format!(
            "Missing required fields: {}",
            REQUIRED_FIELDS.join(", ")
        )));
    }

    let message = NeuralMessage::from_value(value)
        .map_err(|e| ApiError::InvalidJson(format!("Malformed message envelope: {e}")))?;
    check_envelope(&state, &message)?;

    let sigil = authenticate_agent(&state, &message.agent_id, &message.auth_sigil)?;
    let directive = authorize_directive(&message.directive, &sigil).inspect_err(|e| {
        tracing::info!(agent_id = %message.agent_id, directive = %message.directive, "invoke rejected: {}", e);
    })?;

    let data = dispatch(&state, directive, &sigil, &message).await?;

    Ok(Json(
        NeuralResponse::success("Message routed successfully")
            .with_data(data)
            .with_correlation_id(message.correlation_id()),
    ))
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub active_agents: usize,
    pub active_websockets: usize,
    pub timestamp: String,
}

/// Handler for `GET /health`. Read-only.
pub async fn health_handler(Extension(state): Extension<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        active_agents: state.connections.len().await,
        active_websockets: state.metrics.active_connections(),
        timestamp: timestamp_now(),
    })
}

/// Handler for `GET /metrics`: one `name value` pair per line.
pub async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let registered = state.connections.len().await;
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.render(registered),
    )
}

//! Directive routing.
//!
//! Built-in directives (link initiation, termination, heartbeat and capability
//! query) are answered inline. Every other authorized directive goes to a
//! pluggable [`DirectiveHandler`]; the bridge only guarantees that some
//! response is produced, not the directive's business effect.

use crate::connections::{ConnectionTable, DeliveryError};
use async_trait::async_trait;
use futures_util::FutureExt;
use janus_protocol::{timestamp_now, Directive, DirectiveRegistry, MessageMetadata, NeuralMessage};
use janus_sigil::Sigil;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default timeout for forwarding a directive to an agent's callback endpoint.
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(5);

/// Failures surfaced by routing. All map to `INTERNAL_ERROR`.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("handler failed: {0}")]
    Handler(String),
    #[error("handler panicked while processing {0}")]
    Panicked(Directive),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A directive that passed authentication and authorization.
#[derive(Debug, Clone, Copy)]
pub struct RoutedDirective<'a> {
    pub directive: Directive,
    pub sigil: &'a Sigil,
    pub message: &'a NeuralMessage,
}

/// Extension point for non-built-in directives.
#[async_trait]
pub trait DirectiveHandler: Send + Sync {
    /// Produces the `data` of the success response.
    async fn handle(&self, request: RoutedDirective<'_>) -> Result<Value, RouteError>;
}

/// Dispatches authorized directives.
#[derive(Clone)]
pub struct DirectiveRouter {
    connections: ConnectionTable,
    handler: Arc<dyn DirectiveHandler>,
}

impl DirectiveRouter {
    pub fn new(connections: ConnectionTable, handler: Arc<dyn DirectiveHandler>) -> Self {
        Self {
            connections,
            handler,
        }
    }

    /// Routes one directive and returns the response data.
    ///
    /// Handler errors and panics are caught here so they never escape the
    /// request or session that triggered them.
    pub async fn route(&self, request: RoutedDirective<'_>) -> Result<Value, RouteError> {
        let agent_id = request.message.agent_id.as_str();
        match request.directive {
            Directive::InitiateNeuralLink => Ok(json!({ "message": "Link established" })),
            Directive::TerminateLink => {
                let removed = self.connections.terminate(agent_id).await;
                Ok(json!({ "message": "Link terminated", "removed": removed }))
            }
            Directive::Heartbeat => {
                self.connections.touch(agent_id).await;
                Ok(json!({ "server_time": timestamp_now() }))
            }
            Directive::QueryCapability => Ok(json!({
                "directives": DirectiveRegistry::list_all(),
                "tier": request.sigil.tier,
                "permissions": request.sigil.tier.permissions(),
                "role": request.sigil.role,
                "capabilities": request.sigil.role.capabilities(),
            })),
            directive => AssertUnwindSafe(self.handler.handle(request))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    tracing::error!(%directive, agent_id, "directive handler panicked");
                    Err(RouteError::Panicked(directive))
                }),
        }
    }
}

/// What a target agent receives for a forwarded directive.
///
/// The sender's sigil stays at the bridge; `from` names the authenticated
/// sender instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardedDirective {
    pub from: String,
    pub directive: String,
    pub payload: Value,
    pub metadata: MessageMetadata,
}

impl From<&NeuralMessage> for ForwardedDirective {
    fn from(message: &NeuralMessage) -> Self {
        Self {
            from: message.agent_id.clone(),
            directive: message.directive.clone(),
            payload: message.payload.clone(),
            metadata: message.metadata.clone(),
        }
    }
}

/// Default handler: point-to-point delivery to a `target_agent`.
///
/// When the payload names a connected `target_agent`, a [`ForwardedDirective`]
/// is queued on its live WebSocket, or POSTed to its callback endpoint. Without a
/// target the directive is acknowledged. Delivery is best-effort and reported
/// in the response data rather than failing the request.
pub struct ForwardingHandler {
    connections: ConnectionTable,
    client: reqwest::Client,
    timeout: Duration,
}

impl ForwardingHandler {
    pub fn new(connections: ConnectionTable, timeout: Duration) -> Self {
        Self {
            connections,
            client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn post_to_endpoint(
        &self,
        endpoint: &str,
        forwarded: &ForwardedDirective,
    ) -> Result<(), String> {
        let response = self
            .client
            .post(endpoint)
            .timeout(self.timeout)
            .json(forwarded)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("endpoint returned {}", response.status()))
        }
    }
}

#[async_trait]
impl DirectiveHandler for ForwardingHandler {
    async fn handle(&self, request: RoutedDirective<'_>) -> Result<Value, RouteError> {
        let directive = request.directive;
        let Some(target) = request
            .message
            .payload
            .get("target_agent")
            .and_then(Value::as_str)
        else {
            return Ok(json!({
                "message": format!("Directive {directive} processed"),
                "routed_to": "handler",
            }));
        };

        let forwarded = ForwardedDirective::from(request.message);
        let frame = serde_json::to_string(&forwarded)?;
        match self.connections.send_to(target, frame).await {
            Ok(()) => {
                tracing::debug!(%directive, target, "forwarded directive over websocket");
                return Ok(json!({
                    "routed_to": target,
                    "delivered": true,
                    "channel": "websocket",
                }));
            }
            Err(DeliveryError::UnknownAgent) => {
                return Ok(json!({
                    "routed_to": target,
                    "delivered": false,
                    "reason": "target agent is not connected",
                }));
            }
            Err(DeliveryError::Backpressure) => {
                tracing::warn!(%directive, target, "dropping forwarded directive for slow consumer");
                return Ok(json!({
                    "routed_to": target,
                    "delivered": false,
                    "reason": "target session is saturated",
                }));
            }
            Err(DeliveryError::NoSession) => {}
        }

        let endpoint = self
            .connections
            .get(target)
            .await
            .and_then(|record| record.endpoint);
        let Some(endpoint) = endpoint else {
            return Ok(json!({
                "routed_to": target,
                "delivered": false,
                "reason": "target agent has no delivery channel",
            }));
        };

        match self.post_to_endpoint(&endpoint, &forwarded).await {
            Ok(()) => {
                tracing::debug!(%directive, target, endpoint = %endpoint, "forwarded directive to endpoint");
                Ok(json!({
                    "routed_to": target,
                    "delivered": true,
                    "channel": "endpoint",
                }))
            }
            Err(e) => {
                tracing::warn!(%directive, target, endpoint = %endpoint, "endpoint delivery failed: {}", e);
                Ok(json!({
                    "routed_to": target,
                    "delivered": false,
                    "reason": e,
                }))
            }
        }
    }
}

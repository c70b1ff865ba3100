//! Janus bridge server library logic.

pub mod api;
pub mod api_agents;
pub mod api_ws;
pub mod background;
pub mod cli;
pub mod config;
pub mod connections;
pub mod metrics;
pub mod middleware;
pub mod routing;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Router,
};
use connections::ConnectionTable;
use janus_sigil::{AgentSecretStore, SigilAuthenticator};
use metrics::BridgeMetrics;
use routing::{DirectiveHandler, DirectiveRouter, ForwardingHandler, DEFAULT_FORWARD_TIMEOUT};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Maximum request body size (1 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Application state shared across all request handlers and sessions.
#[derive(Clone)]
pub struct AppState {
    /// Issues and verifies sigils with the bridge's master secret.
    pub authenticator: Arc<SigilAuthenticator>,
    /// Agent id to agent secret, used to verify presented sigils.
    pub secrets: AgentSecretStore,
    /// Live agent records and their WebSocket sessions.
    pub connections: ConnectionTable,
    /// Counters and gauges exposed on `/metrics`.
    pub metrics: Arc<BridgeMetrics>,
    /// Dispatches authorized directives.
    pub router: DirectiveRouter,
}

impl AppState {
    /// Builds state with an empty connection table and the forwarding handler.
    pub fn new(authenticator: Arc<SigilAuthenticator>, secrets: AgentSecretStore) -> Self {
        let connections = ConnectionTable::new();
        let handler = Arc::new(ForwardingHandler::new(
            connections.clone(),
            DEFAULT_FORWARD_TIMEOUT,
        ));
        Self {
            authenticator,
            secrets,
            router: DirectiveRouter::new(connections.clone(), handler),
            connections,
            metrics: Arc::new(BridgeMetrics::new()),
        }
    }

    /// Replaces the handler for non-built-in directives.
    pub fn with_handler(mut self, handler: Arc<dyn DirectiveHandler>) -> Self {
        self.router = DirectiveRouter::new(self.connections.clone(), handler);
        self
    }
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/agents/register", post(api_agents::register_handler))
        .route("/agents/discover", get(api_agents::discover_handler))
        .layer(axum::middleware::from_fn(middleware::auth_middleware));

    Router::new()
        .route("/health", get(api::health_handler))
        .route("/metrics", get(api::metrics_handler))
        .route("/invoke", post(api::invoke_handler))
        .route("/sigils/rotate", post(api_agents::rotate_sigil_handler))
        .merge(protected_routes)
        .route("/ws", get(api_ws::ws_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}

//! WebSocket sessions.
//!
//! Each session moves through `Unauthenticated → Authenticated → Closed`.
//! The first frame must be `INITIATE_NEURAL_LINK`; after that, heartbeats
//! refresh the connection record and other directives are authorized against
//! the tier proven at initiation and routed. Frames are handled strictly in
//! arrival order.
//!
//! A session also ends when its connection record goes away underneath it
//! (termination, heartbeat pruning, or a newer session for the same agent),
//! and after any internal error.

use crate::api::{authorize_directive, check_envelope, dispatch, ApiError};
use crate::connections::{Outbound, SessionHandle};
use crate::middleware::authenticate_agent;
use crate::AppState;
use axum::{
    extract::{
        ws::{Message as AxumMessage, WebSocket},
        ConnectInfo, Extension, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use janus_protocol::{timestamp_now, Directive, DirectiveRegistry, NeuralMessage, NeuralResponse};
use janus_sigil::Sigil;
use serde_json::{json, Value};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Bounded outbound queue per session; slow consumers lose forwarded frames.
const OUTBOUND_BUFFER: usize = 256;

/// Session lifecycle state.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated {
        agent_id: String,
        session_id: Uuid,
        sigil: Sigil,
    },
    Closed,
}

/// Per-socket state machine.
#[derive(Debug)]
pub struct BridgeSession {
    state: SessionState,
}

impl Default for BridgeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// `Unauthenticated → Authenticated`. Returns `false` from any other state.
    pub fn authenticate(&mut self, agent_id: String, session_id: Uuid, sigil: Sigil) -> bool {
        if self.state != SessionState::Unauthenticated {
            return false;
        }
        self.state = SessionState::Authenticated {
            agent_id,
            session_id,
            sigil,
        };
        true
    }

    /// Moves to `Closed`, returning the bound identity if there was one.
    pub fn close(&mut self) -> Option<(String, Uuid)> {
        match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Authenticated {
                agent_id,
                session_id,
                ..
            } => Some((agent_id, session_id)),
            SessionState::Unauthenticated | SessionState::Closed => None,
        }
    }
}

/// WebSocket handler: `GET /ws`.
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    tracing::debug!(remote_addr = %addr, "websocket upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

/// Queues a response envelope for the session writer.
async fn send_response(tx: &mpsc::Sender<Outbound>, response: &NeuralResponse) {
    match serde_json::to_string(response) {
        Ok(json) => {
            if tx.send(Outbound::Frame(json)).await.is_err() {
                tracing::debug!("websocket writer gone, dropping response");
            }
        }
        Err(e) => {
            tracing::error!("failed to serialize websocket response: {}", e);
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, addr: SocketAddr) {
    let _gauge = state.metrics.open_connection();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Outbound>(OUTBOUND_BUFFER);

    // Forward queued frames to the socket until asked to close.
    let send_task = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Frame(text) => {
                    if sink.send(AxumMessage::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sink.send(AxumMessage::Close(None)).await;
                    break;
                }
            }
        }
    });

    let handle = SessionHandle::new(tx.clone());
    let mut session = BridgeSession::new();

    loop {
        let frame = tokio::select! {
            biased;
            () = handle.evicted() => {
                tracing::info!(remote_addr = %addr, "websocket session evicted");
                break;
            }
            frame = stream.next() => frame,
        };
        let Some(frame) = frame else {
            break;
        };
        let text = match frame {
            Ok(AxumMessage::Text(text)) => text.as_str().to_owned(),
            Ok(AxumMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(remote_addr = %addr, "websocket protocol error: {}", e);
                break;
            }
        };

        handle_frame(&state, &mut session, &handle, &text).await;
        if session.is_closed() {
            break;
        }
    }

    if let Some((agent_id, session_id)) = session.close() {
        if state.connections.detach_session(&agent_id, session_id).await {
            tracing::info!(agent_id = %agent_id, "agent disconnected");
        }
    }

    let _ = tx.send(Outbound::Close).await;
    drop(tx);
    drop(handle);
    let _ = send_task.await;
    tracing::debug!(remote_addr = %addr, "websocket session ended");
}

async fn handle_frame(
    state: &AppState,
    session: &mut BridgeSession,
    handle: &SessionHandle,
    text: &str,
) {
    let tx = &handle.tx;
    let message = NeuralMessage::from_json(text)
        .map_err(|e| ApiError::InvalidJson(format!("Invalid JSON payload: {e}")));

    let (agent_id, sigil) = match session.state() {
        SessionState::Unauthenticated => {
            handle_initiation(state, session, handle, message).await;
            return;
        }
        SessionState::Authenticated {
            agent_id, sigil, ..
        } => (agent_id.clone(), sigil.clone()),
        SessionState::Closed => return,
    };

    let mut message = match message {
        Ok(message) => message,
        Err(e) => {
            send_response(tx, &e.to_envelope()).await;
            return;
        }
    };
    if let Err(e) = check_envelope(state, &message) {
        send_response(tx, &e.to_envelope()).await;
        return;
    }
    // Frames act for the session's agent regardless of the id they claim.
    message.agent_id = agent_id;
    let correlation_id = message.correlation_id().to_string();

    match DirectiveRegistry::lookup(&message.directive) {
        Some(Directive::Heartbeat) => {
            if !state.connections.touch(&message.agent_id).await {
                let error = ApiError::AuthFailed("Neural link is no longer registered".to_string());
                send_response(tx, &error.to_envelope().with_correlation_id(correlation_id)).await;
                tracing::info!(agent_id = %message.agent_id, "heartbeat for removed link, closing session");
                session.close();
                return;
            }
            state.metrics.record_processed();
            let ack = NeuralResponse::success("Heartbeat acknowledged")
                .with_data(json!({ "server_time": timestamp_now() }))
                .with_correlation_id(correlation_id);
            send_response(tx, &ack).await;
        }
        Some(Directive::TerminateLink) => {
            state.metrics.record_processed();
            let ack = NeuralResponse::success("Link terminated").with_correlation_id(correlation_id);
            send_response(tx, &ack).await;
            tracing::info!(agent_id = %message.agent_id, "agent terminated neural link");
            if let Some((agent_id, session_id)) = session.close() {
                state.connections.detach_session(&agent_id, session_id).await;
            }
        }
        _ => {
            let result = match authorize_directive(&message.directive, &sigil) {
                Ok(directive) => dispatch(state, directive, &sigil, &message).await,
                Err(e) => Err(e),
            };
            let response = match &result {
                Ok(data) => NeuralResponse::success("Message routed successfully").with_data(data.clone()),
                Err(e) => e.to_envelope(),
            };
            send_response(tx, &response.with_correlation_id(correlation_id)).await;

            if let Err(ApiError::Internal(reason)) = result {
                tracing::error!(agent_id = %message.agent_id, %reason, "closing websocket session after internal error");
                if let Some((agent_id, session_id)) = session.close() {
                    state.connections.detach_session(&agent_id, session_id).await;
                }
            }
        }
    }
}

async fn handle_initiation(
    state: &AppState,
    session: &mut BridgeSession,
    handle: &SessionHandle,
    message: Result<NeuralMessage, ApiError>,
) {
    let tx = &handle.tx;
    let result = match message {
        Ok(message) => initiate_link(state, handle, message).await,
        Err(e) => Err(e),
    };

    match result {
        Ok((agent_id, session_id, sigil, correlation_id)) => {
            let ack = NeuralResponse::success("Neural link established")
                .with_data(json!({
                    "agent_id": agent_id,
                    "session_id": session_id,
                    "tier": sigil.tier,
                }))
                .with_correlation_id(correlation_id);
            tracing::info!(agent_id = %agent_id, tier = %sigil.tier, "agent connected via websocket");
            session.authenticate(agent_id, session_id, sigil);
            send_response(tx, &ack).await;
        }
        Err(e) => {
            tracing::warn!("websocket initiation failed: {}", e);
            send_response(tx, &e.to_envelope()).await;
            session.close();
        }
    }
}

/// Validates an initiation frame and binds the session in the connection table.
async fn initiate_link(
    state: &AppState,
    handle: &SessionHandle,
    message: NeuralMessage,
) -> Result<(String, Uuid, Sigil, String), ApiError> {
    if message.directive != Directive::InitiateNeuralLink.as_str() {
        state.metrics.record_auth_failure();
        return Err(ApiError::AuthFailed(format!(
            "Neural link not initiated: first frame must be {}",
            Directive::InitiateNeuralLink
        )));
    }
    check_envelope(state, &message)?;
    let sigil = authenticate_agent(state, &message.agent_id, &message.auth_sigil)?;

    let capabilities = message
        .payload
        .get("capabilities")
        .and_then(Value::as_array)
        .map(|caps| {
            caps.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let endpoint = message
        .payload
        .get("endpoint")
        .and_then(Value::as_str)
        .map(str::to_string);

    let session_id = state
        .connections
        .attach_session(message.agent_id.clone(), capabilities, endpoint, handle.clone())
        .await;
    state.metrics.record_processed();

    Ok((
        message.agent_id.clone(),
        session_id,
        sigil,
        message.correlation_id().to_string(),
    ))
}

//! The live agent connection table.
//!
//! The table is the only owner of [`AgentConnection`] records. Records are
//! created on registration or a WebSocket handshake, refreshed on heartbeat,
//! and removed on disconnect, termination or heartbeat expiry.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify, RwLock};
use uuid::Uuid;

/// A frame queued for a live WebSocket session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A text frame (serialized JSON).
    Frame(String),
    /// Ask the session writer to send a close frame and stop.
    Close,
}

/// Handle to a live WebSocket session.
///
/// Clones share the eviction signal, so the session's reader can wait on the
/// same handle the table holds.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub tx: mpsc::Sender<Outbound>,
    evicted: Arc<Notify>,
}

impl SessionHandle {
    pub fn new(tx: mpsc::Sender<Outbound>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
            evicted: Arc::new(Notify::new()),
        }
    }

    /// Ends the session from outside: the writer sends a close frame and the
    /// reader stops routing frames.
    pub fn evict(&self) {
        let _ = self.tx.try_send(Outbound::Close);
        self.evicted.notify_one();
    }

    /// Resolves once [`evict`](Self::evict) has been called.
    pub async fn evicted(&self) {
        self.evicted.notified().await;
    }
}

/// Per-agent connection record.
#[derive(Debug, Clone, Serialize)]
pub struct AgentConnection {
    pub agent_id: String,
    pub capabilities: Vec<String>,
    pub connected_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub endpoint: Option<String>,
    #[serde(skip)]
    pub session: Option<SessionHandle>,
}

impl AgentConnection {
    fn new(agent_id: String, capabilities: Vec<String>, endpoint: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            agent_id,
            capabilities,
            connected_at: now,
            last_heartbeat: now,
            endpoint,
            session: None,
        }
    }

    /// Returns `true` if the agent has a live WebSocket session.
    pub fn is_live(&self) -> bool {
        self.session.is_some()
    }
}

/// Why a frame could not be pushed to an agent's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    UnknownAgent,
    NoSession,
    Backpressure,
}

/// Shared table of connected agents, keyed by agent id.
///
/// Lock acquisitions are short and never span I/O.
#[derive(Clone, Default)]
pub struct ConnectionTable {
    agents: Arc<RwLock<HashMap<String, AgentConnection>>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an out-of-band registration.
    ///
    /// Re-registering refreshes capabilities, endpoint and heartbeat but
    /// keeps a live session and the original connection time.
    pub async fn register(
        &self,
        agent_id: String,
        capabilities: Vec<String>,
        endpoint: Option<String>,
    ) -> AgentConnection {
        let mut agents = self.agents.write().await;
        let record = agents
            .entry(agent_id.clone())
            .and_modify(|existing| {
                existing.capabilities = capabilities.clone();
                existing.endpoint = endpoint.clone();
                existing.last_heartbeat = Utc::now();
            })
            .or_insert_with(|| AgentConnection::new(agent_id, capabilities, endpoint));
        record.clone()
    }

    /// Binds a WebSocket session to an agent and returns the session id.
    ///
    /// A previous session for the same agent is evicted.
    pub async fn attach_session(
        &self,
        agent_id: String,
        capabilities: Vec<String>,
        endpoint: Option<String>,
        session: SessionHandle,
    ) -> Uuid {
        let session_id = session.id;
        let mut record = AgentConnection::new(agent_id.clone(), capabilities, endpoint);
        record.session = Some(session);

        let previous = self.agents.write().await.insert(agent_id.clone(), record);
        if let Some(old) = previous.and_then(|p| p.session) {
            tracing::info!(agent_id = %agent_id, "replacing existing session");
            old.evict();
        }
        session_id
    }

    /// Removes the agent's record if it still belongs to `session_id`.
    ///
    /// Returns `false` for stale requests (record already gone or replaced).
    pub async fn detach_session(&self, agent_id: &str, session_id: Uuid) -> bool {
        let mut agents = self.agents.write().await;
        let owned = agents
            .get(agent_id)
            .and_then(|record| record.session.as_ref())
            .is_some_and(|session| session.id == session_id);
        if owned {
            agents.remove(agent_id);
        }
        owned
    }

    /// Refreshes the heartbeat timestamp. Returns `false` for unknown agents.
    pub async fn touch(&self, agent_id: &str) -> bool {
        match self.agents.write().await.get_mut(agent_id) {
            Some(record) => {
                record.last_heartbeat = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Removes an agent's record and closes its live session, if any.
    pub async fn terminate(&self, agent_id: &str) -> bool {
        let removed = self.agents.write().await.remove(agent_id);
        match removed {
            Some(record) => {
                if let Some(session) = record.session {
                    session.evict();
                }
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, agent_id: &str) -> Option<AgentConnection> {
        self.agents.read().await.get(agent_id).cloned()
    }

    /// All records, ordered by agent id.
    pub async fn list(&self) -> Vec<AgentConnection> {
        let mut records: Vec<AgentConnection> =
            self.agents.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        records
    }

    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }

    /// Queues a text frame on the agent's live session without waiting.
    pub async fn send_to(&self, agent_id: &str, frame: String) -> Result<(), DeliveryError> {
        let agents = self.agents.read().await;
        let record = agents.get(agent_id).ok_or(DeliveryError::UnknownAgent)?;
        let session = record.session.as_ref().ok_or(DeliveryError::NoSession)?;
        session
            .tx
            .try_send(Outbound::Frame(frame))
            .map_err(|_| DeliveryError::Backpressure)
    }

    /// Removes records whose last heartbeat is older than `cutoff`.
    ///
    /// Live sessions of pruned agents are evicted. Returns the ids
    /// that were removed.
    pub async fn prune_stale(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        let mut agents = self.agents.write().await;
        let stale: Vec<String> = agents
            .values()
            .filter(|record| record.last_heartbeat < cutoff)
            .map(|record| record.agent_id.clone())
            .collect();

        for agent_id in &stale {
            if let Some(session) = agents.remove(agent_id).and_then(|r| r.session) {
                session.evict();
            }
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn channel() -> (mpsc::Sender<Outbound>, mpsc::Receiver<Outbound>) {
        mpsc::channel(8)
    }

    #[tokio::test]
    async fn register_and_reregister() {
        let table = ConnectionTable::new();
        let first = table
            .register("a".into(), vec!["sync".into()], None)
            .await;
        let second = table
            .register("a".into(), vec!["query".into()], Some("http://a".into()))
            .await;

        assert_eq!(table.len().await, 1);
        assert_eq!(second.connected_at, first.connected_at);
        assert_eq!(second.capabilities, vec!["query".to_string()]);
        assert_eq!(second.endpoint.as_deref(), Some("http://a"));
    }

    #[tokio::test]
    async fn stale_detach_is_ignored() {
        let table = ConnectionTable::new();
        let (tx1, mut rx1) = channel();
        let (tx2, _rx2) = channel();

        let old = SessionHandle::new(tx1);
        let first = table.attach_session("a".into(), vec![], None, old.clone()).await;
        let second = table
            .attach_session("a".into(), vec![], None, SessionHandle::new(tx2))
            .await;

        // The replaced session is evicted.
        assert_eq!(rx1.recv().await, Some(Outbound::Close));
        tokio::time::timeout(Duration::from_secs(1), old.evicted())
            .await
            .unwrap();

        assert!(!table.detach_session("a", first).await);
        assert!(table.get("a").await.is_some());
        assert!(table.detach_session("a", second).await);
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn terminate_closes_live_session() {
        let table = ConnectionTable::new();
        let (tx, mut rx) = channel();
        let session = SessionHandle::new(tx);
        table
            .attach_session("a".into(), vec![], None, session.clone())
            .await;

        assert!(table.terminate("a").await);
        assert_eq!(rx.recv().await, Some(Outbound::Close));
        tokio::time::timeout(Duration::from_secs(1), session.evicted())
            .await
            .unwrap();
        assert!(!table.terminate("a").await);
    }

    #[tokio::test]
    async fn send_to_reports_missing_targets() {
        let table = ConnectionTable::new();
        table.register("http-only".into(), vec![], None).await;
        let (tx, mut rx) = channel();
        table
            .attach_session("live".into(), vec![], None, SessionHandle::new(tx))
            .await;

        assert_eq!(
            table.send_to("nobody", "x".into()).await,
            Err(DeliveryError::UnknownAgent)
        );
        assert_eq!(
            table.send_to("http-only", "x".into()).await,
            Err(DeliveryError::NoSession)
        );
        assert_eq!(table.send_to("live", "hello".into()).await, Ok(()));
        assert_eq!(rx.recv().await, Some(Outbound::Frame("hello".into())));
    }

    #[tokio::test]
    async fn touch_and_prune() {
        let table = ConnectionTable::new();
        table.register("old".into(), vec![], None).await;
        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        assert!(!table.touch("missing").await);

        let pruned = table.prune_stale(cutoff).await;
        assert_eq!(pruned, vec!["old".to_string()]);
        assert!(table.is_empty().await);

        table.register("fresh".into(), vec![], None).await;
        assert!(table.touch("fresh").await);
        let pruned = table.prune_stale(Utc::now() - chrono::Duration::seconds(60)).await;
        assert!(pruned.is_empty());
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn pruning_evicts_live_session() {
        let table = ConnectionTable::new();
        let (tx, mut rx) = channel();
        let session = SessionHandle::new(tx);
        table
            .attach_session("idle".into(), vec![], None, session.clone())
            .await;

        let pruned = table.prune_stale(Utc::now() + chrono::Duration::seconds(1)).await;
        assert_eq!(pruned, vec!["idle".to_string()]);
        assert_eq!(rx.recv().await, Some(Outbound::Close));
        tokio::time::timeout(Duration::from_secs(1), session.evicted())
            .await
            .unwrap();
    }
}

//! In-memory agent secret store.
//!
//! The bridge never receives agent secrets on the wire; it resolves them here
//! by agent id. Nothing is persisted across restarts.

use crate::{AgentSecret, IssuedSigil, SigilAuthenticator};
use janus_types::{AgentPrefix, AgentRole, AgentTier, SigilType};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Maps agent ids to their secrets.
///
/// Uses `std::sync::RwLock`: every acquisition is a short map operation that
/// never spans an `.await`.
#[derive(Clone, Debug, Default)]
pub struct AgentSecretStore {
    secrets: Arc<RwLock<HashMap<String, AgentSecret>>>,
}

impl AgentSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records (or replaces) the secret for an agent.
    pub fn insert(&self, agent_id: impl Into<String>, secret: AgentSecret) {
        self.write().insert(agent_id.into(), secret);
    }

    /// Returns the secret for an agent, if known.
    pub fn get(&self, agent_id: &str) -> Option<AgentSecret> {
        self.read().get(agent_id).cloned()
    }

    /// Forgets an agent's secret, returning it if present.
    pub fn remove(&self, agent_id: &str) -> Option<AgentSecret> {
        self.write().remove(agent_id)
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.read().contains_key(agent_id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Issues a sigil for `agent_id` and records its secret.
    ///
    /// An existing secret for the agent is reused so previously issued sigils
    /// stay valid.
    pub fn provision(
        &self,
        authenticator: &SigilAuthenticator,
        agent_id: &str,
        prefix: AgentPrefix,
        role: AgentRole,
        tier: AgentTier,
        sigil_type: SigilType,
    ) -> IssuedSigil {
        let mut secrets = self.write();
        let existing = secrets.get(agent_id).cloned();
        let issued = authenticator.generate(prefix, role, tier, sigil_type, existing);
        secrets.insert(agent_id.to_string(), issued.agent_secret.clone());
        tracing::debug!(agent_id, tier = %tier, "provisioned agent sigil");
        issued
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, AgentSecret>> {
        self.secrets.read().unwrap_or_else(|poisoned| {
            tracing::error!("agent secret store lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, AgentSecret>> {
        self.secrets.write().unwrap_or_else(|poisoned| {
            tracing::error!("agent secret store lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

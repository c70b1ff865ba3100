//! Tier permissions and role capabilities.

use crate::{AgentRole, AgentTier};
use serde::{Deserialize, Serialize};

/// Coarse operation classes granted by a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Write,
    Delete,
    Admin,
}

/// Functional capabilities granted by a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Orchestrate,
    Deploy,
    ManageAgents,
    MemoryOps,
    Sync,
    Aggregate,
    Execute,
    Monitor,
    Audit,
    Alert,
}

impl AgentTier {
    /// Permissions granted to holders of this tier.
    pub fn permissions(self) -> &'static [Permission] {
        match self {
            Self::Tier1 => &[
                Permission::Read,
                Permission::Write,
                Permission::Delete,
                Permission::Admin,
            ],
            Self::Tier2 => &[Permission::Read, Permission::Write],
            Self::Tier3 => &[Permission::Read],
        }
    }

    /// Returns `true` if this tier grants `permission`.
    pub fn grants(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl AgentRole {
    /// Capabilities granted to agents in this role.
    pub fn capabilities(self) -> &'static [Capability] {
        match self {
            Self::Juggernaut => &[
                Capability::Orchestrate,
                Capability::Deploy,
                Capability::ManageAgents,
            ],
            Self::Steward => &[
                Capability::MemoryOps,
                Capability::Sync,
                Capability::Aggregate,
            ],
            Self::Operator => &[Capability::Execute, Capability::Monitor],
            Self::Sentinel => &[Capability::Audit, Capability::Alert, Capability::Monitor],
            Self::Worker => &[Capability::Execute],
        }
    }

    /// Returns `true` if this role has `capability`.
    pub fn has_capability(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

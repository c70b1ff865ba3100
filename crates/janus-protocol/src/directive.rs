//! Directive catalog and required tiers.

use janus_types::AgentTier;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a directive name is not registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown directive: {0}")]
pub struct UnknownDirective(pub String);

/// Every directive the bridge recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Directive {
    // Link lifecycle
    InitiateNeuralLink,
    TerminateLink,
    Heartbeat,
    // Memory
    SyncMemory,
    QueryMemory,
    UpdateMemory,
    // GitHub
    GithubQuery,
    GithubUpdate,
    GithubCreate,
    // Sanctuary and safety
    RequestSanctuaryProtocol,
    EmergencyShutdown,
    // Telemetry
    TransmitTelemetry,
    QueryCapability,
}

impl Directive {
    /// All registered directives.
    pub const ALL: [Directive; 13] = [
        Self::InitiateNeuralLink,
        Self::TerminateLink,
        Self::Heartbeat,
        Self::SyncMemory,
        Self::QueryMemory,
        Self::UpdateMemory,
        Self::GithubQuery,
        Self::GithubUpdate,
        Self::GithubCreate,
        Self::RequestSanctuaryProtocol,
        Self::EmergencyShutdown,
        Self::TransmitTelemetry,
        Self::QueryCapability,
    ];

    /// The wire name of this directive.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitiateNeuralLink => "INITIATE_NEURAL_LINK",
            Self::TerminateLink => "TERMINATE_LINK",
            Self::Heartbeat => "HEARTBEAT",
            Self::SyncMemory => "SYNC_MEMORY",
            Self::QueryMemory => "QUERY_MEMORY",
            Self::UpdateMemory => "UPDATE_MEMORY",
            Self::GithubQuery => "GITHUB_QUERY",
            Self::GithubUpdate => "GITHUB_UPDATE",
            Self::GithubCreate => "GITHUB_CREATE",
            Self::RequestSanctuaryProtocol => "REQUEST_SANCTUARY_PROTOCOL",
            Self::EmergencyShutdown => "EMERGENCY_SHUTDOWN",
            Self::TransmitTelemetry => "TRANSMIT_TELEMETRY",
            Self::QueryCapability => "QUERY_CAPABILITY",
        }
    }

    /// Minimum tier an agent must hold to invoke this directive.
    pub fn required_tier(self) -> AgentTier {
        match self {
            Self::EmergencyShutdown => AgentTier::Tier1,
            Self::SyncMemory
            | Self::UpdateMemory
            | Self::GithubUpdate
            | Self::GithubCreate
            | Self::RequestSanctuaryProtocol => AgentTier::Tier2,
            Self::InitiateNeuralLink
            | Self::TerminateLink
            | Self::Heartbeat
            | Self::QueryMemory
            | Self::GithubQuery
            | Self::TransmitTelemetry
            | Self::QueryCapability => AgentTier::Tier3,
        }
    }

    /// Built-in directives are answered by the bridge itself.
    pub fn is_builtin(self) -> bool {
        matches!(
            self,
            Self::InitiateNeuralLink | Self::TerminateLink | Self::Heartbeat | Self::QueryCapability
        )
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Directive {
    type Err = UnknownDirective;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| UnknownDirective(s.to_string()))
    }
}

/// Static lookup from directive name to required tier.
///
/// The catalog is fixed at compile time; it is neither persisted nor mutable.
pub struct DirectiveRegistry;

impl DirectiveRegistry {
    /// Resolves a directive name.
    pub fn lookup(name: &str) -> Option<Directive> {
        name.parse().ok()
    }

    /// Returns `true` if `name` is a registered directive.
    pub fn is_valid(name: &str) -> bool {
        Self::lookup(name).is_some()
    }

    /// Minimum tier for `name`; `None` for unknown directives.
    pub fn required_tier(name: &str) -> Option<AgentTier> {
        Self::lookup(name).map(Directive::required_tier)
    }

    /// Names of all registered directives.
    pub fn list_all() -> Vec<&'static str> {
        Directive::ALL.iter().map(|d| d.as_str()).collect()
    }
}

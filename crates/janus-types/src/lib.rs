//! Shared types and constants for the Janus bridge.
//!
//! This crate holds the closed credential enumerations that make up a sigil
//! (`PREFIX-ROLE-TIER-TYPE`), the tier ordering used for authorization, and
//! protocol-wide constants. Every field is a closed enum: a value outside the
//! enumeration cannot be parsed, so tier comparison never sees an unknown tier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

mod permissions;
pub use permissions::{Capability, Permission};

/// Protocol version stamped into message metadata.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Error returned when a credential field is outside its enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {field}: {value}")]
pub struct UnknownVariant {
    /// Name of the credential field being parsed.
    pub field: &'static str,
    /// The rejected input.
    pub value: String,
}

impl UnknownVariant {
    fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }
}

/// Agent class, the first sigil segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentPrefix {
    /// Juggernaut orchestrator.
    #[serde(rename = "MW")]
    Microwave,
    /// Memory steward.
    #[serde(rename = "SY")]
    Synthesizer,
    /// Filesystem commander.
    #[serde(rename = "FC")]
    Filesystem,
    /// Quantum memory.
    #[serde(rename = "QM")]
    Quantum,
    /// Omni engine.
    #[serde(rename = "OM")]
    Omni,
    /// Repository controller.
    #[serde(rename = "RQ")]
    Repo,
}

impl AgentPrefix {
    /// All prefixes in declaration order.
    pub const ALL: [AgentPrefix; 6] = [
        Self::Microwave,
        Self::Synthesizer,
        Self::Filesystem,
        Self::Quantum,
        Self::Omni,
        Self::Repo,
    ];

    /// Returns the wire code for this prefix.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Microwave => "MW",
            Self::Synthesizer => "SY",
            Self::Filesystem => "FC",
            Self::Quantum => "QM",
            Self::Omni => "OM",
            Self::Repo => "RQ",
        }
    }
}

impl fmt::Display for AgentPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentPrefix {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("prefix", s))
    }
}

/// Agent function, the second sigil segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentRole {
    /// Top-tier orchestrator.
    #[serde(rename = "JGN")]
    Juggernaut,
    /// Memory/data steward.
    #[serde(rename = "STW")]
    Steward,
    /// Service operator.
    #[serde(rename = "OPR")]
    Operator,
    /// Security and monitoring.
    #[serde(rename = "SNT")]
    Sentinel,
    /// Task worker.
    #[serde(rename = "WKR")]
    Worker,
}

impl AgentRole {
    /// All roles in declaration order.
    pub const ALL: [AgentRole; 5] = [
        Self::Juggernaut,
        Self::Steward,
        Self::Operator,
        Self::Sentinel,
        Self::Worker,
    ];

    /// Returns the wire code for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Juggernaut => "JGN",
            Self::Steward => "STW",
            Self::Operator => "OPR",
            Self::Sentinel => "SNT",
            Self::Worker => "WKR",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("role", s))
    }
}

/// Access tier, the third sigil segment.
///
/// `Tier1` is the broadest. Capability nests: `Tier1 ⊇ Tier2 ⊇ Tier3`.
/// The derived ordering is intentionally absent; compare with [`AgentTier::rank`]
/// or [`AgentTier::satisfies`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentTier {
    /// Full access.
    #[serde(rename = "TIER1")]
    Tier1,
    /// Limited access.
    #[serde(rename = "TIER2")]
    Tier2,
    /// Read-only.
    #[serde(rename = "TIER3")]
    Tier3,
}

impl AgentTier {
    /// All tiers, broadest first.
    pub const ALL: [AgentTier; 3] = [Self::Tier1, Self::Tier2, Self::Tier3];

    /// Returns the wire code for this tier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tier1 => "TIER1",
            Self::Tier2 => "TIER2",
            Self::Tier3 => "TIER3",
        }
    }

    /// Numeric rank: `TIER3 → 1`, `TIER2 → 2`, `TIER1 → 3`.
    pub fn rank(self) -> u8 {
        match self {
            Self::Tier3 => 1,
            Self::Tier2 => 2,
            Self::Tier1 => 3,
        }
    }

    /// Returns `true` when an agent holding `self` meets `required`.
    pub fn satisfies(self, required: AgentTier) -> bool {
        self.rank() >= required.rank()
    }
}

impl fmt::Display for AgentTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentTier {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("tier", s))
    }
}

/// Credential purpose, the fourth sigil segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigilType {
    /// Sentinel access.
    #[serde(rename = "SNTNL")]
    Sentinel,
    /// Service account.
    #[serde(rename = "SRVC")]
    Service,
    /// Temporary token.
    #[serde(rename = "TEMP")]
    Temporary,
}

impl SigilType {
    /// All sigil types in declaration order.
    pub const ALL: [SigilType; 3] = [Self::Sentinel, Self::Service, Self::Temporary];

    /// Returns the wire code for this sigil type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sentinel => "SNTNL",
            Self::Service => "SRVC",
            Self::Temporary => "TEMP",
        }
    }
}

impl Default for SigilType {
    fn default() -> Self {
        Self::Sentinel
    }
}

impl fmt::Display for SigilType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigilType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("sigil type", s))
    }
}

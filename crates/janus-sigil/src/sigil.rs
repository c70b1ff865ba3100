//! Structural decomposition of sigil strings.

use crate::SigilError;
use janus_types::{AgentPrefix, AgentRole, AgentTier, Capability, Permission, SigilType};
use serde::Serialize;
use std::fmt;

/// Parsed components of a sigil.
///
/// Holding a `Sigil` says nothing about authenticity; only
/// [`SigilAuthenticator::verify`](crate::SigilAuthenticator::verify) does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sigil {
    pub prefix: AgentPrefix,
    pub role: AgentRole,
    pub tier: AgentTier,
    #[serde(rename = "type")]
    pub sigil_type: SigilType,
    pub token: String,
    pub signature: Option<String>,
}

impl Sigil {
    /// Decomposes a sigil without any cryptographic check.
    ///
    /// The signature is optional here; everything after the fourth dash of
    /// the unsigned part is the token. Returns `None` for anything that does
    /// not decompose into known field values.
    pub fn parse(sigil: &str) -> Option<Self> {
        let (unsigned, signature) = match sigil.rsplit_once(':') {
            Some((unsigned, signature)) => (unsigned, Some(signature)),
            None => (sigil, None),
        };
        Self::from_parts(unsigned, signature).ok()
    }

    /// Builds a sigil from its unsigned part and an optional signature.
    pub(crate) fn from_parts(unsigned: &str, signature: Option<&str>) -> Result<Self, SigilError> {
        let fields: Vec<&str> = unsigned.splitn(5, '-').collect();
        if fields.len() < 5 || fields.iter().any(|f| f.is_empty()) {
            return Err(SigilError::Malformed);
        }

        Ok(Self {
            prefix: fields[0].parse()?,
            role: fields[1].parse()?,
            tier: fields[2].parse()?,
            sigil_type: fields[3].parse()?,
            token: fields[4].to_string(),
            signature: signature.map(str::to_string),
        })
    }

    /// The `PREFIX-ROLE-TIER-TYPE-TOKEN` portion covered by the signature.
    pub fn unsigned(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            self.prefix, self.role, self.tier, self.sigil_type, self.token
        )
    }

    /// Returns `true` if the sigil's tier grants `permission`.
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.tier.grants(permission)
    }

    /// Returns `true` if the sigil's role carries `capability`.
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.role.has_capability(capability)
    }
}

impl fmt::Display for Sigil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.unsigned())?;
        if let Some(signature) = &self.signature {
            write!(f, ":{signature}")?;
        }
        Ok(())
    }
}

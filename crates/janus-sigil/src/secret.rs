//! Per-agent secrets.

use crate::AGENT_SECRET_BYTES;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A per-agent secret mixed into every sigil signature.
///
/// Never sent inside a message. `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentSecret(String);

impl AgentSecret {
    /// Draws a fresh random secret (32 lower-case hex characters).
    pub fn generate() -> Self {
        Self(random_hex(AGENT_SECRET_BYTES))
    }

    /// Returns the secret material.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AgentSecret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for AgentSecret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for AgentSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AgentSecret(<redacted>)")
    }
}

/// Returns `len` random bytes from the OS RNG as lower-case hex.
pub(crate) fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secrets_are_distinct_hex() {
        let a = AgentSecret::generate();
        let b = AgentSecret::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), AGENT_SECRET_BYTES * 2);
        assert!(a.as_str().bytes().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn debug_is_redacted() {
        let secret = AgentSecret::from("super-secret");
        assert!(!format!("{secret:?}").contains("super-secret"));
    }

    #[test]
    fn deserializes_from_plain_string() {
        let secret: AgentSecret = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(secret.as_str(), "abc");
    }
}

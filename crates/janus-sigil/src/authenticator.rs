//! The sigil authenticator: issue, verify and rotate signed credentials.

use crate::secret::random_hex;
use crate::{AgentSecret, Sigil, SigilError, MASTER_SECRET_BYTES, SIGNATURE_HEX_LEN, TOKEN_BYTES};
use hmac::{Hmac, Mac};
use janus_types::{AgentPrefix, AgentRole, AgentTier, SigilType};
use sha2::Sha256;
use std::fmt;
use subtle::ConstantTimeEq;

/// A freshly issued sigil together with the agent secret it was signed with.
///
/// The secret must reach the agent out of band; it cannot be recovered from
/// the sigil.
#[derive(Debug, Clone)]
pub struct IssuedSigil {
    pub sigil: String,
    pub agent_secret: AgentSecret,
}

/// Issues and verifies sigils under a single master secret.
///
/// Every operation is total: malformed input yields an error value or
/// `None`, never a panic.
#[derive(Clone)]
pub struct SigilAuthenticator {
    master_secret: String,
}

impl SigilAuthenticator {
    /// Creates an authenticator with a known master secret.
    pub fn new(master_secret: impl Into<String>) -> Self {
        Self {
            master_secret: master_secret.into(),
        }
    }

    /// Creates an authenticator with a random 32-byte master secret.
    pub fn random() -> Self {
        Self::new(random_hex(MASTER_SECRET_BYTES))
    }

    /// Issues a new sigil.
    ///
    /// A fresh token is always drawn. When `agent_secret` is `None` a new
    /// secret is generated and returned alongside the sigil.
    pub fn generate(
        &self,
        prefix: AgentPrefix,
        role: AgentRole,
        tier: AgentTier,
        sigil_type: SigilType,
        agent_secret: Option<AgentSecret>,
    ) -> IssuedSigil {
        let token = random_hex(TOKEN_BYTES);
        let unsigned = format!("{prefix}-{role}-{tier}-{sigil_type}-{token}");
        let agent_secret = agent_secret.unwrap_or_else(AgentSecret::generate);
        let signature = self.sign(&unsigned, &agent_secret);

        IssuedSigil {
            sigil: format!("{unsigned}:{signature}"),
            agent_secret,
        }
    }

    /// Verifies a sigil against an agent secret, returning its components.
    ///
    /// # Errors
    ///
    /// Returns a [`SigilError`] describing the first failed check. The
    /// signature comparison is constant-time.
    pub fn verify(&self, sigil: &str, agent_secret: &AgentSecret) -> Result<Sigil, SigilError> {
        let (unsigned, provided) = sigil
            .rsplit_once(':')
            .ok_or(SigilError::MissingSignature)?;
        let parsed = Sigil::from_parts(unsigned, Some(provided))?;

        if provided.len() != SIGNATURE_HEX_LEN
            || !provided
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return Err(SigilError::BadSignatureEncoding);
        }

        let expected = self.sign(unsigned, agent_secret);
        if !bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
            return Err(SigilError::SignatureMismatch);
        }

        Ok(parsed)
    }

    /// Returns `true` if the sigil verifies against `agent_secret`.
    pub fn validate(&self, sigil: &str, agent_secret: &AgentSecret) -> bool {
        self.verify(sigil, agent_secret).is_ok()
    }

    /// Structural decomposition without any cryptographic check.
    pub fn parse(&self, sigil: &str) -> Option<Sigil> {
        Sigil::parse(sigil)
    }

    /// Re-issues a valid sigil with a new token and signature.
    ///
    /// Prefix, role, tier, type and the agent secret are preserved. Returns
    /// `None` without side effects if the old sigil does not verify.
    pub fn rotate(&self, old_sigil: &str, agent_secret: &AgentSecret) -> Option<IssuedSigil> {
        let current = self.verify(old_sigil, agent_secret).ok()?;
        Some(self.generate(
            current.prefix,
            current.role,
            current.tier,
            current.sigil_type,
            Some(agent_secret.clone()),
        ))
    }

    fn sign(&self, unsigned: &str, agent_secret: &AgentSecret) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.master_secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(unsigned.as_bytes());
        mac.update(b":");
        mac.update(agent_secret.as_str().as_bytes());
        let digest = hex::encode(mac.finalize().into_bytes());
        digest[..SIGNATURE_HEX_LEN].to_string()
    }
}

impl fmt::Debug for SigilAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigilAuthenticator")
            .field("master_secret", &"<redacted>")
            .finish()
    }
}

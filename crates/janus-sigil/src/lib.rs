//! Sigil issuance and verification for the Janus bridge.
//!
//! A sigil is a signed credential string of the form
//! `PREFIX-ROLE-TIER-TYPE-TOKEN:SIGNATURE`. The signature is
//! `HMAC-SHA256(master_secret, unsigned + ":" + agent_secret)` truncated to
//! 16 lower-case hex characters. Verification requires both the master
//! secret (held by the [`SigilAuthenticator`]) and the per-agent secret.

pub mod authenticator;
pub mod secret;
pub mod sigil;
pub mod store;

pub use authenticator::{IssuedSigil, SigilAuthenticator};
pub use secret::AgentSecret;
pub use sigil::Sigil;
pub use store::AgentSecretStore;

use janus_types::UnknownVariant;
use thiserror::Error;

/// Length of the truncated hex signature.
pub const SIGNATURE_HEX_LEN: usize = 16;

/// Number of random bytes in a sigil token (hex-encoded to 20 characters).
pub const TOKEN_BYTES: usize = 10;

/// Number of random bytes in a generated agent secret.
pub const AGENT_SECRET_BYTES: usize = 16;

/// Number of random bytes in a generated master secret.
pub const MASTER_SECRET_BYTES: usize = 32;

/// Reasons a sigil fails to parse or verify.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigilError {
    /// No `:` separates the signature from the unsigned part.
    #[error("sigil has no signature")]
    MissingSignature,
    /// Fewer than five dash-separated fields, or an empty field.
    #[error("sigil must have PREFIX-ROLE-TIER-TYPE-TOKEN fields")]
    Malformed,
    /// A field is outside its enumeration.
    #[error(transparent)]
    UnknownField(#[from] UnknownVariant),
    /// The signature is not 16 lower-case hex characters.
    #[error("sigil signature is not {SIGNATURE_HEX_LEN} lower-case hex characters")]
    BadSignatureEncoding,
    /// The signature does not match the recomputed HMAC.
    #[error("sigil signature mismatch")]
    SignatureMismatch,
}

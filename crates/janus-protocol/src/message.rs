//! The message envelope exchanged between agents and the bridge.

use crate::timestamp_now;
use janus_types::PROTOCOL_VERSION;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Minimum number of dash-separated segments in a well-formed sigil.
pub const MIN_SIGIL_SEGMENTS: usize = 5;

/// Structural envelope failures. Authentication is checked elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("missing required field: {0}")]
    EmptyField(&'static str),
    #[error("auth_sigil must have at least {MIN_SIGIL_SEGMENTS} dash-separated segments")]
    MalformedSigil,
    #[error("directive must be upper-case: {0}")]
    DirectiveNotUppercase(String),
}

/// Envelope metadata.
///
/// Missing fields are filled when the envelope is built or deserialized.
/// Unknown keys are preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default = "timestamp_now")]
    pub timestamp: String,
    #[serde(default = "new_id")]
    pub correlation_id: String,
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
    #[serde(default = "new_id")]
    pub message_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for MessageMetadata {
    fn default() -> Self {
        Self {
            timestamp: timestamp_now(),
            correlation_id: new_id(),
            protocol_version: default_protocol_version(),
            message_id: new_id(),
            extra: Map::new(),
        }
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_protocol_version() -> String {
    PROTOCOL_VERSION.to_string()
}

/// Treats an explicit `null` the same as an absent metadata object.
fn metadata_or_default<'de, D>(deserializer: D) -> Result<MessageMetadata, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<MessageMetadata>::deserialize(deserializer)?.unwrap_or_default())
}

/// A directive-bearing message from an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralMessage {
    pub agent_id: String,
    pub auth_sigil: String,
    pub directive: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, deserialize_with = "metadata_or_default")]
    pub metadata: MessageMetadata,
}

impl NeuralMessage {
    /// Builds an envelope with fresh metadata.
    pub fn new(
        agent_id: impl Into<String>,
        auth_sigil: impl Into<String>,
        directive: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            auth_sigil: auth_sigil.into(),
            directive: directive.into(),
            payload,
            metadata: MessageMetadata::default(),
        }
    }

    /// Replaces the generated metadata.
    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Structural check naming the first rule that fails.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError`] for an empty field, a sigil with too few
    /// segments, or a directive that is not upper-case.
    pub fn check(&self) -> Result<(), EnvelopeError> {
        if self.agent_id.is_empty() {
            return Err(EnvelopeError::EmptyField("agent_id"));
        }
        if self.auth_sigil.is_empty() {
            return Err(EnvelopeError::EmptyField("auth_sigil"));
        }
        if self.directive.is_empty() {
            return Err(EnvelopeError::EmptyField("directive"));
        }
        if self.auth_sigil.split('-').count() < MIN_SIGIL_SEGMENTS {
            return Err(EnvelopeError::MalformedSigil);
        }
        if !is_upper_case(&self.directive) {
            return Err(EnvelopeError::DirectiveNotUppercase(self.directive.clone()));
        }
        Ok(())
    }

    /// Returns `true` if the envelope is structurally valid.
    pub fn validate(&self) -> bool {
        self.check().is_ok()
    }

    /// The correlation id carried in metadata.
    pub fn correlation_id(&self) -> &str {
        &self.metadata.correlation_id
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// At least one cased character and no lower-case characters.
fn is_upper_case(s: &str) -> bool {
    s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase)
}

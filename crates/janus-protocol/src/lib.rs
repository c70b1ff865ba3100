//! Wire protocol for the Janus bridge.
//!
//! Defines the message envelope agents send ([`NeuralMessage`]), the
//! response envelope the bridge returns ([`NeuralResponse`]), the stable
//! error codes, and the fixed catalog of directives with the tier each one
//! requires ([`DirectiveRegistry`]). Pure data and validation; no I/O.

pub mod directive;
pub mod message;
pub mod response;

pub use directive::{Directive, DirectiveRegistry, UnknownDirective};
pub use message::{EnvelopeError, MessageMetadata, NeuralMessage};
pub use response::{ErrorCode, NeuralResponse, ResponseStatus};

/// Current UTC time as an RFC 3339 string with millisecond precision.
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

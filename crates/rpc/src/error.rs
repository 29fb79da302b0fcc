//! Bridge errors.

use crate::envelope::ErrorPayload;

/// Errors surfaced by the bridge.
///
/// `Clone` so one failure can settle many pending calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	/// The channel to the host failed; every pending call of the session sees this.
	#[error("transport failure: {0}")]
	Transport(String),
	/// The host reported a failure for this call.
	#[error("{message}")]
	Application {
		/// Host message.
		message: String,
		/// Host stack trace.
		stack: Option<String>,
	},
	/// The client was disposed while the call was pending.
	#[error("client disposed")]
	Disposed,
	/// The host violated the envelope protocol.
	#[error("protocol violation: {0}")]
	Protocol(String),
	/// The host could not be started.
	#[error("failed to launch host: {0}")]
	Launch(String),
	/// Call arguments could not be serialized.
	#[error("failed to encode arguments of {method}: {reason}")]
	Encode {
		/// Remote procedure name.
		method: String,
		/// Serializer message.
		reason: String,
	},
	/// The host's reply did not match the expected output type.
	#[error("failed to decode result of {method}: {reason}")]
	Decode {
		/// Remote procedure name.
		method: String,
		/// Deserializer message.
		reason: String,
	},
}

impl From<ErrorPayload> for Error {
	fn from(payload: ErrorPayload) -> Self {
		Self::Application {
			message: payload.message,
			stack: payload.stack,
		}
	}
}

/// Result alias for bridge operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

//! Wire envelope and correlation ids.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Envelope kind.
///
/// `init` and `call` travel client to host; the rest travel host to client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
	/// Ask the host to initialize its engine.
	Init,
	/// Invoke a remote procedure.
	Call,
	/// The host finished initializing.
	Ready,
	/// A call completed successfully.
	Response,
	/// A call or init failed.
	Error,
	/// The host shut down.
	Disposed,
}

impl Kind {
	/// Returns true for kinds that settle a pending call.
	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Ready | Self::Response | Self::Error)
	}
}

impl fmt::Display for Kind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Init => "init",
			Self::Call => "call",
			Self::Ready => "ready",
			Self::Response => "response",
			Self::Error => "error",
			Self::Disposed => "disposed",
		})
	}
}

/// Token pairing a call with its terminal envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub String);

impl fmt::Display for CorrelationId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for CorrelationId {
	fn from(value: &str) -> Self {
		Self(value.to_owned())
	}
}

/// Generates correlation ids unique for the generator's lifetime.
///
/// Ids are a random per-generator base followed by a monotonic counter, so two clients talking to
/// the same host never collide.
#[derive(Debug)]
pub struct CorrelationIdGen {
	base: String,
	next: AtomicU64,
}

impl CorrelationIdGen {
	/// Creates a generator with a fresh random base.
	pub fn new() -> Self {
		Self {
			base: uuid::Uuid::new_v4().simple().to_string(),
			next: AtomicU64::new(0),
		}
	}

	/// Returns the next id.
	#[allow(clippy::should_implement_trait, reason = "shared counter, not an iterator")]
	pub fn next(&self) -> CorrelationId {
		let n = self.next.fetch_add(1, Ordering::Relaxed);
		CorrelationId(format!("{}-{n}", self.base))
	}
}

impl Default for CorrelationIdGen {
	fn default() -> Self {
		Self::new()
	}
}

/// Payload of an `error` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
	/// Human-readable message.
	pub message: String,
	/// Host-side stack trace, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stack: Option<String>,
}

impl ErrorPayload {
	/// Creates a payload without a stack.
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			stack: None,
		}
	}

	/// Decodes an error payload, tolerating malformed hosts.
	pub fn from_value(payload: JsonValue) -> Self {
		match payload {
			JsonValue::String(message) => Self::new(message),
			payload => serde_json::from_value(payload)
				.unwrap_or_else(|e| Self::new(format!("malformed error payload: {e}"))),
		}
	}
}

/// The unit of transport between client and host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
	/// What the envelope means.
	pub kind: Kind,
	/// Kind-specific body.
	#[serde(default)]
	pub payload: JsonValue,
	/// Echoed by the host; only `disposed` may omit it.
	#[serde(rename = "correlationId", default, skip_serializing_if = "Option::is_none")]
	pub correlation_id: Option<CorrelationId>,
}

impl Envelope {
	fn new(kind: Kind, id: CorrelationId, payload: JsonValue) -> Self {
		Self {
			kind,
			payload,
			correlation_id: Some(id),
		}
	}

	/// `init` request.
	pub fn init(id: CorrelationId) -> Self {
		Self::new(Kind::Init, id, JsonValue::Null)
	}

	/// `call` request carrying a [`CallPayload`](crate::CallPayload).
	pub fn call(id: CorrelationId, payload: JsonValue) -> Self {
		Self::new(Kind::Call, id, payload)
	}

	/// `ready` reply to an `init`.
	pub fn ready(id: CorrelationId) -> Self {
		Self::new(Kind::Ready, id, JsonValue::Null)
	}

	/// `response` reply to a `call`.
	pub fn response(id: CorrelationId, payload: JsonValue) -> Self {
		Self::new(Kind::Response, id, payload)
	}

	/// `error` reply to an `init` or `call`.
	pub fn error(id: CorrelationId, error: ErrorPayload) -> Self {
		let payload = serde_json::to_value(error).unwrap_or(JsonValue::Null);
		Self::new(Kind::Error, id, payload)
	}

	/// Host shutdown notice.
	pub fn disposed() -> Self {
		Self {
			kind: Kind::Disposed,
			payload: JsonValue::Null,
			correlation_id: None,
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	#[test]
	fn wire_field_names() {
		let envelope = Envelope::call("c-1".into(), json!({ "method": "getMaterialCategories", "args": {} }));
		assert_eq!(
			serde_json::to_value(&envelope).unwrap(),
			json!({
				"kind": "call",
				"payload": { "method": "getMaterialCategories", "args": {} },
				"correlationId": "c-1"
			})
		);
		assert_eq!(serde_json::to_value(Envelope::disposed()).unwrap(), json!({ "kind": "disposed", "payload": null }));
	}

	#[test]
	fn error_payload_tolerates_bare_strings() {
		assert_eq!(ErrorPayload::from_value(json!("boom")), ErrorPayload::new("boom"));
		assert_eq!(
			ErrorPayload::from_value(json!({ "message": "boom", "stack": "at engine" })),
			ErrorPayload {
				message: "boom".into(),
				stack: Some("at engine".into()),
			}
		);
		assert!(ErrorPayload::from_value(json!(3)).message.starts_with("malformed"));
	}

	#[test]
	fn ids_are_unique_across_generators() {
		let a = CorrelationIdGen::new();
		let b = CorrelationIdGen::new();
		let first = a.next();
		assert_ne!(first, a.next());
		assert_ne!(first, b.next());
	}
}

//! Typed remote procedures.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A remote procedure: the value is its argument object, `Output` its decoded result.
pub trait Method: Serialize + Send + Sync {
	/// Name the host dispatches on.
	const NAME: &'static str;
	/// Decoded `response` payload.
	type Output: DeserializeOwned + Send;
}

/// Payload of a `call` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallPayload {
	/// Remote procedure name.
	pub method: String,
	/// Argument object.
	#[serde(default)]
	pub args: JsonValue,
}

/// Asks the host to release engine resources before the channel is torn down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cleanup {}

impl Method for Cleanup {
	const NAME: &'static str = "internal.cleanup";
	type Output = bool;
}

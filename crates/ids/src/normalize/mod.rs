//! Conversion between the engine's schema convention and the plain convention.
//!
//! The engine serializes restrictions the way its XML schema binding sees them:
//!
//! ```json
//! { "xs:restriction": [{ "@base": "xs:string", "xs:enumeration": [{ "@value": "A" }] }] }
//! ```
//!
//! while its mutation calls expect the plain form:
//!
//! ```json
//! { "restriction": { "@base": "xs:string", "enumeration": [{ "@value": "A" }] } }
//! ```

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

#[cfg(test)]
mod tests;

const PREFIX: &str = "xs:";
const SCHEMA_KEY: &str = "xs:restriction";
const PLAIN_KEY: &str = "restriction";

fn is_restriction_key(key: &str) -> bool {
	key == SCHEMA_KEY || key == PLAIN_KEY
}

/// Rewrites every restriction sub-tree into the plain convention.
///
/// A restriction holding a non-empty sequence collapses to its first element, and keys inside
/// the restriction lose their `xs:` prefix. Scalars pass through unchanged and the transform is
/// idempotent.
pub fn normalize(value: JsonValue) -> JsonValue {
	match value {
		JsonValue::Object(map) => JsonValue::Object(
			map.into_iter()
				.map(|(key, value)| match restriction_body(&key, value) {
					Ok(body) => (PLAIN_KEY.to_owned(), JsonValue::Object(strip_keys(body))),
					Err(value) => (key, normalize(value)),
				})
				.collect(),
		),
		JsonValue::Array(items) => JsonValue::Array(items.into_iter().map(normalize).collect()),
		scalar => scalar,
	}
}

/// Rewrites every restriction sub-tree into the schema convention.
///
/// Inverse of [`normalize`]: `normalize(denormalize(x)) == normalize(x)`. Attribute keys
/// (`@base`, `@value`) keep their names.
pub fn denormalize(value: JsonValue) -> JsonValue {
	match value {
		JsonValue::Object(map) => JsonValue::Object(
			map.into_iter()
				.map(|(key, value)| match restriction_body(&key, value) {
					Ok(body) => (
						SCHEMA_KEY.to_owned(),
						JsonValue::Array(vec![JsonValue::Object(prefix_keys(body))]),
					),
					Err(value) => (key, denormalize(value)),
				})
				.collect(),
		),
		JsonValue::Array(items) => JsonValue::Array(items.into_iter().map(denormalize).collect()),
		scalar => scalar,
	}
}

/// Extracts the restriction map stored under `key`, or hands the value back untouched.
fn restriction_body(key: &str, value: JsonValue) -> Result<Map<String, JsonValue>, JsonValue> {
	if !is_restriction_key(key) {
		return Err(value);
	}
	match value {
		JsonValue::Object(map) => Ok(map),
		JsonValue::Array(mut items) if matches!(items.first(), Some(JsonValue::Object(_))) => {
			match items.swap_remove(0) {
				JsonValue::Object(map) => Ok(map),
				other => Err(other),
			}
		}
		other => Err(other),
	}
}

fn strip_keys(body: Map<String, JsonValue>) -> Map<String, JsonValue> {
	body.into_iter()
		.map(|(key, value)| {
			let key = key.strip_prefix(PREFIX).map(str::to_owned).unwrap_or(key);
			(key, normalize(value))
		})
		.collect()
}

fn prefix_keys(body: Map<String, JsonValue>) -> Map<String, JsonValue> {
	body.into_iter()
		.map(|(key, value)| {
			let key = if key.starts_with('@') || key.starts_with(PREFIX) {
				key
			} else {
				format!("{PREFIX}{key}")
			};
			(key, denormalize(value))
		})
		.collect()
}

/// Deserializes `T` after running [`normalize`] over the input.
///
/// Serializes as `T` unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized<T>(pub T);

impl<T> Normalized<T> {
	/// Unwraps the decoded value.
	pub fn into_inner(self) -> T {
		self.0
	}
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Normalized<T> {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw = JsonValue::deserialize(deserializer)?;
		T::deserialize(normalize(raw)).map(Self).map_err(D::Error::custom)
	}
}

impl<T: Serialize> Serialize for Normalized<T> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.0.serialize(serializer)
	}
}

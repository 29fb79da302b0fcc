//! Facet values: literals and restrictions.

use serde::{Deserialize, Deserializer, Serialize};

/// Value constraint carried by a facet field.
///
/// Serialized in the plain convention: `{"simpleValue": "X"}` or `{"restriction": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
	/// Exact literal match.
	#[serde(rename = "simpleValue", deserialize_with = "scalar_text")]
	Simple(String),
	/// Match constrained by a restriction.
	#[serde(rename = "restriction")]
	Restriction(Restriction),
}

impl Value {
	/// Creates a literal value.
	pub fn simple(value: impl Into<String>) -> Self {
		Self::Simple(value.into())
	}

	/// Returns the literal if this value is one.
	pub fn as_simple(&self) -> Option<&str> {
		match self {
			Self::Simple(s) => Some(s),
			Self::Restriction(_) => None,
		}
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Self::simple(value)
	}
}

impl From<Restriction> for Value {
	fn from(value: Restriction) -> Self {
		Self::Restriction(value)
	}
}

/// A constraint on a value.
///
/// Exactly one [`RestrictionKind`] is populated per instance; decoding a restriction that
/// carries none or several fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRestriction", into = "RawRestriction")]
pub struct Restriction {
	/// XML schema base type, e.g. `xs:string`.
	pub base: Option<String>,
	/// The constraint itself.
	pub kind: RestrictionKind,
}

impl Restriction {
	/// Creates an enumeration restriction.
	pub fn enumeration<I, S>(values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			base: None,
			kind: RestrictionKind::Enumeration(values.into_iter().map(Into::into).collect()),
		}
	}

	/// Creates a single-pattern restriction.
	pub fn pattern(pattern: impl Into<String>) -> Self {
		Self {
			base: None,
			kind: RestrictionKind::Pattern(vec![pattern.into()]),
		}
	}

	/// Sets the schema base type.
	#[must_use]
	pub fn with_base(mut self, base: impl Into<String>) -> Self {
		self.base = Some(base.into());
		self
	}
}

/// Restriction variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestrictionKind {
	/// Value is one of the listed values.
	Enumeration(Vec<String>),
	/// Value matches one of the listed patterns.
	Pattern(Vec<String>),
	/// Constraint on the value's length.
	Length(LengthBounds),
	/// Numeric range.
	Bounds(NumericBounds),
}

/// Length constraint; any subset of the fields may be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LengthBounds {
	/// Exact length.
	pub exact: Option<String>,
	/// Minimum length.
	pub min: Option<String>,
	/// Maximum length.
	pub max: Option<String>,
}

impl LengthBounds {
	fn is_empty(&self) -> bool {
		self.exact.is_none() && self.min.is_none() && self.max.is_none()
	}
}

/// Numeric range; any non-empty subset of the bounds may be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NumericBounds {
	/// `>=` bound.
	pub min_inclusive: Option<String>,
	/// `<=` bound.
	pub max_inclusive: Option<String>,
	/// `>` bound.
	pub min_exclusive: Option<String>,
	/// `<` bound.
	pub max_exclusive: Option<String>,
}

impl NumericBounds {
	fn is_empty(&self) -> bool {
		self.min_inclusive.is_none()
			&& self.max_inclusive.is_none()
			&& self.min_exclusive.is_none()
			&& self.max_exclusive.is_none()
	}
}

/// Shape errors when decoding a [`Restriction`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RestrictionError {
	/// No constraint kind is populated.
	#[error("restriction carries no constraint")]
	Empty,
	/// Several constraint kinds are populated at once.
	#[error("restriction mixes {0} constraint kinds")]
	Mixed(usize),
}

/// Wire form of a restriction with every constraint field optional.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRestriction {
	#[serde(rename = "@base", default, skip_serializing_if = "Option::is_none")]
	base: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	enumeration: Option<OneOrMany<Item>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pattern: Option<OneOrMany<Item>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	length: Option<OneOrMany<Item>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	min_length: Option<OneOrMany<Item>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	max_length: Option<OneOrMany<Item>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	min_inclusive: Option<OneOrMany<Item>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	max_inclusive: Option<OneOrMany<Item>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	min_exclusive: Option<OneOrMany<Item>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	max_exclusive: Option<OneOrMany<Item>>,
}

/// A single `{"@value": ...}` restriction entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Item {
	#[serde(rename = "@value", deserialize_with = "scalar_text")]
	value: String,
}

fn first(items: Option<OneOrMany<Item>>) -> Option<String> {
	items.and_then(|items| items.into_vec().into_iter().next().map(|item| item.value))
}

fn all(items: Option<OneOrMany<Item>>) -> Option<Vec<String>> {
	items.map(|items| items.into_vec().into_iter().map(|item| item.value).collect())
}

fn one(value: Option<String>) -> Option<OneOrMany<Item>> {
	value.map(|value| OneOrMany::One(Item { value }))
}

fn many(values: Vec<String>) -> Option<OneOrMany<Item>> {
	Some(OneOrMany::Many(values.into_iter().map(|value| Item { value }).collect()))
}

impl TryFrom<RawRestriction> for Restriction {
	type Error = RestrictionError;

	fn try_from(raw: RawRestriction) -> Result<Self, Self::Error> {
		let enumeration = all(raw.enumeration);
		let pattern = all(raw.pattern);
		let length = LengthBounds {
			exact: first(raw.length),
			min: first(raw.min_length),
			max: first(raw.max_length),
		};
		let bounds = NumericBounds {
			min_inclusive: first(raw.min_inclusive),
			max_inclusive: first(raw.max_inclusive),
			min_exclusive: first(raw.min_exclusive),
			max_exclusive: first(raw.max_exclusive),
		};

		let mut kinds = Vec::with_capacity(1);
		if let Some(values) = enumeration {
			kinds.push(RestrictionKind::Enumeration(values));
		}
		if let Some(values) = pattern {
			kinds.push(RestrictionKind::Pattern(values));
		}
		if !length.is_empty() {
			kinds.push(RestrictionKind::Length(length));
		}
		if !bounds.is_empty() {
			kinds.push(RestrictionKind::Bounds(bounds));
		}

		match kinds.len() {
			0 => Err(RestrictionError::Empty),
			1 => Ok(Self {
				base: raw.base,
				kind: kinds.remove(0),
			}),
			n => Err(RestrictionError::Mixed(n)),
		}
	}
}

impl From<Restriction> for RawRestriction {
	fn from(restriction: Restriction) -> Self {
		let mut raw = Self {
			base: restriction.base,
			..Self::default()
		};
		match restriction.kind {
			RestrictionKind::Enumeration(values) => raw.enumeration = many(values),
			RestrictionKind::Pattern(mut values) => {
				raw.pattern = if values.len() == 1 { one(values.pop()) } else { many(values) };
			}
			RestrictionKind::Length(bounds) => {
				raw.length = one(bounds.exact);
				raw.min_length = one(bounds.min);
				raw.max_length = one(bounds.max);
			}
			RestrictionKind::Bounds(bounds) => {
				raw.min_inclusive = one(bounds.min_inclusive);
				raw.max_inclusive = one(bounds.max_inclusive);
				raw.min_exclusive = one(bounds.min_exclusive);
				raw.max_exclusive = one(bounds.max_exclusive);
			}
		}
		raw
	}
}

/// Accepts either a single item or a sequence of items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
	One(T),
	Many(Vec<T>),
}

impl<T> OneOrMany<T> {
	pub(crate) fn into_vec(self) -> Vec<T> {
		match self {
			Self::One(item) => vec![item],
			Self::Many(items) => items,
		}
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
	Text(String),
	Integer(i64),
	Float(f64),
	Bool(bool),
}

/// Deserializes a JSON scalar as text; the engine emits numbers for numeric literals.
pub(crate) fn scalar_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(match Scalar::deserialize(deserializer)? {
		Scalar::Text(s) => s,
		Scalar::Integer(n) => n.to_string(),
		Scalar::Float(n) => n.to_string(),
		Scalar::Bool(b) => b.to_string(),
	})
}

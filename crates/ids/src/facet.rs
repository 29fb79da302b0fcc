//! Facets: the atomic conditions a clause is built from.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::value::Value;

/// Facet kinds, in the order clauses list them.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum FacetKind {
	/// IFC class and predefined type.
	Entity,
	/// Direct IFC attribute.
	Attribute,
	/// Classification reference.
	Classification,
	/// Aggregation/containment relationship.
	PartOf,
	/// Property within a property set.
	Property,
	/// Assigned material.
	Material,
}

/// Whether a requirement must, may, or must not hold.
///
/// Only meaningful for facets inside a requirements clause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Cardinality {
	/// The condition must hold.
	#[default]
	Required,
	/// The condition may hold; when data is present it must match.
	Optional,
	/// The condition must not hold.
	Prohibited,
}

/// Entity facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
	/// IFC class name.
	pub name: Value,
	/// IFC predefined type.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub predefined_type: Option<Value>,
	/// Requirement strength.
	#[serde(rename = "@cardinality", default, skip_serializing_if = "Option::is_none")]
	pub cardinality: Option<Cardinality>,
	/// Author guidance.
	#[serde(rename = "@instructions", default, skip_serializing_if = "Option::is_none")]
	pub instructions: Option<String>,
}

/// Attribute facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
	/// Attribute name.
	pub name: Value,
	/// Attribute value; absent means "any non-empty value".
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<Value>,
	/// Requirement strength.
	#[serde(rename = "@cardinality", default, skip_serializing_if = "Option::is_none")]
	pub cardinality: Option<Cardinality>,
	/// Author guidance.
	#[serde(rename = "@instructions", default, skip_serializing_if = "Option::is_none")]
	pub instructions: Option<String>,
}

/// Classification facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
	/// Classification reference.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<Value>,
	/// Classification system name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub system: Option<Value>,
	/// Reference URI.
	#[serde(rename = "@uri", default, skip_serializing_if = "Option::is_none")]
	pub uri: Option<String>,
	/// Requirement strength.
	#[serde(rename = "@cardinality", default, skip_serializing_if = "Option::is_none")]
	pub cardinality: Option<Cardinality>,
	/// Author guidance.
	#[serde(rename = "@instructions", default, skip_serializing_if = "Option::is_none")]
	pub instructions: Option<String>,
}

/// Property facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
	/// Property set name.
	pub property_set: Value,
	/// Property name.
	pub base_name: Value,
	/// Property value; absent means "any non-empty value".
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<Value>,
	/// IFC measure or value type.
	#[serde(rename = "@dataType", default, skip_serializing_if = "Option::is_none")]
	pub data_type: Option<String>,
	/// Property definition URI.
	#[serde(rename = "@uri", default, skip_serializing_if = "Option::is_none")]
	pub uri: Option<String>,
	/// Requirement strength.
	#[serde(rename = "@cardinality", default, skip_serializing_if = "Option::is_none")]
	pub cardinality: Option<Cardinality>,
	/// Author guidance.
	#[serde(rename = "@instructions", default, skip_serializing_if = "Option::is_none")]
	pub instructions: Option<String>,
}

/// Material facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
	/// Material name or category; absent means "any material".
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<Value>,
	/// Material definition URI.
	#[serde(rename = "@uri", default, skip_serializing_if = "Option::is_none")]
	pub uri: Option<String>,
	/// Requirement strength.
	#[serde(rename = "@cardinality", default, skip_serializing_if = "Option::is_none")]
	pub cardinality: Option<Cardinality>,
	/// Author guidance.
	#[serde(rename = "@instructions", default, skip_serializing_if = "Option::is_none")]
	pub instructions: Option<String>,
}

/// Parent entity referenced by a [`PartOf`] facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartOfEntity {
	/// IFC class of the parent.
	pub name: Value,
	/// Predefined type of the parent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub predefined_type: Option<Value>,
}

/// Part-of facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartOf {
	/// The parent entity.
	pub entity: PartOfEntity,
	/// Relationship class, e.g. `IFCRELAGGREGATES`.
	#[serde(rename = "@relation", default, skip_serializing_if = "Option::is_none")]
	pub relation: Option<String>,
	/// Requirement strength.
	#[serde(rename = "@cardinality", default, skip_serializing_if = "Option::is_none")]
	pub cardinality: Option<Cardinality>,
	/// Author guidance.
	#[serde(rename = "@instructions", default, skip_serializing_if = "Option::is_none")]
	pub instructions: Option<String>,
}

/// One atomic condition of a clause.
///
/// Serializes as its inner facet; the kind is carried by the clause key it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Facet {
	/// See [`Entity`].
	Entity(Entity),
	/// See [`Attribute`].
	Attribute(Attribute),
	/// See [`Classification`].
	Classification(Classification),
	/// See [`PartOf`].
	PartOf(PartOf),
	/// See [`Property`].
	Property(Property),
	/// See [`Material`].
	Material(Material),
}

impl Facet {
	/// The facet's kind.
	pub fn kind(&self) -> FacetKind {
		match self {
			Self::Entity(_) => FacetKind::Entity,
			Self::Attribute(_) => FacetKind::Attribute,
			Self::Classification(_) => FacetKind::Classification,
			Self::PartOf(_) => FacetKind::PartOf,
			Self::Property(_) => FacetKind::Property,
			Self::Material(_) => FacetKind::Material,
		}
	}

	/// Requirement strength, defaulting to [`Cardinality::Required`].
	pub fn cardinality(&self) -> Cardinality {
		let cardinality = match self {
			Self::Entity(f) => f.cardinality,
			Self::Attribute(f) => f.cardinality,
			Self::Classification(f) => f.cardinality,
			Self::PartOf(f) => f.cardinality,
			Self::Property(f) => f.cardinality,
			Self::Material(f) => f.cardinality,
		};
		cardinality.unwrap_or_default()
	}

	/// Author guidance, if any.
	pub fn instructions(&self) -> Option<&str> {
		match self {
			Self::Entity(f) => f.instructions.as_deref(),
			Self::Attribute(f) => f.instructions.as_deref(),
			Self::Classification(f) => f.instructions.as_deref(),
			Self::PartOf(f) => f.instructions.as_deref(),
			Self::Property(f) => f.instructions.as_deref(),
			Self::Material(f) => f.instructions.as_deref(),
		}
	}
}

macro_rules! facet_from {
	($($variant:ident),* $(,)?) => {
		$(
			impl From<$variant> for Facet {
				fn from(facet: $variant) -> Self {
					Self::$variant(facet)
				}
			}
		)*
	};
}

facet_from!(Entity, Attribute, Classification, PartOf, Property, Material);

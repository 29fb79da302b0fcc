//! Clauses and occurrence bounds.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};
use strum::{Display, EnumString};

use crate::document::Usage;
use crate::facet::{Attribute, Classification, Entity, Facet, FacetKind, Material, PartOf, Property};

/// Which half of a specification a clause is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ClauseKind {
	/// Selects the data a specification applies to.
	Applicability,
	/// States what must hold for the selected data.
	Requirements,
}

/// Upper occurrence bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaxOccurs {
	/// No upper bound.
	Unbounded,
	/// At most this many occurrences.
	Bounded(u32),
}

impl Serialize for MaxOccurs {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			Self::Unbounded => serializer.serialize_str("unbounded"),
			Self::Bounded(n) => serializer.serialize_u32(*n),
		}
	}
}

impl<'de> Deserialize<'de> for MaxOccurs {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		match Count::deserialize(deserializer)? {
			Count::Number(n) => Ok(Self::Bounded(n)),
			Count::Text(s) if s == "unbounded" => Ok(Self::Unbounded),
			Count::Text(s) => s
				.parse()
				.map(Self::Bounded)
				.map_err(|_| serde::de::Error::custom(format!("invalid maxOccurs `{s}`"))),
		}
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Count {
	Number(u32),
	Text(String),
}

fn min_occurs<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
	D: Deserializer<'de>,
{
	match Option::<Count>::deserialize(deserializer)? {
		None => Ok(None),
		Some(Count::Number(n)) => Ok(Some(n)),
		Some(Count::Text(s)) => s
			.parse()
			.map(Some)
			.map_err(|_| serde::de::Error::custom(format!("invalid minOccurs `{s}`"))),
	}
}

/// Occurrence bounds of an applicability clause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Occurs {
	/// Lower bound.
	pub min: Option<u32>,
	/// Upper bound.
	pub max: Option<MaxOccurs>,
}

impl Occurs {
	/// Derives the specification usage from the bounds.
	///
	/// `(1, unbounded)` is required, `(0, unbounded)` optional, `(0, 0)` prohibited; every
	/// other combination, including missing bounds, reads as required.
	pub fn usage(&self) -> Usage {
		match (self.min, self.max) {
			(Some(0), Some(MaxOccurs::Unbounded)) => Usage::Optional,
			(Some(0), Some(MaxOccurs::Bounded(0))) => Usage::Prohibited,
			_ => Usage::Required,
		}
	}

	/// Canonical bounds for a usage.
	pub fn for_usage(usage: Usage) -> Self {
		let (min, max) = match usage {
			Usage::Required => (1, MaxOccurs::Unbounded),
			Usage::Optional => (0, MaxOccurs::Unbounded),
			Usage::Prohibited => (0, MaxOccurs::Bounded(0)),
		};
		Self {
			min: Some(min),
			max: Some(max),
		}
	}
}

/// A mapping from facet kind to an ordered sequence of facets.
///
/// Facets stored under a kind always have that kind; order within a kind is audit order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawClause", into = "RawClause")]
pub struct Clause {
	/// Occurrence bounds; only read on applicability clauses.
	pub occurs: Occurs,
	facets: BTreeMap<FacetKind, Vec<Facet>>,
	extra: Map<String, JsonValue>,
}

impl Clause {
	/// Creates an empty clause.
	pub fn new() -> Self {
		Self::default()
	}

	/// Facets of one kind, in audit order.
	pub fn facets(&self, kind: FacetKind) -> &[Facet] {
		self.facets.get(&kind).map_or(&[], Vec::as_slice)
	}

	/// Appends a facet under its own kind and returns its index within that kind.
	pub fn push(&mut self, facet: impl Into<Facet>) -> usize {
		let facet = facet.into();
		let list = self.facets.entry(facet.kind()).or_default();
		list.push(facet);
		list.len() - 1
	}

	/// Removes the facet at `index` within `kind`.
	pub fn remove(&mut self, kind: FacetKind, index: usize) -> Option<Facet> {
		let list = self.facets.get_mut(&kind)?;
		if index >= list.len() {
			return None;
		}
		let facet = list.remove(index);
		if list.is_empty() {
			self.facets.remove(&kind);
		}
		Some(facet)
	}

	/// All facets, grouped by kind in [`FacetKind`] order.
	pub fn iter(&self) -> impl Iterator<Item = &Facet> {
		self.facets.values().flatten()
	}

	/// Total number of facets.
	pub fn len(&self) -> usize {
		self.facets.values().map(Vec::len).sum()
	}

	/// Returns true when the clause holds no facets.
	pub fn is_empty(&self) -> bool {
		self.facets.is_empty()
	}
}

/// Wire form: one optional list per facet kind plus attributes the model does not interpret.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RawClause {
	#[serde(rename = "@minOccurs", default, deserialize_with = "min_occurs", skip_serializing_if = "Option::is_none")]
	min_occurs: Option<u32>,
	#[serde(rename = "@maxOccurs", default, skip_serializing_if = "Option::is_none")]
	max_occurs: Option<MaxOccurs>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	entity: Vec<Entity>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	attribute: Vec<Attribute>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	classification: Vec<Classification>,
	#[serde(rename = "partOf", default, skip_serializing_if = "Vec::is_empty")]
	part_of: Vec<PartOf>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	property: Vec<Property>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	material: Vec<Material>,
	#[serde(flatten)]
	extra: Map<String, JsonValue>,
}

impl From<RawClause> for Clause {
	fn from(raw: RawClause) -> Self {
		let mut clause = Self {
			occurs: Occurs {
				min: raw.min_occurs,
				max: raw.max_occurs,
			},
			facets: BTreeMap::new(),
			extra: raw.extra,
		};
		raw.entity.into_iter().for_each(|f| _ = clause.push(f));
		raw.attribute.into_iter().for_each(|f| _ = clause.push(f));
		raw.classification.into_iter().for_each(|f| _ = clause.push(f));
		raw.part_of.into_iter().for_each(|f| _ = clause.push(f));
		raw.property.into_iter().for_each(|f| _ = clause.push(f));
		raw.material.into_iter().for_each(|f| _ = clause.push(f));
		clause
	}
}

impl From<Clause> for RawClause {
	fn from(clause: Clause) -> Self {
		let mut raw = Self {
			min_occurs: clause.occurs.min,
			max_occurs: clause.occurs.max,
			extra: clause.extra,
			..Self::default()
		};
		for facet in clause.facets.into_values().flatten() {
			match facet {
				Facet::Entity(f) => raw.entity.push(f),
				Facet::Attribute(f) => raw.attribute.push(f),
				Facet::Classification(f) => raw.classification.push(f),
				Facet::PartOf(f) => raw.part_of.push(f),
				Facet::Property(f) => raw.property.push(f),
				Facet::Material(f) => raw.material.push(f),
			}
		}
		raw
	}
}

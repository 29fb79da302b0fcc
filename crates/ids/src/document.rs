//! Documents, their metadata and specifications.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};
use strum::{Display, EnumIter, EnumString};

use crate::clause::{Clause, ClauseKind};
use crate::value::OneOrMany;

/// A rule document: metadata plus an ordered list of specifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
	/// Document metadata.
	#[serde(default)]
	pub info: Info,
	/// Specifications in audit order.
	#[serde(default, with = "specification_list")]
	pub specifications: Vec<Specification>,
	/// Engine fields the model does not interpret, kept for round-trips.
	#[serde(flatten)]
	pub extra: Map<String, JsonValue>,
}

impl Document {
	/// Creates an empty document with the given metadata.
	pub fn new(info: Info) -> Self {
		Self {
			info,
			..Self::default()
		}
	}

	/// Returns the specification at `index`.
	pub fn specification(&self, index: usize) -> Option<&Specification> {
		self.specifications.get(index)
	}
}

/// Document metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
	/// Document title.
	#[serde(default = "untitled")]
	pub title: String,
	/// Copyright holder.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub copyright: Option<String>,
	/// Document version.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,
	/// Free-form description.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// Author contact.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub author: Option<String>,
	/// Issue date.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub date: Option<String>,
	/// Purpose of the exchange.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub purpose: Option<String>,
	/// Project milestone.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub milestone: Option<String>,
	/// Engine fields the model does not interpret.
	#[serde(flatten)]
	pub extra: Map<String, JsonValue>,
}

impl Info {
	/// Metadata with only a title.
	pub fn titled(title: impl Into<String>) -> Self {
		Self {
			title: title.into(),
			..Self::default()
		}
	}
}

impl Default for Info {
	fn default() -> Self {
		Self {
			title: untitled(),
			copyright: None,
			version: None,
			description: None,
			author: None,
			date: None,
			purpose: None,
			milestone: None,
			extra: Map::new(),
		}
	}
}

fn untitled() -> String {
	"Untitled".into()
}

fn unnamed() -> String {
	"Unnamed".into()
}

/// IFC schema versions a specification can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter)]
pub enum IfcVersion {
	/// IFC 2x3.
	#[serde(rename = "IFC2X3")]
	#[strum(serialize = "IFC2X3")]
	Ifc2x3,
	/// IFC 4.
	#[serde(rename = "IFC4")]
	#[strum(serialize = "IFC4")]
	Ifc4,
	/// IFC 4.3 ADD2.
	#[serde(rename = "IFC4X3_ADD2")]
	#[strum(serialize = "IFC4X3_ADD2")]
	Ifc4x3Add2,
}

/// Whether matching data is expected, allowed, or forbidden.
///
/// Derived from the applicability clause's occurrence bounds, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Usage {
	/// At least one match is expected.
	Required,
	/// Matches are allowed.
	Optional,
	/// No match may exist.
	Prohibited,
}

/// One rule: which data it applies to and what must hold for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specification {
	/// Display name.
	#[serde(rename = "@name", default = "unnamed")]
	pub name: String,
	/// Targeted IFC schemas.
	#[serde(rename = "@ifcVersion", default, with = "ifc_versions")]
	pub ifc_version: Vec<IfcVersion>,
	/// Author-assigned identifier.
	#[serde(rename = "@identifier", default, skip_serializing_if = "Option::is_none")]
	pub identifier: Option<String>,
	/// Free-form description.
	#[serde(rename = "@description", default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// Author guidance.
	#[serde(rename = "@instructions", default, skip_serializing_if = "Option::is_none")]
	pub instructions: Option<String>,
	/// Which data the rule applies to.
	#[serde(default)]
	pub applicability: Clause,
	/// What must hold for the selected data.
	#[serde(default)]
	pub requirements: Clause,
	/// Engine fields the model does not interpret.
	#[serde(flatten)]
	pub extra: Map<String, JsonValue>,
}

impl Specification {
	/// Creates an empty specification.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			ifc_version: Vec::new(),
			identifier: None,
			description: None,
			instructions: None,
			applicability: Clause::default(),
			requirements: Clause::default(),
			extra: Map::new(),
		}
	}

	/// Usage derived from the applicability bounds.
	pub fn usage(&self) -> Usage {
		self.applicability.occurs.usage()
	}

	/// The clause of the given kind.
	pub fn clause(&self, kind: ClauseKind) -> &Clause {
		match kind {
			ClauseKind::Applicability => &self.applicability,
			ClauseKind::Requirements => &self.requirements,
		}
	}

	/// Mutable access to the clause of the given kind.
	pub fn clause_mut(&mut self, kind: ClauseKind) -> &mut Clause {
		match kind {
			ClauseKind::Applicability => &mut self.applicability,
			ClauseKind::Requirements => &mut self.requirements,
		}
	}
}

/// `{"specification": [...]}` wrapper used on the wire.
mod specification_list {
	use super::*;

	#[derive(Serialize)]
	struct Wrapper<'a> {
		specification: &'a [Specification],
	}

	#[derive(Deserialize)]
	struct Owned {
		#[serde(default)]
		specification: Option<OneOrMany<Specification>>,
	}

	pub fn serialize<S: Serializer>(specs: &[Specification], serializer: S) -> Result<S::Ok, S::Error> {
		Wrapper { specification: specs }.serialize(serializer)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Specification>, D::Error> {
		let owned = Option::<Owned>::deserialize(deserializer)?;
		Ok(owned
			.and_then(|owned| owned.specification)
			.map(OneOrMany::into_vec)
			.unwrap_or_default())
	}
}

/// Accepts a list or a space separated string; always writes a list.
mod ifc_versions {
	use std::str::FromStr;

	use super::*;

	pub fn serialize<S: Serializer>(versions: &[IfcVersion], serializer: S) -> Result<S::Ok, S::Error> {
		versions.serialize(serializer)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<IfcVersion>, D::Error> {
		match Option::<OneOrMany<String>>::deserialize(deserializer)? {
			None => Ok(Vec::new()),
			Some(raw) => raw
				.into_vec()
				.iter()
				.flat_map(|s| s.split_whitespace())
				.map(|s| {
					IfcVersion::from_str(s)
						.map_err(|_| serde::de::Error::custom(format!("unknown IFC version `{s}`")))
				})
				.collect(),
		}
	}
}

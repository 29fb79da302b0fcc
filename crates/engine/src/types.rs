//! Argument and result shapes of engine calls.

use std::fmt;

use idslab_ids::{Cardinality, FacetKind, IfcVersion, MaxOccurs, Usage, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// IFC class an entity facet gets when none is given.
pub const DEFAULT_ENTITY: &str = "IFCWALL";
/// Attribute an attribute facet gets when none is given.
pub const DEFAULT_ATTRIBUTE: &str = "Name";

/// Handle of a model loaded into the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(pub String);

impl fmt::Display for ModelId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for ModelId {
	fn from(id: &str) -> Self {
		Self(id.to_owned())
	}
}

/// One direct attribute of an IFC class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeInfo {
	/// Attribute name.
	pub name: String,
}

/// A published classification system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationSystem {
	/// Publisher.
	pub source: String,
	/// Separators between code segments, if the system defines any.
	#[serde(default)]
	pub tokens: Option<Vec<String>>,
}

/// Classification systems by name, in engine order.
pub type ClassificationSystems = IndexMap<String, ClassificationSystem>;

/// Result of auditing a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditOutput {
	/// Machine-readable report.
	pub json: JsonValue,
	/// Rendered report, when the engine produces one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub html: Option<String>,
}

/// Options for a new specification. Unset fields take engine defaults.
///
/// An explicit `usage` wins over explicit occurrence bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecificationOptions {
	/// Specification name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Lower occurrence bound.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub min_occurs: Option<u32>,
	/// Upper occurrence bound.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub max_occurs: Option<MaxOccurs>,
	/// Targeted schemas; the engine picks its default schema when unset.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ifc_version: Option<Vec<IfcVersion>>,
	/// Author-assigned identifier.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub identifier: Option<String>,
	/// Free-form description.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// Author guidance.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub instructions: Option<String>,
	/// Usage; sets both occurrence bounds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub usage: Option<Usage>,
}

impl SpecificationOptions {
	/// Options naming the specification and leaving the rest to the engine.
	pub fn named(name: impl Into<String>) -> Self {
		Self {
			name: Some(name.into()),
			..Self::default()
		}
	}
}

macro_rules! facet_options {
	($(#[$meta:meta])* $name:ident { $($(#[$fmeta:meta])* $field:ident : $ty:ty),* $(,)? }) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
		#[serde(rename_all = "camelCase")]
		pub struct $name {
			$(
				$(#[$fmeta])*
				#[serde(default, skip_serializing_if = "Option::is_none")]
				pub $field: Option<$ty>,
			)*
			/// Requirement strength; ignored inside applicability.
			#[serde(default, skip_serializing_if = "Option::is_none")]
			pub cardinality: Option<Cardinality>,
			/// Author guidance.
			#[serde(default, skip_serializing_if = "Option::is_none")]
			pub instructions: Option<String>,
		}
	};
}

facet_options!(
	/// Entity facet options. `name` defaults to [`DEFAULT_ENTITY`].
	EntityOptions {
		/// IFC class.
		name: Value,
		/// IFC predefined type.
		predefined_type: Value,
	}
);

facet_options!(
	/// Attribute facet options. `name` defaults to [`DEFAULT_ATTRIBUTE`].
	AttributeOptions {
		/// Attribute name.
		name: Value,
		/// Required attribute value.
		value: Value,
	}
);

facet_options!(
	/// Classification facet options.
	ClassificationOptions {
		/// Classification reference.
		value: Value,
		/// Classification system.
		system: Value,
		/// Reference URI.
		uri: String,
	}
);

facet_options!(
	/// Part-of facet options. `name` is required.
	PartOfOptions {
		/// Parent IFC class.
		name: Value,
		/// Parent predefined type.
		predefined_type: Value,
		/// IFC relationship linking the two.
		relation: String,
	}
);

facet_options!(
	/// Property facet options. `property_set` and `base_name` are required.
	PropertyOptions {
		/// Property set name.
		property_set: Value,
		/// Property name.
		base_name: Value,
		/// Required property value.
		value: Value,
		/// IFC data type of the value.
		data_type: String,
		/// Property URI.
		uri: String,
	}
);

facet_options!(
	/// Material facet options.
	MaterialOptions {
		/// Material name or category.
		value: Value,
		/// Material URI.
		uri: String,
	}
);

/// Options for any facet kind.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum FacetOptions {
	Entity(EntityOptions),
	Attribute(AttributeOptions),
	Classification(ClassificationOptions),
	PartOf(PartOfOptions),
	Property(PropertyOptions),
	Material(MaterialOptions),
}

impl FacetOptions {
	/// Empty options for `kind`; the engine fills in its defaults.
	pub fn default_for(kind: FacetKind) -> Self {
		match kind {
			FacetKind::Entity => Self::Entity(EntityOptions::default()),
			FacetKind::Attribute => Self::Attribute(AttributeOptions::default()),
			FacetKind::Classification => Self::Classification(ClassificationOptions::default()),
			FacetKind::PartOf => Self::PartOf(PartOfOptions::default()),
			FacetKind::Property => Self::Property(PropertyOptions::default()),
			FacetKind::Material => Self::Material(MaterialOptions::default()),
		}
	}

	/// The kind of facet these options create.
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
}

macro_rules! facet_options_from {
	($($variant:ident($ty:ty)),* $(,)?) => {
		$(
			impl From<$ty> for FacetOptions {
				fn from(options: $ty) -> Self {
					Self::$variant(options)
				}
			}
		)*
	};
}

facet_options_from!(
	Entity(EntityOptions),
	Attribute(AttributeOptions),
	Classification(ClassificationOptions),
	PartOf(PartOfOptions),
	Property(PropertyOptions),
	Material(MaterialOptions),
);

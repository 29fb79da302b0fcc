//! The engine's call surface.
//!
//! Each remote procedure is a struct implementing [`Method`]: its fields are the argument object,
//! its `Output` the decoded response. Outputs that carry rule-document fragments decode through
//! [`Normalized`], since the engine answers in the schema convention.
//!
//! [`EngineCall`] is the closed union of all of them, serialized exactly like a call payload
//! (`{"method": ..., "args": {...}}`), so the host can dispatch exhaustively.

use idslab_ids::{
	Attribute, Classification, ClauseKind, Document, Entity, FacetKind, IfcVersion, Info, Material, Normalized,
	PartOf, Property, Specification,
};
pub use idslab_rpc::Cleanup;
use idslab_rpc::Method;
use serde::{Deserialize, Serialize};

use crate::types::{
	AttributeInfo, AttributeOptions, AuditOutput, ClassificationOptions, ClassificationSystems, EntityOptions,
	MaterialOptions, ModelId, PartOfOptions, PropertyOptions, SpecificationOptions,
};

macro_rules! engine_calls {
	($(
		$(#[$meta:meta])*
		$name:ident $wire:literal -> $output:ty {
			$($(#[$fmeta:meta])* $field:ident : $fty:ty),* $(,)?
		}
	)*) => {
		$(
			$(#[$meta])*
			#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
			#[serde(rename_all = "camelCase")]
			pub struct $name {
				$(
					#[allow(missing_docs)]
					$(#[$fmeta])*
					pub $field: $fty,
				)*
			}

			impl Method for $name {
				const NAME: &'static str = $wire;
				type Output = $output;
			}

			impl From<$name> for EngineCall {
				fn from(call: $name) -> Self {
					Self::$name(call)
				}
			}
		)*

		/// Every call the host understands.
		#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
		#[serde(tag = "method", content = "args")]
		#[allow(missing_docs)]
		pub enum EngineCall {
			$(
				#[serde(rename = $wire)]
				$name($name),
			)*
			#[serde(rename = "internal.cleanup")]
			Cleanup(Cleanup),
		}

		impl EngineCall {
			/// Wire name of the call.
			pub fn name(&self) -> &'static str {
				match self {
					$(Self::$name(_) => <$name as Method>::NAME,)*
					Self::Cleanup(_) => <Cleanup as Method>::NAME,
				}
			}
		}
	};
}

impl From<Cleanup> for EngineCall {
	fn from(call: Cleanup) -> Self {
		Self::Cleanup(call)
	}
}

engine_calls! {
	/// IFC classes defined by a schema.
	GetAllEntityClasses "getAllEntityClasses" -> Vec<String> { schema: IfcVersion }

	/// Data types defined by a schema.
	GetAllDataTypes "getAllDataTypes" -> Vec<String> { schema: IfcVersion }

	/// Predefined types of an IFC class.
	GetPredefinedTypes "getPredefinedTypes" -> Vec<String> { schema: IfcVersion, entity: String }

	/// Direct attributes of an IFC class.
	GetEntityAttributes "getEntityAttributes" -> Vec<AttributeInfo> { schema: IfcVersion, entity: String }

	/// Standard property sets applicable to an IFC class.
	GetApplicablePsets "getApplicablePsets" -> Vec<String> {
		schema: IfcVersion,
		entity: String,
		#[serde(default)]
		predefined_type: String,
	}

	/// Material category names.
	GetMaterialCategories "getMaterialCategories" -> Vec<String> {}

	/// Well-known classification systems.
	GetStandardClassificationSystems "getStandardClassificationSystems" -> ClassificationSystems {}

	/// Loads an IFC model into the host.
	LoadIfc "loadIfc" -> ModelId {
		name: String,
		#[serde(with = "base64_bytes")]
		bytes: Vec<u8>,
	}

	/// Releases a loaded model. Returns false for unknown models.
	UnloadIfc "unloadIfc" -> bool { model: ModelId }

	/// Audits a loaded model against an IDS document given as XML.
	AuditIfc "auditIfc" -> AuditOutput { model: ModelId, ids: String }

	/// Creates an empty document.
	CreateIds "createIDS" -> Normalized<Document> { info: Info }

	/// Parses IDS XML, optionally validating it against the IDS schema.
	OpenIds "openIDS" -> Normalized<Document> { xml: String, validate: bool }

	/// Validates a document against the IDS schema.
	ValidateIds "validateIDS" -> bool { document: Document }

	/// Serializes a document to IDS XML.
	ExportIds "exportIDS" -> String { document: Document }

	/// Builds a new specification.
	CreateSpecification "createSpecification" -> Normalized<Specification> { options: SpecificationOptions }

	/// Removes the specification at `index`.
	DeleteSpecification "deleteSpecification" -> Normalized<Document> { document: Document, index: usize }

	/// Builds an entity facet for a clause.
	CreateEntityFacet "createEntityFacet" -> Normalized<Entity> { clause: ClauseKind, options: EntityOptions }

	/// Builds an attribute facet for a clause.
	CreateAttributeFacet "createAttributeFacet" -> Normalized<Attribute> {
		clause: ClauseKind,
		options: AttributeOptions,
	}

	/// Builds a classification facet for a clause.
	CreateClassificationFacet "createClassificationFacet" -> Normalized<Classification> {
		clause: ClauseKind,
		options: ClassificationOptions,
	}

	/// Builds a property facet for a clause.
	CreatePropertyFacet "createPropertyFacet" -> Normalized<Property> {
		clause: ClauseKind,
		options: PropertyOptions,
	}

	/// Builds a material facet for a clause.
	CreateMaterialFacet "createMaterialFacet" -> Normalized<Material> {
		clause: ClauseKind,
		options: MaterialOptions,
	}

	/// Builds a part-of facet for a clause.
	CreatePartOfFacet "createPartOfFacet" -> Normalized<PartOf> { clause: ClauseKind, options: PartOfOptions }

	/// Removes the `index`th facet of `kind` from a clause of `specification`.
	DeleteFacet "deleteFacet" -> Normalized<Specification> {
		specification: Specification,
		clause: ClauseKind,
		kind: FacetKind,
		index: usize,
	}
}

mod base64_bytes {
	use base64::Engine as _;
	use base64::engine::general_purpose::STANDARD;
	use serde::de::Error as _;
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&STANDARD.encode(bytes))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
		let text = String::deserialize(deserializer)?;
		STANDARD.decode(text).map_err(D::Error::custom)
	}
}

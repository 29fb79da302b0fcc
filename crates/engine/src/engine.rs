//! The engine trait implemented inside an execution host.

use async_trait::async_trait;
use idslab_ids::{ClauseKind, Document, FacetKind, IfcVersion, Info, Specification};
use idslab_rpc::ErrorPayload;
use serde_json::Value as JsonValue;

use crate::types::{AttributeInfo, AuditOutput, ClassificationSystems, FacetOptions, ModelId, SpecificationOptions};

/// Failure reported by an engine; travels to the caller as an `error` envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
	/// Human-readable message.
	pub message: String,
	/// Engine-side trace, if any.
	pub stack: Option<String>,
}

impl EngineError {
	/// An error without a trace.
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			stack: None,
		}
	}
}

impl From<serde_json::Error> for EngineError {
	fn from(e: serde_json::Error) -> Self {
		Self::new(e.to_string())
	}
}

impl From<EngineError> for ErrorPayload {
	fn from(e: EngineError) -> Self {
		Self {
			message: e.message,
			stack: e.stack,
		}
	}
}

/// Engine result type.
pub type EngineResult<T> = Result<T, EngineError>;

/// An IDS/IFC engine.
///
/// Methods returning [`JsonValue`] hand back the engine's own serialization of a rule document
/// fragment; it is sent to the client as is and normalized there.
///
/// The host calls [`init`](Self::init) once before anything else and may run the other methods
/// concurrently afterwards.
#[async_trait]
pub trait AuditEngine: Send + Sync + 'static {
	/// Prepares the engine. May take a long time.
	async fn init(&self) -> EngineResult<()>;

	/// Releases engine resources. Called before the host goes away.
	async fn cleanup(&self) -> EngineResult<()>;

	/// IFC classes defined by `schema`.
	async fn entity_classes(&self, schema: IfcVersion) -> EngineResult<Vec<String>>;

	/// Data types defined by `schema`.
	async fn data_types(&self, schema: IfcVersion) -> EngineResult<Vec<String>>;

	/// Predefined types of `entity`.
	async fn predefined_types(&self, schema: IfcVersion, entity: &str) -> EngineResult<Vec<String>>;

	/// Direct attributes of `entity`.
	async fn entity_attributes(&self, schema: IfcVersion, entity: &str) -> EngineResult<Vec<AttributeInfo>>;

	/// Property sets applicable to `entity`, narrowed by `predefined_type` when not empty.
	async fn applicable_psets(
		&self,
		schema: IfcVersion,
		entity: &str,
		predefined_type: &str,
	) -> EngineResult<Vec<String>>;

	/// Material category names.
	async fn material_categories(&self) -> EngineResult<Vec<String>>;

	/// Well-known classification systems.
	async fn classification_systems(&self) -> EngineResult<ClassificationSystems>;

	/// Loads a model and returns its handle.
	async fn load_ifc(&self, name: &str, bytes: Vec<u8>) -> EngineResult<ModelId>;

	/// Releases a model; false if it was not loaded.
	async fn unload_ifc(&self, model: &ModelId) -> EngineResult<bool>;

	/// Audits `model` against the IDS document `ids_xml`.
	async fn audit_ifc(&self, model: &ModelId, ids_xml: &str) -> EngineResult<AuditOutput>;

	/// Creates an empty document.
	async fn create_ids(&self, info: Info) -> EngineResult<JsonValue>;

	/// Parses IDS XML.
	async fn open_ids(&self, xml: &str, validate: bool) -> EngineResult<JsonValue>;

	/// Validates a document against the IDS schema.
	async fn validate_ids(&self, document: Document) -> EngineResult<bool>;

	/// Serializes a document to IDS XML.
	async fn export_ids(&self, document: Document) -> EngineResult<String>;

	/// Builds a specification.
	async fn create_specification(&self, options: SpecificationOptions) -> EngineResult<JsonValue>;

	/// Removes a specification and returns the resulting document.
	async fn delete_specification(&self, document: Document, index: usize) -> EngineResult<JsonValue>;

	/// Builds a facet for a clause of kind `clause`.
	async fn create_facet(&self, clause: ClauseKind, options: FacetOptions) -> EngineResult<JsonValue>;

	/// Removes a facet and returns the resulting specification.
	async fn delete_facet(
		&self,
		specification: Specification,
		clause: ClauseKind,
		kind: FacetKind,
		index: usize,
	) -> EngineResult<JsonValue>;
}

//! The editing session.

use std::fmt;
use std::sync::Arc;

use idslab_engine::calls::{
	AuditIfc, CreateAttributeFacet, CreateClassificationFacet, CreateEntityFacet, CreateIds, CreateMaterialFacet,
	CreatePartOfFacet, CreatePropertyFacet, CreateSpecification, DeleteFacet, DeleteSpecification, ExportIds,
	GetAllDataTypes, GetApplicablePsets, GetEntityAttributes, GetPredefinedTypes, LoadIfc, OpenIds, UnloadIfc,
	ValidateIds,
};
use idslab_engine::{AttributeInfo, FacetOptions, ModelId, SpecificationOptions};
use idslab_ids::{ClauseKind, Document, Facet, FacetKind, IfcVersion, Info, Specification, describe};
use idslab_rpc::RpcClient;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::autocomplete::{AutocompleteCache, Autocompletions};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::report::AuditReport;


/// Session-local document handle. Never reused within a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DocumentId(u64);

impl DocumentId {
	#[cfg(test)]
	pub(crate) fn from_raw(id: u64) -> Self {
		Self(id)
	}
}

impl fmt::Display for DocumentId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "doc-{}", self.0)
	}
}

/// A model loaded into the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModel {
	/// Engine handle.
	pub id: ModelId,
	/// File name.
	pub name: String,
	/// Size in bytes.
	pub size: usize,
}

/// The document being edited and, within it, the selected specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveSelection {
	/// Active document.
	pub document: DocumentId,
	/// Selected specification, if the document has any.
	pub specification: Option<usize>,
}

/// Documents, models and reports of one session.
pub struct Workspace {
	client: RpcClient,
	documents: IndexMap<DocumentId, Document>,
	next_document: u64,
	active: Option<ActiveSelection>,
	models: IndexMap<ModelId, LoadedModel>,
	active_model: Option<ModelId>,
	/// Newest first.
	reports: Vec<AuditReport>,
	autocomplete: AutocompleteCache,
}

impl fmt::Debug for Workspace {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Workspace")
			.field("documents", &self.documents.len())
			.field("active", &self.active)
			.field("models", &self.models.len())
			.field("reports", &self.reports.len())
			.finish_non_exhaustive()
	}
}

impl Workspace {
	/// Creates an empty workspace talking to the engine through `client`.
	pub fn new(client: RpcClient, autocomplete_schemas: Vec<IfcVersion>) -> Self {
		Self {
			client,
			documents: IndexMap::new(),
			next_document: 1,
			active: None,
			models: IndexMap::new(),
			active_model: None,
			reports: Vec::new(),
			autocomplete: AutocompleteCache::new(autocomplete_schemas),
		}
	}

	/// Creates a workspace whose host process is described by `config`.
	pub fn from_config(config: &AppConfig) -> Self {
		let client = RpcClient::with_options(config.launcher(), config.client_options());
		Self::new(client, config.autocomplete_schemas.clone())
	}

	/// The engine client.
	pub fn client(&self) -> &RpcClient {
		&self.client
	}

	/// Open documents in creation order.
	pub fn documents(&self) -> impl Iterator<Item = (DocumentId, &Document)> {
		self.documents.iter().map(|(id, doc)| (*id, doc))
	}

	/// The document with this id.
	pub fn document(&self, id: DocumentId) -> Option<&Document> {
		self.documents.get(&id)
	}

	/// Current selection.
	pub fn active(&self) -> Option<ActiveSelection> {
		self.active
	}

	/// The active document.
	pub fn active_document(&self) -> Option<&Document> {
		self.active.and_then(|active| self.documents.get(&active.document))
	}

	/// The selected specification of the active document.
	pub fn active_specification(&self) -> Option<&Specification> {
		let active = self.active?;
		self.documents.get(&active.document)?.specification(active.specification?)
	}

	/// Loaded models in load order.
	pub fn models(&self) -> impl Iterator<Item = &LoadedModel> {
		self.models.values()
	}

	/// The model audits run against.
	pub fn active_model(&self) -> Option<&LoadedModel> {
		self.active_model.as_ref().and_then(|id| self.models.get(id))
	}

	/// Audit reports, newest first.
	pub fn reports(&self) -> &[AuditReport] {
		&self.reports
	}

	/// Makes `id` the active document, selecting its first specification.
	///
	/// # Errors
	///
	/// [`Error::UnknownDocument`] if no such document is open.
	pub fn activate_document(&mut self, id: DocumentId) -> Result<()> {
		let doc = self.documents.get(&id).ok_or(Error::UnknownDocument(id))?;
		self.active = Some(ActiveSelection {
			document: id,
			specification: (!doc.specifications.is_empty()).then_some(0),
		});
		Ok(())
	}

	/// Selects a specification of the active document.
	///
	/// # Errors
	///
	/// Fails without an active document or when `index` is out of range.
	pub fn select_specification(&mut self, index: usize) -> Result<()> {
		let (id, doc) = self.active_entry()?;
		check_specification(doc, index)?;
		self.active = Some(ActiveSelection {
			document: id,
			specification: Some(index),
		});
		Ok(())
	}

	/// Creates an empty document and makes it active.
	///
	/// # Errors
	///
	/// Returns the engine error if the call fails.
	pub async fn create_document(&mut self, info: Info) -> Result<DocumentId> {
		let doc = self.client.call(&CreateIds { info }).await?.into_inner();
		Ok(self.insert_document(doc))
	}

	/// Parses IDS XML into a new active document.
	///
	/// # Errors
	///
	/// Returns the engine error if parsing or validation fails.
	pub async fn open_document(&mut self, xml: impl Into<String>, validate: bool) -> Result<DocumentId> {
		let doc = self
			.client
			.call(&OpenIds {
				xml: xml.into(),
				validate,
			})
			.await?
			.into_inner();
		Ok(self.insert_document(doc))
	}

	/// Serializes a document to IDS XML.
	///
	/// # Errors
	///
	/// Fails for unknown documents or when the engine call fails.
	pub async fn export_document(&self, id: DocumentId) -> Result<String> {
		let document = self.documents.get(&id).ok_or(Error::UnknownDocument(id))?.clone();
		Ok(self.client.call(&ExportIds { document }).await?)
	}

	/// Checks a document against the IDS schema.
	///
	/// # Errors
	///
	/// Fails for unknown documents or when the engine call fails.
	pub async fn validate_document(&self, id: DocumentId) -> Result<bool> {
		let document = self.documents.get(&id).ok_or(Error::UnknownDocument(id))?.clone();
		Ok(self.client.call(&ValidateIds { document }).await?)
	}

	/// Closes a document, discarding its audit reports.
	///
	/// # Errors
	///
	/// [`Error::UnknownDocument`] if no such document is open.
	pub fn delete_document(&mut self, id: DocumentId) -> Result<Document> {
		let doc = self.documents.shift_remove(&id).ok_or(Error::UnknownDocument(id))?;
		self.reports.retain(|report| report.document != id);
		if self.active.is_some_and(|active| active.document == id) {
			self.active = None;
		}
		info!(document = %id, "document closed");
		Ok(doc)
	}

	/// Appends a specification to the active document and selects it.
	///
	/// # Errors
	///
	/// Fails without an active document or when the engine call fails.
	pub async fn create_specification(&mut self, options: SpecificationOptions) -> Result<usize> {
		let (id, _) = self.active_entry()?;
		let spec = self.client.call(&CreateSpecification { options }).await?.into_inner();
		let doc = self.documents.get_mut(&id).ok_or(Error::UnknownDocument(id))?;
		doc.specifications.push(spec);
		let index = doc.specifications.len() - 1;
		self.active = Some(ActiveSelection {
			document: id,
			specification: Some(index),
		});
		Ok(index)
	}

	/// Removes a specification from the active document.
	///
	/// The selection keeps naming the same specification when an earlier one is removed. Removing
	/// the selected one selects the first remaining specification.
	///
	/// # Errors
	///
	/// Fails without an active document, for an out of range index, or when the engine call fails.
	pub async fn delete_specification(&mut self, index: usize) -> Result<()> {
		let (id, doc) = self.active_entry()?;
		check_specification(doc, index)?;
		let document = doc.clone();
		let updated = self
			.client
			.call(&DeleteSpecification { document, index })
			.await?
			.into_inner();

		let selected = self.active.and_then(|active| active.specification);
		let remaining = updated.specifications.len();
		self.documents.insert(id, updated);
		let specification = match selected {
			Some(current) if current == index => (remaining > 0).then_some(0),
			Some(current) if current > index => Some(current - 1),
			other => other,
		};
		self.active = Some(ActiveSelection {
			document: id,
			specification,
		});
		debug!(document = %id, index, "specification deleted");
		Ok(())
	}

	/// Creates a facet in a clause of a specification of the active document.
	///
	/// Returns the facet's index among facets of its kind.
	///
	/// # Errors
	///
	/// Fails without an active document, for an out of range index, or when the engine call fails.
	pub async fn create_facet(
		&mut self,
		spec_index: usize,
		clause: ClauseKind,
		options: FacetOptions,
	) -> Result<usize> {
		let (id, doc) = self.active_entry()?;
		let mut spec = check_specification(doc, spec_index)?.clone();
		let facet = self.build_facet(clause, options).await?;
		let index = spec.clause_mut(clause).push(facet);
		self.replace_specification(id, spec_index, spec)?;
		Ok(index)
	}

	/// Removes a facet from a clause of a specification of the active document.
	///
	/// # Errors
	///
	/// Fails without an active document, for out of range indices, or when the engine call fails.
	pub async fn delete_facet(
		&mut self,
		spec_index: usize,
		clause: ClauseKind,
		kind: FacetKind,
		index: usize,
	) -> Result<()> {
		let (id, doc) = self.active_entry()?;
		let spec = check_specification(doc, spec_index)?;
		if index >= spec.clause(clause).facets(kind).len() {
			return Err(Error::FacetOutOfRange { clause, kind, index });
		}
		let updated = self
			.client
			.call(&DeleteFacet {
				specification: spec.clone(),
				clause,
				kind,
				index,
			})
			.await?
			.into_inner();
		self.replace_specification(id, spec_index, updated)
	}

	/// Renders a facet of the active document as a sentence.
	///
	/// # Errors
	///
	/// Fails without an active document or for out of range indices.
	pub fn describe_facet(
		&self,
		spec_index: usize,
		clause: ClauseKind,
		kind: FacetKind,
		index: usize,
	) -> Result<String> {
		let (_, doc) = self.active_entry()?;
		let spec = check_specification(doc, spec_index)?;
		let facet = spec
			.clause(clause)
			.facets(kind)
			.get(index)
			.ok_or(Error::FacetOutOfRange { clause, kind, index })?;
		Ok(describe(clause, facet, spec))
	}

	/// Loads a model into the host and makes it the audit target.
	///
	/// # Errors
	///
	/// Returns the engine error if loading fails.
	pub async fn load_model(&mut self, name: impl Into<String>, bytes: Vec<u8>) -> Result<ModelId> {
		let name = name.into();
		let size = bytes.len();
		let id = self
			.client
			.call(&LoadIfc {
				name: name.clone(),
				bytes,
			})
			.await?;
		info!(model = %id, %name, size, "model loaded");
		self.models.insert(
			id.clone(),
			LoadedModel {
				id: id.clone(),
				name,
				size,
			},
		);
		self.active_model = Some(id.clone());
		Ok(id)
	}

	/// Makes a loaded model the audit target.
	///
	/// # Errors
	///
	/// [`Error::UnknownModel`] if it is not loaded.
	pub fn select_model(&mut self, id: &ModelId) -> Result<()> {
		if !self.models.contains_key(id) {
			return Err(Error::UnknownModel(id.clone()));
		}
		self.active_model = Some(id.clone());
		Ok(())
	}

	/// Releases a model. The most recently loaded remaining model becomes the audit target if
	/// the released one was.
	///
	/// # Errors
	///
	/// Fails for unknown models or when the engine call fails.
	pub async fn unload_model(&mut self, id: &ModelId) -> Result<()> {
		if !self.models.contains_key(id) {
			return Err(Error::UnknownModel(id.clone()));
		}
		let released = self.client.call(&UnloadIfc { model: id.clone() }).await?;
		if !released {
			debug!(model = %id, "host had already released model");
		}
		self.models.shift_remove(id);
		if self.active_model.as_ref() == Some(id) {
			self.active_model = self.models.keys().last().cloned();
		}
		Ok(())
	}

	/// Audits the active model against the active document and records the report.
	///
	/// # Errors
	///
	/// Fails without a model or a non-empty active document, when an engine call fails, or when
	/// the report is malformed.
	pub async fn audit(&mut self) -> Result<&AuditReport> {
		let model = self.active_model().ok_or(Error::NoModel)?.clone();
		let (id, doc) = self.active_entry()?;
		if doc.specifications.is_empty() {
			return Err(Error::EmptyDocument);
		}
		let ids = self.client.call(&ExportIds { document: doc.clone() }).await?;
		let output = self
			.client
			.call(&AuditIfc {
				model: model.id.clone(),
				ids,
			})
			.await?;
		let report = AuditReport::from_output(output, model.name, id)?;
		info!(
			document = %id,
			model = %model.id,
			passed = report.data.passed(),
			total = report.data.specifications.len(),
			"audit finished"
		);
		self.reports.insert(0, report);
		Ok(&self.reports[0])
	}

	/// Drops all reports of a document.
	pub fn clear_reports(&mut self, id: DocumentId) {
		self.reports.retain(|report| report.document != id);
	}

	/// Autocompletion data, fetched on first use.
	///
	/// # Errors
	///
	/// Returns the engine error if fetching fails; the next request retries.
	pub async fn autocompletions(&self) -> Result<Arc<Autocompletions>> {
		self.autocomplete.get(&self.client).await
	}

	/// Data types of `schema`.
	///
	/// # Errors
	///
	/// Returns the engine error.
	pub async fn data_types(&self, schema: IfcVersion) -> Result<Vec<String>> {
		Ok(self.client.call(&GetAllDataTypes { schema }).await?)
	}

	/// Predefined types of an IFC class.
	///
	/// # Errors
	///
	/// Returns the engine error.
	pub async fn predefined_types(&self, schema: IfcVersion, entity: &str) -> Result<Vec<String>> {
		let entity = entity.to_owned();
		Ok(self.client.call(&GetPredefinedTypes { schema, entity }).await?)
	}

	/// Direct attributes of an IFC class.
	///
	/// # Errors
	///
	/// Returns the engine error.
	pub async fn entity_attributes(&self, schema: IfcVersion, entity: &str) -> Result<Vec<AttributeInfo>> {
		let entity = entity.to_owned();
		Ok(self.client.call(&GetEntityAttributes { schema, entity }).await?)
	}

	/// Property sets applicable to an IFC class.
	///
	/// # Errors
	///
	/// Returns the engine error.
	pub async fn applicable_psets(
		&self,
		schema: IfcVersion,
		entity: &str,
		predefined_type: Option<&str>,
	) -> Result<Vec<String>> {
		let call = GetApplicablePsets {
			schema,
			entity: entity.to_owned(),
			predefined_type: predefined_type.unwrap_or_default().to_owned(),
		};
		Ok(self.client.call(&call).await?)
	}

	/// Disposes the engine client.
	pub async fn shutdown(&self) {
		self.client.dispose().await;
	}

	fn insert_document(&mut self, doc: Document) -> DocumentId {
		let id = DocumentId(self.next_document);
		self.next_document += 1;
		let specification = (!doc.specifications.is_empty()).then_some(0);
		info!(document = %id, title = %doc.info.title, "document opened");
		self.documents.insert(id, doc);
		self.active = Some(ActiveSelection {
			document: id,
			specification,
		});
		id
	}

	fn active_entry(&self) -> Result<(DocumentId, &Document)> {
		let id = self.active.ok_or(Error::NoActiveDocument)?.document;
		let doc = self.documents.get(&id).ok_or(Error::UnknownDocument(id))?;
		Ok((id, doc))
	}

	fn replace_specification(&mut self, id: DocumentId, index: usize, spec: Specification) -> Result<()> {
		let doc = self.documents.get_mut(&id).ok_or(Error::UnknownDocument(id))?;
		let len = doc.specifications.len();
		let slot = doc
			.specifications
			.get_mut(index)
			.ok_or(Error::SpecificationOutOfRange { index, len })?;
		*slot = spec;
		Ok(())
	}

	async fn build_facet(&self, clause: ClauseKind, options: FacetOptions) -> Result<Facet> {
		let client = &self.client;
		Ok(match options {
			FacetOptions::Entity(options) => client.call(&CreateEntityFacet { clause, options }).await?.0.into(),
			FacetOptions::Attribute(options) => client.call(&CreateAttributeFacet { clause, options }).await?.0.into(),
			FacetOptions::Classification(options) => {
				client.call(&CreateClassificationFacet { clause, options }).await?.0.into()
			}
			FacetOptions::PartOf(options) => client.call(&CreatePartOfFacet { clause, options }).await?.0.into(),
			FacetOptions::Property(options) => client.call(&CreatePropertyFacet { clause, options }).await?.0.into(),
			FacetOptions::Material(options) => client.call(&CreateMaterialFacet { clause, options }).await?.0.into(),
		})
	}
}

fn check_specification(doc: &Document, index: usize) -> Result<&Specification> {
	doc.specification(index).ok_or(Error::SpecificationOutOfRange {
		index,
		len: doc.specifications.len(),
	})
}

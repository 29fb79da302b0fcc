//! Deterministic in-memory engine.
//!
//! [`StubEngine`] answers every call from fixed tables and keeps loaded models in memory. "IDS XML"
//! is the document's schema-convention JSON wrapped in an `<ids>` element, which is enough for
//! export/open round trips. Tests can hold initialization or audits open, inject failures per
//! method and mark specifications as failing.
//!
//! Clones share state, so a test can keep a handle to the engine a host is serving.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use idslab_ids::{
	Attribute, Cardinality, Classification, ClauseKind, Document, Entity, Facet, FacetKind, IfcVersion, Info,
	Material, MaxOccurs, Normalized, Occurs, PartOf, PartOfEntity, Property, Specification, Usage, Value,
	denormalize,
};
use idslab_rpc::Method;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tokio::sync::watch;

use crate::calls::{
	AuditIfc, CreateAttributeFacet, CreateClassificationFacet, CreateEntityFacet, CreateIds, CreateMaterialFacet,
	CreatePartOfFacet, CreatePropertyFacet, CreateSpecification, DeleteFacet, DeleteSpecification, ExportIds,
	GetAllDataTypes, GetAllEntityClasses, GetApplicablePsets, GetEntityAttributes, GetMaterialCategories,
	GetPredefinedTypes, GetStandardClassificationSystems, LoadIfc, OpenIds, UnloadIfc, ValidateIds,
};
use crate::engine::{AuditEngine, EngineError, EngineResult};
use crate::types::{
	AttributeInfo, AuditOutput, ClassificationSystem, ClassificationSystems, DEFAULT_ATTRIBUTE, DEFAULT_ENTITY,
	FacetOptions, ModelId, SpecificationOptions,
};

/// Key for [`StubEngine::fail`] targeting initialization.
pub const INIT: &str = "init";
/// Key for [`StubEngine::fail`] targeting cleanup.
pub const CLEANUP: &str = "cleanup";

const XML_OPEN: &str = "<ids xmlns=\"http://standards.buildingsmart.org/IDS\"><![CDATA[";
const XML_CLOSE: &str = "]]></ids>";

const CLASSES_2X3: &[&str] = &[
	"IfcBeam",
	"IfcBuildingElementProxy",
	"IfcColumn",
	"IfcDoor",
	"IfcSlab",
	"IfcWall",
	"IfcWallStandardCase",
	"IfcWindow",
];
const CLASSES_4: &[&str] = &[
	"IfcWall",
	"IfcBeam",
	"IfcBuildingElementProxy",
	"IfcBuildingStorey",
	"IfcColumn",
	"IfcDoor",
	"IfcPipeSegment",
	"IfcSlab",
	"IfcWindow",
];
const CLASSES_4X3: &[&str] = &["IfcBearing", "IfcCourse", "IfcEarthworksFill"];

const DATA_TYPES: &[&str] = &[
	"IFCBOOLEAN",
	"IFCIDENTIFIER",
	"IFCINTEGER",
	"IFCLABEL",
	"IFCLENGTHMEASURE",
	"IFCLOGICAL",
	"IFCREAL",
	"IFCTEXT",
];

const WALL_TYPES: &[&str] = &[
	"ELEMENTEDWALL",
	"MOVABLE",
	"PARAPET",
	"PARTITIONING",
	"PLUMBINGWALL",
	"POLYGONAL",
	"SHEAR",
	"SOLIDWALL",
	"STANDARD",
	"USERDEFINED",
	"NOTDEFINED",
];

const ROOT_ATTRIBUTES: &[&str] = &[
	"GlobalId",
	"OwnerHistory",
	"Name",
	"Description",
	"ObjectType",
	"ObjectPlacement",
	"Representation",
	"Tag",
];

const MATERIAL_CATEGORIES: &[&str] = &[
	"concrete",
	"steel",
	"aluminium",
	"block",
	"brick",
	"stone",
	"wood",
	"glass",
	"gypsum",
	"plastic",
	"earth",
];

/// A model held by the stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModel {
	/// File name given at load time.
	pub name: String,
	/// Size of the loaded bytes.
	pub size: usize,
}

struct State {
	init_calls: AtomicUsize,
	cleanup_calls: AtomicUsize,
	init_gate: watch::Sender<bool>,
	audit_gate: watch::Sender<bool>,
	failures: Mutex<HashMap<String, String>>,
	failing_specs: Mutex<HashSet<String>>,
	panics: Mutex<HashSet<String>>,
	models: Mutex<IndexMap<ModelId, LoadedModel>>,
	next_model: AtomicUsize,
}

impl Default for State {
	fn default() -> Self {
		Self {
			init_calls: AtomicUsize::new(0),
			cleanup_calls: AtomicUsize::new(0),
			init_gate: watch::channel(true).0,
			audit_gate: watch::channel(true).0,
			failures: Mutex::new(HashMap::new()),
			failing_specs: Mutex::new(HashSet::new()),
			panics: Mutex::new(HashSet::new()),
			models: Mutex::new(IndexMap::new()),
			next_model: AtomicUsize::new(1),
		}
	}
}

/// Deterministic in-memory [`AuditEngine`].
#[derive(Clone, Default)]
pub struct StubEngine {
	state: Arc<State>,
}

impl std::fmt::Debug for StubEngine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StubEngine")
			.field("init_calls", &self.init_count())
			.field("models", &self.state.models.lock().len())
			.finish_non_exhaustive()
	}
}

impl StubEngine {
	/// Creates an engine with open gates and no injected failures.
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of `init` calls that reached the engine.
	pub fn init_count(&self) -> usize {
		self.state.init_calls.load(Ordering::SeqCst)
	}

	/// Number of `cleanup` calls that reached the engine.
	pub fn cleanup_count(&self) -> usize {
		self.state.cleanup_calls.load(Ordering::SeqCst)
	}

	/// Makes `init` wait until [`release_init`](Self::release_init).
	pub fn hold_init(&self) {
		self.state.init_gate.send_replace(false);
	}

	/// Lets held and future `init` calls finish.
	pub fn release_init(&self) {
		self.state.init_gate.send_replace(true);
	}

	/// Makes `auditIfc` wait until [`release_audits`](Self::release_audits).
	pub fn block_audits(&self) {
		self.state.audit_gate.send_replace(false);
	}

	/// Lets held and future audits finish.
	pub fn release_audits(&self) {
		self.state.audit_gate.send_replace(true);
	}

	/// Makes the operation named `op` fail with `message`.
	///
	/// `op` is a call's wire name, [`INIT`] or [`CLEANUP`].
	pub fn fail(&self, op: &str, message: impl Into<String>) {
		self.state.failures.lock().insert(op.to_owned(), message.into());
	}

	/// Makes the operation named `op` panic instead of answering.
	pub fn panic_on(&self, op: &str) {
		self.state.panics.lock().insert(op.to_owned());
	}

	/// Removes every injected failure.
	pub fn clear_failures(&self) {
		self.state.failures.lock().clear();
	}

	/// Reports the specification called `name` as failing in future audits.
	pub fn fail_specification(&self, name: impl Into<String>) {
		self.state.failing_specs.lock().insert(name.into());
	}

	/// Models currently loaded, in load order.
	pub fn loaded_models(&self) -> Vec<(ModelId, LoadedModel)> {
		self.state
			.models
			.lock()
			.iter()
			.map(|(id, model)| (id.clone(), model.clone()))
			.collect()
	}

	fn check(&self, op: &str) -> EngineResult<()> {
		if self.state.panics.lock().contains(op) {
			panic!("StubEngine told to panic in {op}");
		}
		match self.state.failures.lock().get(op) {
			Some(message) => Err(EngineError {
				message: message.clone(),
				stack: Some(format!("at StubEngine::{op}")),
			}),
			None => Ok(()),
		}
	}

	fn classes(schema: IfcVersion) -> Vec<&'static str> {
		match schema {
			IfcVersion::Ifc2x3 => CLASSES_2X3.to_vec(),
			IfcVersion::Ifc4 => CLASSES_4.to_vec(),
			IfcVersion::Ifc4x3Add2 => CLASSES_4.iter().chain(CLASSES_4X3).copied().collect(),
		}
	}

	fn known_class(schema: IfcVersion, entity: &str) -> EngineResult<&'static str> {
		Self::classes(schema)
			.into_iter()
			.find(|class| class.eq_ignore_ascii_case(entity))
			.ok_or_else(|| EngineError::new(format!("unknown IFC class `{entity}` in {schema}")))
	}
}

/// Wraps a document in the stub's IDS XML envelope.
pub fn to_xml(document: &Document) -> EngineResult<String> {
	let body = serde_json::to_string(&denormalize(serde_json::to_value(document)?))?;
	Ok(format!("{XML_OPEN}{body}{XML_CLOSE}"))
}

fn parse_xml(xml: &str) -> EngineResult<JsonValue> {
	let body = xml
		.trim()
		.strip_prefix(XML_OPEN)
		.and_then(|rest| rest.strip_suffix(XML_CLOSE))
		.ok_or_else(|| EngineError::new("not an IDS document"))?;
	serde_json::from_str(body).map_err(|e| EngineError::new(format!("malformed IDS document: {e}")))
}

fn decode_document(raw: JsonValue) -> EngineResult<Document> {
	Normalized::<Document>::deserialize(raw)
		.map(Normalized::into_inner)
		.map_err(|e| EngineError::new(format!("IDS validation failed: {e}")))
}

fn schema_form<T: serde::Serialize>(value: &T) -> EngineResult<JsonValue> {
	Ok(denormalize(serde_json::to_value(value)?))
}

fn strings(items: &[&str]) -> Vec<String> {
	items.iter().map(|item| (*item).to_owned()).collect()
}

fn required(value: Option<Value>, field: &str) -> EngineResult<Value> {
	value.ok_or_else(|| EngineError::new(format!("{field} is required")))
}

fn build_facet(clause: ClauseKind, options: FacetOptions) -> EngineResult<Facet> {
	let cardinality = |c: Option<Cardinality>| match clause {
		ClauseKind::Applicability => None,
		ClauseKind::Requirements => Some(c.unwrap_or_default()),
	};
	Ok(match options {
		FacetOptions::Entity(o) => Entity {
			name: o.name.unwrap_or_else(|| Value::simple(DEFAULT_ENTITY)),
			predefined_type: o.predefined_type,
			cardinality: None,
			instructions: o.instructions,
		}
		.into(),
		FacetOptions::Attribute(o) => Attribute {
			name: o.name.unwrap_or_else(|| Value::simple(DEFAULT_ATTRIBUTE)),
			value: o.value,
			cardinality: cardinality(o.cardinality),
			instructions: o.instructions,
		}
		.into(),
		FacetOptions::Classification(o) => Classification {
			value: o.value,
			system: o.system,
			uri: o.uri,
			cardinality: cardinality(o.cardinality),
			instructions: o.instructions,
		}
		.into(),
		FacetOptions::PartOf(o) => PartOf {
			entity: PartOfEntity {
				name: required(o.name, "name")?,
				predefined_type: o.predefined_type,
			},
			relation: o.relation,
			cardinality: cardinality(o.cardinality),
			instructions: o.instructions,
		}
		.into(),
		FacetOptions::Property(o) => Property {
			property_set: required(o.property_set, "propertySet")?,
			base_name: required(o.base_name, "baseName")?,
			value: o.value,
			data_type: o.data_type,
			uri: o.uri,
			cardinality: cardinality(o.cardinality),
			instructions: o.instructions,
		}
		.into(),
		FacetOptions::Material(o) => Material {
			value: o.value,
			uri: o.uri,
			cardinality: cardinality(o.cardinality),
			instructions: o.instructions,
		}
		.into(),
	})
}

#[async_trait]
impl AuditEngine for StubEngine {
	async fn init(&self) -> EngineResult<()> {
		self.state.init_calls.fetch_add(1, Ordering::SeqCst);
		let mut gate = self.state.init_gate.subscribe();
		let _ = gate.wait_for(|open| *open).await;
		self.check(INIT)
	}

	async fn cleanup(&self) -> EngineResult<()> {
		self.state.cleanup_calls.fetch_add(1, Ordering::SeqCst);
		self.check(CLEANUP)?;
		self.state.models.lock().clear();
		Ok(())
	}

	async fn entity_classes(&self, schema: IfcVersion) -> EngineResult<Vec<String>> {
		self.check(GetAllEntityClasses::NAME)?;
		Ok(strings(&Self::classes(schema)))
	}

	async fn data_types(&self, _schema: IfcVersion) -> EngineResult<Vec<String>> {
		self.check(GetAllDataTypes::NAME)?;
		Ok(strings(DATA_TYPES))
	}

	async fn predefined_types(&self, schema: IfcVersion, entity: &str) -> EngineResult<Vec<String>> {
		self.check(GetPredefinedTypes::NAME)?;
		Ok(match Self::known_class(schema, entity)? {
			"IfcWall" => strings(WALL_TYPES),
			_ => strings(&["USERDEFINED", "NOTDEFINED"]),
		})
	}

	async fn entity_attributes(&self, schema: IfcVersion, entity: &str) -> EngineResult<Vec<AttributeInfo>> {
		self.check(GetEntityAttributes::NAME)?;
		Self::known_class(schema, entity)?;
		let mut names = ROOT_ATTRIBUTES.to_vec();
		if schema != IfcVersion::Ifc2x3 {
			names.push("PredefinedType");
		}
		Ok(names
			.into_iter()
			.map(|name| AttributeInfo { name: name.to_owned() })
			.collect())
	}

	async fn applicable_psets(
		&self,
		schema: IfcVersion,
		entity: &str,
		_predefined_type: &str,
	) -> EngineResult<Vec<String>> {
		self.check(GetApplicablePsets::NAME)?;
		let class = Self::known_class(schema, entity)?;
		let stem = class.trim_start_matches("Ifc");
		Ok(vec![format!("Pset_{stem}Common"), format!("Qto_{stem}BaseQuantities")])
	}

	async fn material_categories(&self) -> EngineResult<Vec<String>> {
		self.check(GetMaterialCategories::NAME)?;
		Ok(strings(MATERIAL_CATEGORIES))
	}

	async fn classification_systems(&self) -> EngineResult<ClassificationSystems> {
		self.check(GetStandardClassificationSystems::NAME)?;
		let system = |source: &str, tokens: Option<&[&str]>| ClassificationSystem {
			source: source.to_owned(),
			tokens: tokens.map(strings),
		};
		Ok(IndexMap::from([
			("Uniclass 2015".to_owned(), system("RIBA Enterprises Ltd", Some(&["_"][..]))),
			("OmniClass".to_owned(), system("OmniClass", Some(&["-", " "][..]))),
			("MasterFormat".to_owned(), system("CSI", Some(&[" ", "."][..]))),
			("CCI Construction".to_owned(), system("Molio", None)),
		]))
	}

	async fn load_ifc(&self, name: &str, bytes: Vec<u8>) -> EngineResult<ModelId> {
		self.check(LoadIfc::NAME)?;
		if bytes.is_empty() {
			return Err(EngineError::new(format!("{name}: empty model")));
		}
		let id = ModelId(format!("model-{}", self.state.next_model.fetch_add(1, Ordering::SeqCst)));
		self.state.models.lock().insert(
			id.clone(),
			LoadedModel {
				name: name.to_owned(),
				size: bytes.len(),
			},
		);
		Ok(id)
	}

	async fn unload_ifc(&self, model: &ModelId) -> EngineResult<bool> {
		self.check(UnloadIfc::NAME)?;
		Ok(self.state.models.lock().shift_remove(model).is_some())
	}

	async fn audit_ifc(&self, model: &ModelId, ids_xml: &str) -> EngineResult<AuditOutput> {
		self.check(AuditIfc::NAME)?;
		let mut gate = self.state.audit_gate.subscribe();
		let _ = gate.wait_for(|open| *open).await;

		let loaded = self
			.state
			.models
			.lock()
			.get(model)
			.cloned()
			.ok_or_else(|| EngineError::new(format!("model {model} is not loaded")))?;
		let document = decode_document(parse_xml(ids_xml)?)?;

		let failing = self.state.failing_specs.lock().clone();
		let specifications: Vec<JsonValue> = document
			.specifications
			.iter()
			.map(|spec| {
				json!({
					"name": spec.name,
					"status": !failing.contains(&spec.name),
					"usage": spec.usage(),
					"total_checks": spec.requirements.len(),
				})
			})
			.collect();
		let passed = specifications.iter().filter(|s| s["status"] == true).count();
		let status = passed == specifications.len();
		let title = &document.info.title;

		Ok(AuditOutput {
			json: json!({
				"title": title,
				"status": status,
				"model": loaded.name,
				"specifications": specifications,
			}),
			html: Some(format!(
				"<html><body><h1>{}</h1><p>{passed}/{} specifications passed</p></body></html>",
				title.replace('&', "&amp;").replace('<', "&lt;"),
				specifications.len(),
			)),
		})
	}

	async fn create_ids(&self, info: Info) -> EngineResult<JsonValue> {
		self.check(CreateIds::NAME)?;
		schema_form(&Document::new(info))
	}

	async fn open_ids(&self, xml: &str, validate: bool) -> EngineResult<JsonValue> {
		self.check(OpenIds::NAME)?;
		let raw = parse_xml(xml)?;
		if validate {
			decode_document(raw.clone())?;
		}
		Ok(raw)
	}

	async fn validate_ids(&self, document: Document) -> EngineResult<bool> {
		self.check(ValidateIds::NAME)?;
		Ok(!document.specifications.is_empty())
	}

	async fn export_ids(&self, document: Document) -> EngineResult<String> {
		self.check(ExportIds::NAME)?;
		to_xml(&document)
	}

	async fn create_specification(&self, options: SpecificationOptions) -> EngineResult<JsonValue> {
		self.check(CreateSpecification::NAME)?;
		let mut spec = Specification::new(options.name.unwrap_or_else(|| "Unnamed".to_owned()));
		spec.ifc_version = options.ifc_version.unwrap_or_else(|| vec![IfcVersion::Ifc4]);
		spec.identifier = options.identifier;
		spec.description = options.description;
		spec.instructions = options.instructions;
		spec.applicability.occurs = match (options.usage, options.min_occurs, options.max_occurs) {
			(Some(usage), _, _) => Occurs::for_usage(usage),
			(None, None, None) => Occurs::for_usage(Usage::Required),
			(None, min, max) => Occurs {
				min: Some(min.unwrap_or(0)),
				max: Some(max.unwrap_or(MaxOccurs::Unbounded)),
			},
		};
		schema_form(&spec)
	}

	async fn delete_specification(&self, mut document: Document, index: usize) -> EngineResult<JsonValue> {
		self.check(DeleteSpecification::NAME)?;
		if index >= document.specifications.len() {
			return Err(EngineError::new(format!("no specification at index {index}")));
		}
		document.specifications.remove(index);
		schema_form(&document)
	}

	async fn create_facet(&self, clause: ClauseKind, options: FacetOptions) -> EngineResult<JsonValue> {
		let name = match options.kind() {
			FacetKind::Entity => CreateEntityFacet::NAME,
			FacetKind::Attribute => CreateAttributeFacet::NAME,
			FacetKind::Classification => CreateClassificationFacet::NAME,
			FacetKind::PartOf => CreatePartOfFacet::NAME,
			FacetKind::Property => CreatePropertyFacet::NAME,
			FacetKind::Material => CreateMaterialFacet::NAME,
		};
		self.check(name)?;
		schema_form(&build_facet(clause, options)?)
	}

	async fn delete_facet(
		&self,
		mut specification: Specification,
		clause: ClauseKind,
		kind: FacetKind,
		index: usize,
	) -> EngineResult<JsonValue> {
		self.check(DeleteFacet::NAME)?;
		specification
			.clause_mut(clause)
			.remove(kind, index)
			.ok_or_else(|| EngineError::new(format!("no {kind} facet at index {index} in {clause}")))?;
		schema_form(&specification)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::types::{AttributeOptions, PropertyOptions};

	fn decode<T: serde::de::DeserializeOwned>(raw: JsonValue) -> T {
		Normalized::<T>::deserialize(raw).unwrap().into_inner()
	}

	#[tokio::test]
	async fn usage_wins_over_bounds() {
		let engine = StubEngine::new();
		let raw = engine
			.create_specification(SpecificationOptions {
				usage: Some(Usage::Prohibited),
				min_occurs: Some(1),
				..SpecificationOptions::named("No proxies")
			})
			.await
			.unwrap();
		let spec: Specification = decode(raw);
		assert_eq!(spec.usage(), Usage::Prohibited);
		assert_eq!(spec.ifc_version, vec![IfcVersion::Ifc4]);

		let raw = engine
			.create_specification(SpecificationOptions {
				min_occurs: Some(0),
				..SpecificationOptions::default()
			})
			.await
			.unwrap();
		let spec: Specification = decode(raw);
		assert_eq!(spec.name, "Unnamed");
		assert_eq!(spec.usage(), Usage::Optional);
	}

	#[tokio::test]
	async fn facet_defaults_follow_clause() {
		let engine = StubEngine::new();
		let raw = engine
			.create_facet(ClauseKind::Requirements, AttributeOptions::default().into())
			.await
			.unwrap();
		assert_eq!(raw, json!({"name": {"simpleValue": "Name"}, "@cardinality": "required"}));

		let raw = engine
			.create_facet(ClauseKind::Applicability, AttributeOptions::default().into())
			.await
			.unwrap();
		assert_eq!(raw, json!({"name": {"simpleValue": "Name"}}));

		let err = engine
			.create_facet(ClauseKind::Requirements, PropertyOptions::default().into())
			.await
			.unwrap_err();
		assert_eq!(err.message, "propertySet is required");
	}

	#[tokio::test]
	async fn deleting_missing_facet_fails() {
		let engine = StubEngine::new();
		let err = engine
			.delete_facet(Specification::new("s"), ClauseKind::Requirements, FacetKind::Material, 0)
			.await
			.unwrap_err();
		assert_eq!(err.message, "no material facet at index 0 in requirements");
	}

	#[tokio::test]
	async fn open_rejects_foreign_xml() {
		let engine = StubEngine::new();
		let err = engine.open_ids("<ids/>", false).await.unwrap_err();
		assert_eq!(err.message, "not an IDS document");
	}

	#[tokio::test]
	async fn audit_marks_failing_specifications() {
		let engine = StubEngine::new();
		let model = engine.load_ifc("house.ifc", vec![1, 2, 3]).await.unwrap();
		let mut document = Document::new(Info::titled("House"));
		document.specifications.push(Specification::new("Walls"));
		document.specifications.push(Specification::new("Doors"));
		engine.fail_specification("Doors");

		let output = engine.audit_ifc(&model, &to_xml(&document).unwrap()).await.unwrap();
		assert_eq!(output.json["status"], false);
		assert_eq!(output.json["specifications"][0]["status"], true);
		assert_eq!(output.json["specifications"][1]["status"], false);
		assert!(output.html.unwrap().contains("1/2 specifications passed"));

		assert!(engine.unload_ifc(&model).await.unwrap());
		let err = engine.audit_ifc(&model, &to_xml(&document).unwrap()).await.unwrap_err();
		assert_eq!(err.message, "model model-1 is not loaded");
	}
}

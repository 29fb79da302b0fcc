//! Audit reports.

use chrono::{DateTime, Utc};
use idslab_engine::AuditOutput;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::workspace::DocumentId;

/// One audit run of a document against a model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditReport {
	/// Unique report id.
	pub id: Uuid,
	/// When the audit finished.
	pub date: DateTime<Utc>,
	/// Name of the audited model.
	pub model_name: String,
	/// Document the rules came from.
	pub document: DocumentId,
	/// Decoded machine-readable report.
	pub data: ReportData,
	/// Rendered report, if the engine produced one.
	pub html: Option<String>,
}

impl AuditReport {
	/// Builds a report from engine output.
	///
	/// # Errors
	///
	/// Returns [`Error::Report`] when the JSON report lacks the expected fields.
	pub fn from_output(output: AuditOutput, model_name: impl Into<String>, document: DocumentId) -> Result<Self> {
		let data = serde_json::from_value(output.json).map_err(|e| Error::Report(e.to_string()))?;
		Ok(Self {
			id: Uuid::new_v4(),
			date: Utc::now(),
			model_name: model_name.into(),
			document,
			data,
			html: output.html,
		})
	}
}

/// Machine-readable audit results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
	/// Title of the audited document.
	#[serde(default)]
	pub title: String,
	/// True when every specification passed.
	pub status: bool,
	/// Per-specification results, in document order.
	#[serde(default)]
	pub specifications: Vec<SpecificationReport>,
	/// Engine fields kept verbatim.
	#[serde(flatten)]
	pub extra: Map<String, JsonValue>,
}

impl ReportData {
	/// Results keyed by specification name.
	///
	/// Later entries win when names repeat.
	pub fn by_specification(&self) -> IndexMap<&str, &SpecificationReport> {
		self.specifications
			.iter()
			.map(|spec| (spec.name.as_str(), spec))
			.collect()
	}

	/// Number of passing specifications.
	pub fn passed(&self) -> usize {
		self.specifications.iter().filter(|spec| spec.status).count()
	}
}

/// Result of one specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificationReport {
	/// Specification name.
	pub name: String,
	/// Whether the specification passed.
	pub status: bool,
	/// Engine fields kept verbatim.
	#[serde(flatten)]
	pub extra: Map<String, JsonValue>,
}

//! Workspace errors.

use idslab_engine::ModelId;
use idslab_ids::{ClauseKind, FacetKind};

use crate::config::ConfigError;
use crate::workspace::DocumentId;

/// Errors surfaced by workspace operations.
///
/// Precondition variants are raised before any engine call is made.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// The operation needs a loaded model.
	#[error("no model loaded")]
	NoModel,
	/// The operation needs an active document.
	#[error("no active document")]
	NoActiveDocument,
	/// No open document has this id.
	#[error("unknown document {0}")]
	UnknownDocument(DocumentId),
	/// No loaded model has this id.
	#[error("unknown model {0}")]
	UnknownModel(ModelId),
	/// The active document has no specification at this index.
	#[error("specification {index} out of range ({len} specifications)")]
	SpecificationOutOfRange {
		/// Requested index.
		index: usize,
		/// Number of specifications.
		len: usize,
	},
	/// The clause has no facet of this kind at this index.
	#[error("no {kind} facet at index {index} in {clause}")]
	FacetOutOfRange {
		/// Clause searched.
		clause: ClauseKind,
		/// Facet kind searched.
		kind: FacetKind,
		/// Requested index.
		index: usize,
	},
	/// Auditing needs at least one specification.
	#[error("document has no specifications")]
	EmptyDocument,
	/// The engine call failed.
	#[error(transparent)]
	Rpc(#[from] idslab_rpc::Error),
	/// The engine's audit output did not have the expected shape.
	#[error("malformed audit report: {0}")]
	Report(String),
	/// Configuration could not be loaded.
	#[error(transparent)]
	Config(#[from] ConfigError),
}

/// Result alias for workspace operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

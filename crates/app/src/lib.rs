//! Application state for editing IDS documents and auditing IFC models.
//!
//! [`Workspace`] owns everything a session works on: open documents, the active document and
//! specification, loaded models and audit reports. Every mutation goes through the audit engine
//! behind an [`RpcClient`](idslab_rpc::RpcClient); the engine's reply then replaces the affected
//! slot wholesale, so a failed call leaves the workspace untouched.

#![warn(missing_docs)]

mod autocomplete;
pub mod config;
mod error;
mod report;
mod workspace;

pub use autocomplete::{AutocompleteCache, Autocompletions};
pub use config::{AppConfig, ConfigError, default_config_path};
pub use error::{Error, Result};
pub use report::{AuditReport, ReportData, SpecificationReport};
pub use workspace::{ActiveSelection, DocumentId, LoadedModel, Workspace};

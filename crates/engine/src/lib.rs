//! Audit engine boundary.
//!
//! The engine that parses, validates and audits IDS documents against IFC models lives behind an
//! execution host. This crate fixes everything on either side of that boundary except the engine
//! itself:
//!
//! * [`calls`]: one typed [`Method`](idslab_rpc::Method) per remote procedure and the closed
//!   [`EngineCall`] union the host dispatches on.
//! * [`AuditEngine`]: the trait an engine implementation provides.
//! * [`host`]: the serve loop adapting an engine to the envelope protocol, in process or over
//!   stdio.
//!
//! With the `testing` feature, [`testing::StubEngine`] provides a deterministic in-memory engine.

#![warn(missing_docs)]

pub mod calls;
mod engine;
pub mod host;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod types;

// Used only by the stub host binary.
#[cfg(feature = "testing")]
use tracing_subscriber as _;

pub use calls::EngineCall;
pub use engine::{AuditEngine, EngineError, EngineResult};
pub use host::{HANDLER_PANICKED, LocalLauncher, NOT_INITIALIZED, serve, serve_io};
pub use types::{
	AttributeInfo, AttributeOptions, AuditOutput, ClassificationOptions, ClassificationSystem,
	ClassificationSystems, DEFAULT_ATTRIBUTE, DEFAULT_ENTITY, EntityOptions, FacetOptions, MaterialOptions,
	ModelId, PartOfOptions, PropertyOptions, SpecificationOptions,
};

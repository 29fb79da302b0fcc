//! Rule document model for Information Delivery Specifications (IDS).
//!
//! A [`Document`] is an ordered list of [`Specification`]s. Each specification pairs an
//! applicability [`Clause`] (which data the rule applies to) with a requirements [`Clause`]
//! (what must hold for that data). Clauses hold [`Facet`]s keyed by [`FacetKind`].
//!
//! The types here are pure data: they carry no I/O and are only ever replaced wholesale by
//! values echoed from the audit engine. Two transforms sit next to them:
//!
//! * [`normalize`]: converts restriction sub-trees from the engine's schema convention
//!   (`xs:` prefixed keys, one-element `xs:restriction` sequences) to the plain convention the
//!   engine's mutation calls accept. [`Normalized`] applies it during deserialization.
//! * [`describe`]: renders a facet in the context of its clause and specification as a single
//!   human-readable sentence.

#![warn(missing_docs)]

mod clause;
pub mod describe;
mod document;
mod facet;
pub mod normalize;
mod value;

pub use clause::{Clause, ClauseKind, MaxOccurs, Occurs};
pub use describe::{describe, describe_clause, describe_markup, render_emphasis};
pub use document::{Document, IfcVersion, Info, Specification, Usage};
pub use facet::{
	Attribute, Cardinality, Classification, Entity, Facet, FacetKind, Material, PartOf,
	PartOfEntity, Property,
};
pub use normalize::{Normalized, denormalize, normalize};
pub use value::{LengthBounds, NumericBounds, Restriction, RestrictionError, RestrictionKind, Value};

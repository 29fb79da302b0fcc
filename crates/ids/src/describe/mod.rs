//! Prose rendering of facets.
//!
//! A facet reads differently depending on where it sits. In an applicability clause it is a
//! filter ("All data where IFC class is **IfcWall**"); in a requirements clause it is an
//! obligation ("Shall be data where IFC class **is `IfcWall`**"). The specification's usage and
//! the facet's cardinality then negate or soften the obligation.
//!
//! [`describe_markup`] produces the sentence with inline emphasis marks, [`render_emphasis`]
//! turns those marks into presentation markup, and [`describe`] does both.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::clause::ClauseKind;
use crate::document::{Specification, Usage};
use crate::facet::{Cardinality, Facet};
use crate::value::{LengthBounds, NumericBounds, RestrictionKind, Value};

#[cfg(test)]
mod tests;

static SHALL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([Ss])hall( not)?\b").expect("static regex"));
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("static regex"));
static CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
	Filter,
	Obligation,
}

impl Style {
	fn of(clause: ClauseKind) -> Self {
		match clause {
			ClauseKind::Applicability => Self::Filter,
			ClauseKind::Requirements => Self::Obligation,
		}
	}

	fn lead(self) -> &'static str {
		match self {
			Self::Filter => "All data where",
			Self::Obligation => "Shall be data where",
		}
	}

	fn literal(self, text: &str) -> String {
		match self {
			Self::Filter => format!("**{text}**"),
			Self::Obligation => format!("`{text}`"),
		}
	}

	fn constraint(self, phrase: String) -> String {
		match self {
			Self::Filter => phrase,
			Self::Obligation => format!("**{phrase}**"),
		}
	}
}

/// Renders `facet`, stored in `clause` of `spec`, as presentation markup.
pub fn describe(clause: ClauseKind, facet: &Facet, spec: &Specification) -> String {
	render_emphasis(&describe_markup(clause, facet, spec))
}

/// Renders `facet`, stored in `clause` of `spec`, with `**bold**` and `` `code` `` marks.
pub fn describe_markup(clause: ClauseKind, facet: &Facet, spec: &Specification) -> String {
	let style = Style::of(clause);
	let mut sentence = format!("{} {}", style.lead(), body(facet, style));

	if spec.usage() == Usage::Prohibited {
		sentence = negate(&sentence);
	}
	if clause == ClauseKind::Requirements {
		match facet.cardinality() {
			Cardinality::Prohibited => sentence = negate(&sentence),
			Cardinality::Optional => sentence = permit(&sentence),
			Cardinality::Required => {}
		}
	}
	sentence
}

/// Renders every facet of `clause` in kind and audit order.
pub fn describe_clause(clause: ClauseKind, spec: &Specification) -> Vec<String> {
	spec.clause(clause)
		.iter()
		.map(|facet| describe(clause, facet, spec))
		.collect()
}

/// Converts `**x**` to `<em>x</em>` and `` `x` `` to `<code>x</code>`.
///
/// `&`, `<` and `>` in the text are escaped first.
pub fn render_emphasis(markup: &str) -> String {
	let escaped = markup.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;");
	let emphasized = BOLD.replace_all(&escaped, "<em>$1</em>");
	CODE.replace_all(&emphasized, "<code>$1</code>").into_owned()
}

/// `shall` becomes `shall not`, unless it already is.
fn negate(sentence: &str) -> String {
	SHALL
		.replace_all(sentence, |caps: &Captures<'_>| format!("{}hall not", &caps[1]))
		.into_owned()
}

fn permit(sentence: &str) -> String {
	SHALL
		.replace_all(sentence, |caps: &Captures<'_>| {
			let may = if &caps[1] == "S" { "May" } else { "may" };
			match caps.get(2) {
				Some(not) => format!("{may}{}", not.as_str()),
				None => may.to_owned(),
			}
		})
		.into_owned()
}

fn body(facet: &Facet, style: Style) -> String {
	match facet {
		Facet::Entity(entity) => {
			let mut text = format!("IFC class {}", phrase(&entity.name, style));
			if let Some(predefined) = &entity.predefined_type {
				text.push_str(&format!(" and predefined type {}", phrase(predefined, style)));
			}
			text
		}
		Facet::Attribute(attribute) => {
			let name = subject(&attribute.name, style);
			match &attribute.value {
				Some(value) => format!("attribute {name} {}", phrase(value, style)),
				None => format!("attribute {name} is provided"),
			}
		}
		Facet::Classification(classification) => match (&classification.system, &classification.value) {
			(Some(system), Some(value)) => format!(
				"classification system {} has a reference that {}",
				subject(system, style),
				phrase(value, style)
			),
			(Some(system), None) => format!("classification system {} is used", subject(system, style)),
			(None, Some(value)) => format!("a classification reference {}", phrase(value, style)),
			(None, None) => "any classification is used".to_owned(),
		},
		Facet::Property(property) => {
			let mut text = format!(
				"property {} in property set {}",
				subject(&property.base_name, style),
				subject(&property.property_set, style)
			);
			match &property.value {
				Some(value) => text.push_str(&format!(" {}", phrase(value, style))),
				None => text.push_str(" is provided"),
			}
			if let Some(data_type) = &property.data_type {
				text.push_str(&format!(" with data type {}", style.literal(data_type)));
			}
			text
		}
		Facet::Material(material) => match &material.value {
			Some(value) => format!("material {}", phrase(value, style)),
			None => "any material is assigned".to_owned(),
		},
		Facet::PartOf(part_of) => {
			let mut text = format!("parent IFC class {}", phrase(&part_of.entity.name, style));
			if let Some(predefined) = &part_of.entity.predefined_type {
				text.push_str(&format!(" and predefined type {}", phrase(predefined, style)));
			}
			if let Some(relation) = &part_of.relation {
				text.push_str(&format!(" through relation {}", style.literal(relation)));
			}
			text
		}
	}
}

/// Names a thing: a bare literal, or a restriction on its name.
fn subject(value: &Value, style: Style) -> String {
	match value {
		Value::Simple(text) => style.literal(text),
		Value::Restriction(_) => format!("with a name that {}", phrase(value, style)),
	}
}

/// States the constraint a value places on the data.
fn phrase(value: &Value, style: Style) -> String {
	let text = match value {
		Value::Simple(text) => format!("is {}", style.literal(text)),
		Value::Restriction(restriction) => match &restriction.kind {
			RestrictionKind::Enumeration(values) => enumeration(values, style),
			RestrictionKind::Pattern(patterns) => {
				let patterns: Vec<_> = patterns.iter().map(|p| format!("`{p}`")).collect();
				format!("matches pattern {}", patterns.join(" or "))
			}
			RestrictionKind::Length(bounds) => length(bounds, style),
			RestrictionKind::Bounds(bounds) => range(bounds, style),
		},
	};
	style.constraint(text)
}

fn enumeration(values: &[String], style: Style) -> String {
	match values {
		[single] => format!("is {}", style.literal(single)),
		values => {
			let values: Vec<_> = values.iter().map(|v| style.literal(v)).collect();
			format!("is one of {}", values.join(", "))
		}
	}
}

fn length(bounds: &LengthBounds, style: Style) -> String {
	if let (Some(exact), None, None) = (&bounds.exact, &bounds.min, &bounds.max) {
		return format!("has length {}", style.literal(exact));
	}
	let parts: Vec<_> = [("exactly", &bounds.exact), ("at least", &bounds.min), ("at most", &bounds.max)]
		.into_iter()
		.filter_map(|(label, value)| value.as_ref().map(|v| format!("{label} {}", style.literal(v))))
		.collect();
	format!("has a length of {}", parts.join(" and "))
}

fn range(bounds: &NumericBounds, style: Style) -> String {
	let parts: Vec<_> = [
		("≥", &bounds.min_inclusive),
		(">", &bounds.min_exclusive),
		("≤", &bounds.max_inclusive),
		("<", &bounds.max_exclusive),
	]
	.into_iter()
	.filter_map(|(op, value)| value.as_ref().map(|v| format!("{op} {}", style.literal(v))))
	.collect();
	format!("is {}", parts.join(" and "))
}

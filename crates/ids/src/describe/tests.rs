use pretty_assertions::assert_eq;
use rstest::rstest;

use super::*;
use crate::clause::Occurs;
use crate::facet::{Attribute, Classification, Entity, Material, PartOf, PartOfEntity, Property};
use crate::value::Restriction;

fn entity(name: impl Into<Value>) -> Entity {
	Entity {
		name: name.into(),
		predefined_type: None,
		cardinality: None,
		instructions: None,
	}
}

fn spec_with_usage(usage: Usage) -> Specification {
	let mut spec = Specification::new("Walls");
	spec.applicability.occurs = Occurs::for_usage(usage);
	spec
}

#[test]
fn applicability_reads_as_filter() {
	let spec = Specification::new("Walls");
	let facet = Facet::from(entity("IfcWall"));
	assert_eq!(
		describe_markup(ClauseKind::Applicability, &facet, &spec),
		"All data where IFC class is **IfcWall**"
	);
	assert_eq!(
		describe(ClauseKind::Applicability, &facet, &spec),
		"All data where IFC class is <em>IfcWall</em>"
	);
}

#[test]
fn requirement_reads_as_obligation() {
	let spec = Specification::new("Walls");
	let facet = Facet::from(entity("IfcWall"));
	assert_eq!(
		describe_markup(ClauseKind::Requirements, &facet, &spec),
		"Shall be data where IFC class **is `IfcWall`**"
	);
	assert_eq!(
		describe(ClauseKind::Requirements, &facet, &spec),
		"Shall be data where IFC class <em>is <code>IfcWall</code></em>"
	);
}

#[test]
fn prohibited_usage_negates_once() {
	let spec = spec_with_usage(Usage::Prohibited);
	let facet = Facet::from(entity("IfcWall"));
	let markup = describe_markup(ClauseKind::Requirements, &facet, &spec);
	assert!(markup.contains("Shall not be data where IFC class **is `IfcWall`**"), "{markup}");
}

#[test]
fn prohibited_usage_and_cardinality_negate_once() {
	let spec = spec_with_usage(Usage::Prohibited);
	let facet = Facet::from(Entity {
		cardinality: Some(Cardinality::Prohibited),
		..entity("IfcWall")
	});
	assert_eq!(
		describe_markup(ClauseKind::Requirements, &facet, &spec),
		"Shall not be data where IFC class **is `IfcWall`**"
	);
}

#[rstest]
#[case(Cardinality::Required, "Shall be data where")]
#[case(Cardinality::Optional, "May be data where")]
#[case(Cardinality::Prohibited, "Shall not be data where")]
fn cardinality_shapes_requirement_lead(#[case] cardinality: Cardinality, #[case] lead: &str) {
	let spec = Specification::new("Walls");
	let facet = Facet::from(Entity {
		cardinality: Some(cardinality),
		..entity("IfcWall")
	});
	let markup = describe_markup(ClauseKind::Requirements, &facet, &spec);
	assert!(markup.starts_with(lead), "{markup}");
}

#[test]
fn cardinality_is_ignored_in_applicability() {
	let spec = Specification::new("Walls");
	let facet = Facet::from(Entity {
		cardinality: Some(Cardinality::Optional),
		..entity("IfcWall")
	});
	assert_eq!(
		describe_markup(ClauseKind::Applicability, &facet, &spec),
		"All data where IFC class is **IfcWall**"
	);
}

#[test]
fn optional_rewrite_applies_after_prohibited_usage() {
	let spec = spec_with_usage(Usage::Prohibited);
	let facet = Facet::from(Entity {
		cardinality: Some(Cardinality::Optional),
		..entity("IfcWall")
	});
	assert!(describe_markup(ClauseKind::Requirements, &facet, &spec).starts_with("May not be data where"));
}

#[test]
fn restrictions_render_per_kind() {
	let spec = Specification::new("Walls");
	let one_of = Facet::from(entity(Restriction::enumeration(["IFCWALL", "IFCSLAB"])));
	assert_eq!(
		describe_markup(ClauseKind::Applicability, &one_of, &spec),
		"All data where IFC class is one of **IFCWALL**, **IFCSLAB**"
	);
	assert_eq!(
		describe_markup(ClauseKind::Requirements, &one_of, &spec),
		"Shall be data where IFC class **is one of `IFCWALL`, `IFCSLAB`**"
	);

	let pattern = Facet::from(entity(Restriction::pattern("IFC.*WALL")));
	assert_eq!(
		describe_markup(ClauseKind::Applicability, &pattern, &spec),
		"All data where IFC class matches pattern `IFC.*WALL`"
	);
}

#[test]
fn numeric_and_length_bounds() {
	let spec = Specification::new("Walls");
	let height = Facet::from(Property {
		property_set: Value::simple("Qto_WallBaseQuantities"),
		base_name: Value::simple("Height"),
		value: Some(Value::from(Restriction {
			base: Some("xs:double".into()),
			kind: RestrictionKind::Bounds(NumericBounds {
				min_inclusive: Some("2.4".into()),
				max_exclusive: Some("4".into()),
				..NumericBounds::default()
			}),
		})),
		data_type: Some("IFCLENGTHMEASURE".into()),
		uri: None,
		cardinality: None,
		instructions: None,
	});
	assert_eq!(
		describe_markup(ClauseKind::Applicability, &height, &spec),
		"All data where property **Height** in property set **Qto_WallBaseQuantities** is ≥ **2.4** and < **4** \
		 with data type **IFCLENGTHMEASURE**"
	);
	assert_eq!(
		describe(ClauseKind::Applicability, &height, &spec),
		"All data where property <em>Height</em> in property set <em>Qto_WallBaseQuantities</em> is ≥ <em>2.4</em> \
		 and &lt; <em>4</em> with data type <em>IFCLENGTHMEASURE</em>"
	);

	let code = Facet::from(Attribute {
		name: Value::simple("Tag"),
		value: Some(Value::from(Restriction {
			base: None,
			kind: RestrictionKind::Length(LengthBounds {
				min: Some("2".into()),
				max: Some("8".into()),
				..LengthBounds::default()
			}),
		})),
		cardinality: None,
		instructions: None,
	});
	assert_eq!(
		describe_markup(ClauseKind::Applicability, &code, &spec),
		"All data where attribute **Tag** has a length of at least **2** and at most **8**"
	);
}

#[test]
fn optional_fields_fall_back_to_presence() {
	let spec = Specification::new("Walls");
	let cases = [
		(
			Facet::from(Attribute {
				name: Value::simple("Name"),
				value: None,
				cardinality: None,
				instructions: None,
			}),
			"All data where attribute **Name** is provided",
		),
		(
			Facet::from(Classification {
				value: None,
				system: Some(Value::simple("Uniclass")),
				uri: None,
				cardinality: None,
				instructions: None,
			}),
			"All data where classification system **Uniclass** is used",
		),
		(
			Facet::from(Classification {
				value: None,
				system: None,
				uri: None,
				cardinality: None,
				instructions: None,
			}),
			"All data where any classification is used",
		),
		(
			Facet::from(Material {
				value: None,
				uri: None,
				cardinality: None,
				instructions: None,
			}),
			"All data where any material is assigned",
		),
	];
	for (facet, expected) in cases {
		assert_eq!(describe_markup(ClauseKind::Applicability, &facet, &spec), expected);
	}
}

#[test]
fn part_of_names_parent_and_relation() {
	let spec = Specification::new("Walls");
	let facet = Facet::from(PartOf {
		entity: PartOfEntity {
			name: Value::simple("IFCBUILDINGSTOREY"),
			predefined_type: None,
		},
		relation: Some("IFCRELCONTAINEDINSPATIALSTRUCTURE".into()),
		cardinality: None,
		instructions: None,
	});
	assert_eq!(
		describe_markup(ClauseKind::Requirements, &facet, &spec),
		"Shall be data where parent IFC class **is `IFCBUILDINGSTOREY`** through relation \
		 `IFCRELCONTAINEDINSPATIALSTRUCTURE`"
	);
}

#[test]
fn restricted_name_reads_as_subject() {
	let spec = Specification::new("Walls");
	let facet = Facet::from(Attribute {
		name: Value::from(Restriction::pattern("Is.*")),
		value: Some(Value::simple("TRUE")),
		cardinality: None,
		instructions: None,
	});
	assert_eq!(
		describe_markup(ClauseKind::Applicability, &facet, &spec),
		"All data where attribute with a name that matches pattern `Is.*` is **TRUE**"
	);
}

#[test]
fn clause_sentences_follow_kind_order() {
	let mut spec = Specification::new("Walls");
	spec.applicability.push(Material {
		value: Some(Value::simple("concrete")),
		uri: None,
		cardinality: None,
		instructions: None,
	});
	spec.applicability.push(entity("IfcWall"));
	assert_eq!(
		describe_clause(ClauseKind::Applicability, &spec),
		vec![
			"All data where IFC class is <em>IfcWall</em>".to_owned(),
			"All data where material is <em>concrete</em>".to_owned(),
		]
	);
}

#[test]
fn emphasis_escapes_markup_characters() {
	assert_eq!(render_emphasis("a < **b & c** > `d`"), "a &lt; <em>b &amp; c</em> &gt; <code>d</code>");
}

use pretty_assertions::assert_eq;
use serde_json::json;

use super::*;
use crate::{Document, FacetKind, Facet, RestrictionKind, Value};

fn engine_document() -> JsonValue {
	json!({
		"info": { "title": "Walls" },
		"specifications": {
			"specification": [{
				"@name": "Load bearing",
				"@ifcVersion": ["IFC4"],
				"applicability": {
					"entity": [{
						"name": {
							"xs:restriction": [{
								"@base": "xs:string",
								"xs:enumeration": [{ "@value": "IFCWALL" }, { "@value": "IFCSLAB" }]
							}]
						}
					}]
				},
				"requirements": {
					"property": [{
						"propertySet": { "simpleValue": "Pset_WallCommon" },
						"baseName": { "simpleValue": "LoadBearing" },
						"value": { "xs:restriction": [{ "xs:pattern": { "@value": "TRUE|FALSE" } }] }
					}]
				}
			}]
		}
	})
}

#[test]
fn collapses_schema_restriction() {
	let input = json!({ "xs:restriction": [{ "xs:enumeration": [{ "@value": "A" }] }] });
	assert_eq!(normalize(input), json!({ "restriction": { "enumeration": [{ "@value": "A" }] } }));
}

#[test]
fn keeps_attribute_keys_and_scalars() {
	let input = json!({
		"name": { "xs:restriction": [{ "@base": "xs:string", "xs:pattern": { "@value": "Ifc.*" } }] },
		"count": 3,
		"flag": null
	});
	assert_eq!(
		normalize(input),
		json!({
			"name": { "restriction": { "@base": "xs:string", "pattern": { "@value": "Ifc.*" } } },
			"count": 3,
			"flag": null
		})
	);
	assert_eq!(normalize(json!("xs:restriction")), json!("xs:restriction"));
}

#[test]
fn empty_restriction_sequence_is_left_alone() {
	let input = json!({ "xs:restriction": [] });
	assert_eq!(normalize(input.clone()), input);
}

#[test]
fn normalize_is_idempotent() {
	let once = normalize(engine_document());
	assert_eq!(normalize(once.clone()), once);
}

#[test]
fn denormalize_inverts_normalize() {
	let doc = engine_document();
	assert_eq!(normalize(denormalize(doc.clone())), normalize(doc.clone()));

	let plain = normalize(doc);
	assert_eq!(normalize(denormalize(plain.clone())), plain);
}

#[test]
fn denormalize_prefixes_restriction_keys() {
	let input = json!({ "restriction": { "@base": "xs:double", "minInclusive": { "@value": 0 } } });
	assert_eq!(
		denormalize(input),
		json!({ "xs:restriction": [{ "@base": "xs:double", "xs:minInclusive": { "@value": 0 } }] })
	);
}

#[test]
fn normalized_wrapper_decodes_engine_output() {
	let Normalized(doc) = serde_json::from_value::<Normalized<Document>>(engine_document()).unwrap();

	let spec = &doc.specifications[0];
	let Facet::Entity(entity) = &spec.applicability.facets(FacetKind::Entity)[0] else {
		panic!("expected entity facet");
	};
	let Value::Restriction(restriction) = &entity.name else {
		panic!("expected restriction");
	};
	assert_eq!(restriction.base.as_deref(), Some("xs:string"));
	assert_eq!(
		restriction.kind,
		RestrictionKind::Enumeration(vec!["IFCWALL".into(), "IFCSLAB".into()])
	);

	let Facet::Property(property) = &spec.requirements.facets(FacetKind::Property)[0] else {
		panic!("expected property facet");
	};
	assert!(matches!(
		&property.value,
		Some(Value::Restriction(r)) if r.kind == RestrictionKind::Pattern(vec!["TRUE|FALSE".into()])
	));
}

#[test]
fn plain_document_fails_without_normalization() {
	assert!(serde_json::from_value::<Document>(engine_document()).is_err());
}

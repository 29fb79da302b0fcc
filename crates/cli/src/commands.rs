//! Subcommand bodies, written against a [`Workspace`] so they run with any host.

use std::io::Write;

use idslab_app::{AuditReport, Workspace};
use idslab_engine::SpecificationOptions;
use idslab_ids::{ClauseKind, Info, describe_markup};

/// Creates a document holding one specification and returns its IDS XML.
pub async fn new_document(ws: &mut Workspace, title: String, spec: Option<String>) -> anyhow::Result<String> {
	let id = ws.create_document(Info::titled(title)).await?;
	let options = SpecificationOptions {
		name: spec,
		..SpecificationOptions::default()
	};
	ws.create_specification(options).await?;
	Ok(ws.export_document(id).await?)
}

/// Writes each specification with its usage, then one sentence per facet.
pub async fn describe(ws: &mut Workspace, xml: String, out: &mut impl Write) -> anyhow::Result<()> {
	let id = ws.open_document(xml, true).await?;
	let Some(doc) = ws.document(id) else {
		anyhow::bail!("document {id} vanished");
	};

	writeln!(out, "{}", doc.info.title)?;
	for spec in &doc.specifications {
		writeln!(out)?;
		writeln!(out, "{} ({})", spec.name, spec.usage())?;
		for clause in [ClauseKind::Applicability, ClauseKind::Requirements] {
			for facet in spec.clause(clause).iter() {
				writeln!(out, "  {}", describe_markup(clause, facet, spec))?;
			}
		}
	}
	Ok(())
}

/// Loads a model, opens rules and audits. Writes one pass/fail line per specification.
pub async fn audit(
	ws: &mut Workspace,
	model_name: String,
	model: Vec<u8>,
	xml: String,
	out: &mut impl Write,
) -> anyhow::Result<AuditReport> {
	ws.load_model(model_name, model).await?;
	ws.open_document(xml, true).await?;
	let report = ws.audit().await?.clone();

	for spec in &report.data.specifications {
		let mark = if spec.status { "PASS" } else { "FAIL" };
		writeln!(out, "{mark}  {}", spec.name)?;
	}
	writeln!(
		out,
		"{}/{} specifications passed",
		report.data.passed(),
		report.data.specifications.len()
	)?;
	Ok(report)
}

#[cfg(test)]
mod tests {
	use idslab_engine::testing::StubEngine;
	use idslab_engine::{EntityOptions, LocalLauncher};
	use idslab_ids::{IfcVersion, Value};
	use idslab_rpc::RpcClient;
	use pretty_assertions::assert_eq;

	use super::*;

	fn workspace(engine: &StubEngine) -> Workspace {
		let handle = engine.clone();
		let client = RpcClient::new(LocalLauncher::new(move || handle.clone()));
		Workspace::new(client, vec![IfcVersion::Ifc4])
	}

	#[tokio::test]
	async fn new_document_has_one_specification() {
		let engine = StubEngine::new();
		let mut ws = workspace(&engine);
		let xml = new_document(&mut ws, "House".into(), Some("Walls".into())).await.unwrap();

		let mut out = Vec::new();
		describe(&mut ws, xml, &mut out).await.unwrap();
		assert_eq!(String::from_utf8(out).unwrap(), "House\n\nWalls (required)\n");
	}

	#[tokio::test]
	async fn describe_uses_markup_sentences() {
		let engine = StubEngine::new();
		let mut ws = workspace(&engine);
		ws.create_document(Info::titled("House")).await.unwrap();
		ws.create_specification(SpecificationOptions::named("Walls")).await.unwrap();
		let wall = EntityOptions {
			name: Some(Value::simple("IfcWall")),
			..EntityOptions::default()
		};
		ws.create_facet(0, ClauseKind::Applicability, wall.clone().into()).await.unwrap();
		ws.create_facet(0, ClauseKind::Requirements, wall.into()).await.unwrap();
		let id = ws.active().unwrap().document;
		let xml = ws.export_document(id).await.unwrap();

		let mut out = Vec::new();
		describe(&mut ws, xml, &mut out).await.unwrap();
		assert_eq!(
			String::from_utf8(out).unwrap(),
			"House\n\nWalls (required)\n  All data where IFC class is **IfcWall**\n  Shall be data where IFC class **is `IfcWall`**\n"
		);
	}

	#[tokio::test]
	async fn audit_prints_verdicts() {
		let engine = StubEngine::new();
		let mut ws = workspace(&engine);
		ws.create_document(Info::titled("House")).await.unwrap();
		ws.create_specification(SpecificationOptions::named("Walls")).await.unwrap();
		ws.create_specification(SpecificationOptions::named("Doors")).await.unwrap();
		let id = ws.active().unwrap().document;
		let xml = ws.export_document(id).await.unwrap();
		engine.fail_specification("Doors");

		let mut out = Vec::new();
		let report = audit(&mut ws, "house.ifc".into(), b"ISO-10303-21;".to_vec(), xml, &mut out)
			.await
			.unwrap();
		assert_eq!(
			String::from_utf8(out).unwrap(),
			"PASS  Walls\nFAIL  Doors\n1/2 specifications passed\n"
		);
		assert!(!report.data.status);
		assert!(report.html.unwrap().contains("1/2 specifications passed"));
	}

	#[tokio::test]
	async fn empty_model_is_reported() {
		let engine = StubEngine::new();
		let mut ws = workspace(&engine);
		let xml = new_document(&mut ws, "House".into(), None).await.unwrap();

		let err = audit(&mut ws, "empty.ifc".into(), Vec::new(), xml, &mut Vec::new())
			.await
			.unwrap_err();
		assert_eq!(err.to_string(), "empty.ifc: empty model");
	}
}

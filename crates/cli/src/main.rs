//! idslab binary.
//!
//! Drives an execution host process (see `[host]` in the config file) to create, describe and
//! audit IDS documents.

mod cli;
mod commands;

use std::io::Write;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command};
use idslab_app::{AppConfig, Workspace};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
	let cli = Cli::parse();
	setup_tracing(cli.verbose)?;

	let config = match &cli.config {
		Some(path) => AppConfig::load(path)?,
		None => AppConfig::load_default()?,
	};
	debug!(host = %config.host.command, "config loaded");

	let mut ws = Workspace::from_config(&config);
	let result = run(&mut ws, cli.command).await;
	ws.shutdown().await;
	result
}

async fn run(ws: &mut Workspace, command: Command) -> anyhow::Result<ExitCode> {
	let mut stdout = std::io::stdout();
	match command {
		Command::New { title, spec, output } => {
			let xml = commands::new_document(ws, title, spec).await?;
			match output {
				Some(path) => {
					tokio::fs::write(&path, xml)
						.await
						.with_context(|| format!("failed to write {}", path.display()))?;
					info!(path = %path.display(), "document written");
				}
				None => writeln!(stdout, "{xml}")?,
			}
			Ok(ExitCode::SUCCESS)
		}
		Command::Describe { file } => {
			let xml = tokio::fs::read_to_string(&file)
				.await
				.with_context(|| format!("failed to read {}", file.display()))?;
			commands::describe(ws, xml, &mut stdout).await?;
			Ok(ExitCode::SUCCESS)
		}
		Command::Audit { model, rules, html } => {
			let bytes = tokio::fs::read(&model)
				.await
				.with_context(|| format!("failed to read {}", model.display()))?;
			let xml = tokio::fs::read_to_string(&rules)
				.await
				.with_context(|| format!("failed to read {}", rules.display()))?;
			let name = model
				.file_name()
				.map_or_else(|| model.display().to_string(), |name| name.to_string_lossy().into_owned());

			let report = commands::audit(ws, name, bytes, xml, &mut stdout).await?;
			if let Some(path) = html {
				let page = report.html.as_deref().context("host produced no HTML report")?;
				tokio::fs::write(&path, page)
					.await
					.with_context(|| format!("failed to write {}", path.display()))?;
				info!(path = %path.display(), "HTML report written");
			}
			Ok(if report.data.status {
				ExitCode::SUCCESS
			} else {
				ExitCode::FAILURE
			})
		}
	}
}

/// Installs the global subscriber, writing to stderr.
fn setup_tracing(verbose: bool) -> anyhow::Result<()> {
	let subscriber = tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_max_level(if verbose {
			tracing::Level::DEBUG
		} else {
			tracing::Level::INFO
		})
		.finish();
	tracing::subscriber::set_global_default(subscriber)?;
	Ok(())
}

//! CLI schema for the idslab binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "idslab")]
#[command(about = "Author IDS rule documents and audit IFC models against them")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Config file (defaults to $XDG_CONFIG_HOME/idslab/config.toml)
	#[arg(long, value_name = "PATH", global = true)]
	pub config: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long, global = true)]
	pub verbose: bool,

	/// Subcommand to execute.
	#[command(subcommand)]
	pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
	/// Create a document with one specification and write its IDS XML
	New {
		/// Document title
		#[arg(long)]
		title: String,
		/// Name of the initial specification
		#[arg(long, value_name = "NAME")]
		spec: Option<String>,
		/// Output file (stdout if omitted)
		#[arg(short, long, value_name = "FILE")]
		output: Option<PathBuf>,
	},
	/// Print every specification of a document with one sentence per facet
	Describe {
		/// IDS file to read
		#[arg(value_name = "FILE.ids")]
		file: PathBuf,
	},
	/// Audit a model against a document
	Audit {
		/// IFC model to load
		#[arg(value_name = "MODEL.ifc")]
		model: PathBuf,
		/// IDS rules to check
		#[arg(value_name = "RULES.ids")]
		rules: PathBuf,
		/// Also write the HTML report here
		#[arg(long, value_name = "FILE")]
		html: Option<PathBuf>,
	},
}

//! TOML configuration.
//!
//! ```toml
//! dispose_grace_ms = 2000
//! autocomplete_schemas = ["IFC2X3", "IFC4"]
//!
//! [host]
//! command = "idslab-host"
//! args = []
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use idslab_ids::IfcVersion;
use idslab_rpc::{ClientOptions, HostConfig, ProcessLauncher};
use serde::{Deserialize, Serialize};

/// Default host executable.
pub const DEFAULT_HOST_COMMAND: &str = "idslab-host";

/// Application configuration. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
	/// How long `dispose` waits for the host's cleanup.
	pub dispose_grace_ms: u64,
	/// Schemas whose entity classes feed autocompletion.
	pub autocomplete_schemas: Vec<IfcVersion>,
	/// Execution host process.
	pub host: HostConfig,
}

impl Default for AppConfig {
	fn default() -> Self {
		Self {
			dispose_grace_ms: 2000,
			autocomplete_schemas: vec![IfcVersion::Ifc2x3, IfcVersion::Ifc4],
			host: HostConfig {
				command: DEFAULT_HOST_COMMAND.to_owned(),
				..HostConfig::default()
			},
		}
	}
}

/// Configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// The file exists but could not be read.
	#[error("failed to read {}: {source}", path.display())]
	Read {
		/// Config file.
		path: PathBuf,
		/// Underlying error.
		#[source]
		source: std::io::Error,
	},
	/// The file is not valid configuration.
	#[error("invalid config {}: {source}", path.display())]
	Parse {
		/// Config file.
		path: PathBuf,
		/// Underlying error.
		#[source]
		source: toml::de::Error,
	},
}

impl AppConfig {
	/// Loads `path`; a missing file yields the defaults.
	///
	/// # Errors
	///
	/// Returns [`ConfigError`] when the file cannot be read or parsed.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let text = match std::fs::read_to_string(path) {
			Ok(text) => text,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				tracing::debug!(path = %path.display(), "no config file, using defaults");
				return Ok(Self::default());
			}
			Err(source) => {
				return Err(ConfigError::Read {
					path: path.to_owned(),
					source,
				});
			}
		};
		toml::from_str(&text).map_err(|source| ConfigError::Parse {
			path: path.to_owned(),
			source,
		})
	}

	/// Loads the config at [`default_config_path`], or the defaults when there is none.
	///
	/// # Errors
	///
	/// See [`AppConfig::load`].
	pub fn load_default() -> Result<Self, ConfigError> {
		match default_config_path() {
			Some(path) => Self::load(&path),
			None => Ok(Self::default()),
		}
	}

	/// Client options derived from this configuration.
	pub fn client_options(&self) -> ClientOptions {
		ClientOptions {
			dispose_grace: Duration::from_millis(self.dispose_grace_ms),
		}
	}

	/// Launcher for the configured host process.
	pub fn launcher(&self) -> ProcessLauncher {
		ProcessLauncher::new(self.host.clone())
	}
}

/// Returns the default config file location.
///
/// # Resolution Order
///
/// 1. `IDSLAB_CONFIG` environment variable.
/// 2. `idslab/config.toml` under the platform config directory (e.g. `$XDG_CONFIG_HOME`).
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
	if let Some(path) = std::env::var_os("IDSLAB_CONFIG") {
		return Some(PathBuf::from(path));
	}
	dirs::config_dir().map(|dir| dir.join("idslab").join("config.toml"))
}

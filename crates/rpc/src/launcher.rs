//! Host launchers.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::channel::Endpoint;
use crate::error::{Error, Result};
use crate::io::spawn_io_endpoint;

/// A started host: the client's end of the channel plus a token that tears the host down.
#[derive(Debug)]
pub struct HostConnection {
	/// Client side of the channel.
	pub endpoint: Endpoint,
	/// Cancelling stops the host and its transport tasks.
	pub shutdown: CancellationToken,
}

/// Starts execution hosts.
///
/// Called once per session; the client relaunches after a transport failure or dispose.
#[async_trait]
pub trait HostLauncher: Send + Sync + 'static {
	/// Starts a host. Readiness is negotiated separately with an `init` envelope.
	async fn launch(&self) -> Result<HostConnection>;
}

/// Child process host configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
	/// Executable to run.
	pub command: String,
	/// Arguments passed to the command.
	#[serde(default)]
	pub args: Vec<String>,
	/// Extra environment variables.
	#[serde(default)]
	pub env: BTreeMap<String, String>,
	/// Working directory; inherited when unset.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cwd: Option<PathBuf>,
}

/// Runs the host as a child process speaking JSON lines over stdin/stdout.
///
/// Host stderr is forwarded to the log line by line.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
	config: HostConfig,
}

impl ProcessLauncher {
	/// Creates a launcher for `config`.
	pub fn new(config: HostConfig) -> Self {
		Self { config }
	}
}

#[async_trait]
impl HostLauncher for ProcessLauncher {
	async fn launch(&self) -> Result<HostConnection> {
		let cfg = &self.config;
		let mut cmd = Command::new(&cfg.command);
		cmd.args(&cfg.args)
			.envs(&cfg.env)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);
		if let Some(cwd) = &cfg.cwd {
			cmd.current_dir(cwd);
		}

		let mut child = cmd
			.spawn()
			.map_err(|e| Error::Launch(format!("{}: {e}", cfg.command)))?;
		let pid = child.id();
		let (Some(stdin), Some(stdout), Some(stderr)) = (child.stdin.take(), child.stdout.take(), child.stderr.take())
		else {
			return Err(Error::Launch(format!("{}: stdio not captured", cfg.command)));
		};
		info!(command = %cfg.command, pid, "launched host process");

		tokio::spawn(async move {
			let mut lines = BufReader::new(stderr).lines();
			while let Ok(Some(line)) = lines.next_line().await {
				warn!(pid, stderr = %line, "host stderr");
			}
		});

		let shutdown = CancellationToken::new();
		let endpoint = spawn_io_endpoint(stdout, stdin, shutdown.clone());

		let token = shutdown.clone();
		tokio::spawn(async move {
			tokio::select! {
				_ = token.cancelled() => {
					if let Err(e) = child.kill().await {
						warn!(pid, error = %e, "failed to kill host process");
					}
				}
				status = child.wait() => match status {
					Ok(status) => info!(pid, %status, "host process exited"),
					Err(e) => error!(pid, error = %e, "host process wait failed"),
				},
			}
		});

		Ok(HostConnection { endpoint, shutdown })
	}
}

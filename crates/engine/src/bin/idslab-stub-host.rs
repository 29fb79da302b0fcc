//! Execution host serving the stub engine over stdin/stdout.
//!
//! Speaks JSON-lines envelopes, so it can stand in for a real engine host behind
//! `idslab_rpc::ProcessLauncher`. Logs go to stderr, which the client forwards to its own log.

use std::sync::Arc;

use idslab_engine::serve_io;
use idslab_engine::testing::StubEngine;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_ansi(false)
		.with_max_level(tracing::Level::INFO)
		.init();

	info!("starting stub host");
	serve_io(
		Arc::new(StubEngine::new()),
		tokio::io::stdin(),
		tokio::io::stdout(),
		CancellationToken::new(),
	)
	.await;
}

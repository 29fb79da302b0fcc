//! JSON-lines framing: one envelope per line.
//!
//! [`spawn_io_endpoint`] adapts any byte stream pair to an [`Endpoint`], so the client and the
//! host serve loop can talk over a child process's stdio exactly as they do in memory.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::channel::{ChannelEvent, ChannelSender, Endpoint};
use crate::envelope::Envelope;


/// Reads the next envelope.
///
/// Blank lines are skipped, and so are lines that do not decode (with a warning). Returns
/// `Ok(None)` at end of stream.
pub async fn read_envelope<R>(reader: &mut R) -> std::io::Result<Option<Envelope>>
where
	R: AsyncBufRead + Unpin,
{
	let mut line = String::new();
	loop {
		line.clear();
		if reader.read_line(&mut line).await? == 0 {
			return Ok(None);
		}
		let text = line.trim();
		if text.is_empty() {
			continue;
		}
		match serde_json::from_str(text) {
			Ok(envelope) => return Ok(Some(envelope)),
			Err(e) => warn!(error = %e, line = %text, "skipping undecodable envelope line"),
		}
	}
}

/// Writes one envelope followed by a newline and flushes.
pub async fn write_envelope<W>(writer: &mut W, envelope: &Envelope) -> std::io::Result<()>
where
	W: AsyncWrite + Unpin,
{
	let mut line = serde_json::to_vec(envelope)?;
	line.push(b'\n');
	writer.write_all(&line).await?;
	writer.flush().await
}

/// Spawns reader and writer tasks bridging a byte stream pair to an [`Endpoint`].
///
/// End of input closes the endpoint's receiver; a read or write error is delivered as
/// [`ChannelEvent::Failed`]. Cancelling `shutdown` stops both tasks and shuts the writer down.
pub fn spawn_io_endpoint<R, W>(reader: R, writer: W, shutdown: CancellationToken) -> Endpoint
where
	R: AsyncRead + Unpin + Send + 'static,
	W: AsyncWrite + Unpin + Send + 'static,
{
	let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
	let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

	tokio::spawn(write_loop(writer, outbound_rx, inbound_tx.downgrade(), shutdown.clone()));
	tokio::spawn(read_loop(BufReader::new(reader), inbound_tx, shutdown));

	Endpoint {
		sender: ChannelSender::new(outbound_tx),
		receiver: inbound_rx,
	}
}

async fn read_loop<R>(
	mut reader: BufReader<R>,
	inbound: mpsc::UnboundedSender<ChannelEvent>,
	shutdown: CancellationToken,
) where
	R: AsyncRead + Unpin,
{
	loop {
		let next = tokio::select! {
			biased;
			_ = shutdown.cancelled() => break,
			next = read_envelope(&mut reader) => next,
		};
		match next {
			Ok(Some(envelope)) => {
				if inbound.send(ChannelEvent::Message(envelope)).is_err() {
					break;
				}
			}
			Ok(None) => {
				debug!("input stream ended");
				break;
			}
			Err(e) => {
				error!(error = %e, "envelope read failed");
				let _ = inbound.send(ChannelEvent::Failed(format!("read failed: {e}")));
				break;
			}
		}
	}
}

async fn write_loop<W>(
	mut writer: W,
	mut outbound: mpsc::UnboundedReceiver<ChannelEvent>,
	inbound: mpsc::WeakUnboundedSender<ChannelEvent>,
	shutdown: CancellationToken,
) where
	W: AsyncWrite + Unpin,
{
	loop {
		let event = tokio::select! {
			biased;
			_ = shutdown.cancelled() => break,
			event = outbound.recv() => event,
		};
		match event {
			Some(ChannelEvent::Message(envelope)) => {
				if let Err(e) = write_envelope(&mut writer, &envelope).await {
					error!(error = %e, "envelope write failed");
					if let Some(inbound) = inbound.upgrade() {
						let _ = inbound.send(ChannelEvent::Failed(format!("write failed: {e}")));
					}
					break;
				}
			}
			Some(ChannelEvent::Failed(reason)) => {
				debug!(%reason, "closing output stream");
				break;
			}
			None => break,
		}
	}
	let _ = writer.shutdown().await;
}

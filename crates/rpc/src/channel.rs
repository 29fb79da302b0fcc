//! In-memory message channel between client and host.

use tokio::sync::mpsc;

use crate::envelope::Envelope;
use crate::error::{Error, Result};

/// Failure reason reported when the peer drops its end.
pub const CHANNEL_CLOSED: &str = "host channel closed";

/// What an endpoint can receive.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
	/// An envelope from the peer.
	Message(Envelope),
	/// The transport failed; no further messages will arrive.
	Failed(String),
}

/// Sending half of an [`Endpoint`].
#[derive(Debug, Clone)]
pub struct ChannelSender {
	tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl ChannelSender {
	/// Wraps a raw event sender.
	pub fn new(tx: mpsc::UnboundedSender<ChannelEvent>) -> Self {
		Self { tx }
	}

	/// Sends an envelope to the peer.
	///
	/// # Errors
	///
	/// Returns [`Error::Transport`] once the peer has gone away.
	pub fn send(&self, envelope: Envelope) -> Result<()> {
		self.tx
			.send(ChannelEvent::Message(envelope))
			.map_err(|_| Error::Transport(CHANNEL_CLOSED.to_owned()))
	}

	/// Reports a transport failure to the peer.
	pub fn fail(&self, reason: impl Into<String>) {
		let _ = self.tx.send(ChannelEvent::Failed(reason.into()));
	}

	/// Returns true once the peer's receiver is gone.
	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}
}

/// One side of a bidirectional channel.
#[derive(Debug)]
pub struct Endpoint {
	/// Delivers events to the peer.
	pub sender: ChannelSender,
	/// Events from the peer; `None` means the peer dropped its sender.
	pub receiver: mpsc::UnboundedReceiver<ChannelEvent>,
}

/// Creates two crossed endpoints: what one sends, the other receives.
pub fn pair() -> (Endpoint, Endpoint) {
	let (a_tx, a_rx) = mpsc::unbounded_channel();
	let (b_tx, b_rx) = mpsc::unbounded_channel();
	(
		Endpoint {
			sender: ChannelSender::new(b_tx),
			receiver: a_rx,
		},
		Endpoint {
			sender: ChannelSender::new(a_tx),
			receiver: b_rx,
		},
	)
}

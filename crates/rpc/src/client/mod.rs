//! Client side of the bridge.
//!
//! An [`RpcClient`] owns at most one host session at a time. A session is one launch of the
//! host together with its own [`Correlator`] and pump task, so events from a torn-down session
//! can never settle calls of a newer one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::channel::{CHANNEL_CLOSED, ChannelEvent, ChannelSender};
use crate::correlator::{Correlator, Outcome};
use crate::envelope::{CorrelationIdGen, Envelope, ErrorPayload, Kind};
use crate::error::{Error, Result};
use crate::launcher::{HostConnection, HostLauncher};
use crate::method::{CallPayload, Cleanup, Method};

mod state;
#[cfg(test)]
mod tests;

pub use state::BridgeState;

/// Client tuning.
#[derive(Debug, Clone)]
pub struct ClientOptions {
	/// How long [`RpcClient::dispose`] waits for the host to acknowledge cleanup.
	pub dispose_grace: Duration,
}

impl Default for ClientOptions {
	fn default() -> Self {
		Self {
			dispose_grace: Duration::from_secs(2),
		}
	}
}

type InitResult = Option<Result<Arc<Session>>>;

/// An init attempt in progress.
struct InFlight {
	attempt: u64,
	rx: watch::Receiver<InitResult>,
	cancel: CancellationToken,
}

struct Session {
	sender: ChannelSender,
	correlator: Correlator,
	shutdown: CancellationToken,
}

impl Session {
	async fn request(&self, ids: &CorrelationIdGen, method: &str, args: JsonValue) -> Outcome {
		let id = ids.next();
		let payload = serde_json::to_value(CallPayload {
			method: method.to_owned(),
			args,
		})
		.map_err(|e| Error::Encode {
			method: method.to_owned(),
			reason: e.to_string(),
		})?;

		let rx = self.correlator.register(id.clone());
		debug!(correlation_id = %id, method, "call");
		if let Err(e) = self.sender.send(Envelope::call(id.clone(), payload)) {
			self.correlator.settle(&id, Err(e.clone()));
		}
		rx.await
			.unwrap_or_else(|_| Err(Error::Transport(CHANNEL_CLOSED.to_owned())))
	}

	/// Routes one inbound envelope. Returns a failure reason when the session must end.
	fn dispatch(&self, envelope: Envelope) -> Option<String> {
		let Envelope {
			kind,
			payload,
			correlation_id,
		} = envelope;
		debug!(%kind, correlation_id = ?correlation_id, "envelope received");

		if kind == Kind::Disposed {
			return Some("host disposed".to_owned());
		}
		let Some(id) = correlation_id else {
			warn!(%kind, "envelope without correlation id dropped");
			return None;
		};
		match kind {
			Kind::Ready | Kind::Response => {
				self.correlator.settle(&id, Ok(payload));
			}
			Kind::Error => {
				self.correlator.settle(&id, Err(ErrorPayload::from_value(payload).into()));
			}
			Kind::Init | Kind::Call | Kind::Disposed => {
				warn!(%kind, correlation_id = %id, "unexpected envelope from host dropped");
			}
		}
		None
	}

	fn close(&self, error: Error) -> usize {
		self.shutdown.cancel();
		self.correlator.close(error)
	}
}

/// Reads host events until the session ends, then fails whatever is still pending.
async fn pump(inner: Weak<Inner>, session: Arc<Session>, mut receiver: mpsc::UnboundedReceiver<ChannelEvent>) {
	let reason = loop {
		let event = tokio::select! {
			biased;
			_ = session.shutdown.cancelled() => return,
			event = receiver.recv() => event,
		};
		match event {
			Some(ChannelEvent::Message(envelope)) => {
				if let Some(reason) = session.dispatch(envelope) {
					break reason;
				}
			}
			Some(ChannelEvent::Failed(reason)) => break reason,
			None => break CHANNEL_CLOSED.to_owned(),
		}
	};

	let settled = session.close(Error::Transport(reason.clone()));
	error!(%reason, pending = settled, "host transport failed");
	if let Some(inner) = inner.upgrade() {
		inner.session_lost(&session);
	}
}

struct Inner {
	launcher: Arc<dyn HostLauncher>,
	options: ClientOptions,
	ids: CorrelationIdGen,
	state_tx: watch::Sender<BridgeState>,
	session: Mutex<Option<Arc<Session>>>,
	/// Lock order: `inflight` before `session`.
	inflight: Mutex<Option<InFlight>>,
	attempts: AtomicU64,
}

impl Inner {
	fn set_state(&self, state: BridgeState) {
		let previous = self.state_tx.send_replace(state);
		if previous != state {
			debug!(from = ?previous, to = ?state, "bridge state changed");
		}
	}

	fn session_lost(&self, session: &Arc<Session>) {
		let mut current = self.session.lock();
		if current.as_ref().is_some_and(|s| Arc::ptr_eq(s, session)) {
			*current = None;
			drop(current);
			self.set_state(BridgeState::Uninitialized);
		}
	}

	/// Launches a host and waits for `ready`, giving up early when `cancel` fires.
	async fn start_session(self: &Arc<Self>, cancel: &CancellationToken) -> Result<Arc<Session>> {
		self.set_state(BridgeState::Initializing);

		let HostConnection { endpoint, shutdown } = tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(Error::Disposed),
			launched = self.launcher.launch() => launched?,
		};
		let session = Arc::new(Session {
			sender: endpoint.sender,
			correlator: Correlator::new(),
			shutdown,
		});
		tokio::spawn(pump(Arc::downgrade(self), Arc::clone(&session), endpoint.receiver));

		let id = self.ids.next();
		let ready = session.correlator.register(id.clone());
		debug!(correlation_id = %id, "init");
		if let Err(e) = session.sender.send(Envelope::init(id)) {
			session.close(e.clone());
			return Err(e);
		}

		let outcome = tokio::select! {
			biased;
			_ = cancel.cancelled() => Err(Error::Disposed),
			outcome = ready => outcome.unwrap_or_else(|_| Err(Error::Transport(CHANNEL_CLOSED.to_owned()))),
		};
		match outcome {
			Ok(_) => Ok(session),
			Err(e) => {
				session.close(e.clone());
				Err(e)
			}
		}
	}

	/// Runs one init attempt to completion and publishes its result.
	async fn run_init(self: Arc<Self>, attempt: u64, tx: watch::Sender<InitResult>, cancel: CancellationToken) {
		let started = self.start_session(&cancel).await;

		let result = {
			let mut inflight = self.inflight.lock();
			// Dispose may already have replaced this attempt with a newer one.
			if inflight.as_ref().is_some_and(|current| current.attempt == attempt) {
				*inflight = None;
			}
			let started = match started {
				Ok(session) if cancel.is_cancelled() => {
					session.close(Error::Disposed);
					Err(Error::Disposed)
				}
				Ok(session) if session.correlator.is_closed() => Err(Error::Transport(CHANNEL_CLOSED.to_owned())),
				other => other,
			};
			match started {
				Ok(session) => {
					*self.session.lock() = Some(Arc::clone(&session));
					self.set_state(BridgeState::Ready);
					info!("host ready");
					Ok(session)
				}
				Err(e) => {
					if !cancel.is_cancelled() {
						warn!(error = %e, "host initialization failed");
						self.set_state(BridgeState::Uninitialized);
					}
					Err(e)
				}
			}
		};
		let _ = tx.send(Some(result));
	}
}

impl Drop for Inner {
	fn drop(&mut self) {
		if let Some(session) = self.session.get_mut().take() {
			session.close(Error::Disposed);
		}
	}
}

/// Handle to a host reached through a [`HostLauncher`].
///
/// Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct RpcClient {
	inner: Arc<Inner>,
}

impl std::fmt::Debug for RpcClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RpcClient")
			.field("state", &self.state())
			.field("pending", &self.pending_count())
			.finish_non_exhaustive()
	}
}

impl RpcClient {
	/// Creates a client with default options. Nothing is launched until the first call.
	pub fn new(launcher: impl HostLauncher) -> Self {
		Self::with_options(launcher, ClientOptions::default())
	}

	/// Creates a client with explicit options.
	pub fn with_options(launcher: impl HostLauncher, options: ClientOptions) -> Self {
		Self::from_shared(Arc::new(launcher), options)
	}

	/// Creates a client around an already shared launcher.
	pub fn from_shared(launcher: Arc<dyn HostLauncher>, options: ClientOptions) -> Self {
		let (state_tx, _) = watch::channel(BridgeState::Uninitialized);
		Self {
			inner: Arc::new(Inner {
				launcher,
				options,
				ids: CorrelationIdGen::new(),
				state_tx,
				session: Mutex::new(None),
				inflight: Mutex::new(None),
				attempts: AtomicU64::new(0),
			}),
		}
	}

	/// Current lifecycle state.
	pub fn state(&self) -> BridgeState {
		*self.inner.state_tx.borrow()
	}

	/// Subscribe to lifecycle changes.
	pub fn subscribe_state(&self) -> watch::Receiver<BridgeState> {
		self.inner.state_tx.subscribe()
	}

	/// Calls awaiting a reply in the current session.
	pub fn pending_count(&self) -> usize {
		self.inner
			.session
			.lock()
			.as_ref()
			.map_or(0, |s| s.correlator.pending_count())
	}

	/// Launches the host and waits until it is ready.
	///
	/// Memoized: once ready, returns immediately. Concurrent callers share one attempt, which runs
	/// in its own task so a caller dropping out cannot strand the others. A failed attempt resets
	/// the client so the next call starts over.
	pub async fn init(&self) -> Result<()> {
		self.session().await.map(|_| ())
	}

	async fn session(&self) -> Result<Arc<Session>> {
		let mut rx = {
			let mut inflight = self.inner.inflight.lock();
			if let Some(session) = self.inner.session.lock().as_ref() {
				return Ok(Arc::clone(session));
			}
			match inflight.as_ref() {
				Some(attempt) => attempt.rx.clone(),
				None => {
					let (tx, rx) = watch::channel(None);
					let cancel = CancellationToken::new();
					let attempt = self.inner.attempts.fetch_add(1, Ordering::Relaxed);
					*inflight = Some(InFlight {
						attempt,
						rx: rx.clone(),
						cancel: cancel.clone(),
					});
					tokio::spawn(Arc::clone(&self.inner).run_init(attempt, tx, cancel));
					rx
				}
			}
		};

		loop {
			if let Some(result) = rx.borrow_and_update().as_ref() {
				return result.clone();
			}
			if rx.changed().await.is_err() {
				return Err(Error::Launch("init attempt ended without a result".to_owned()));
			}
		}
	}

	/// Calls a typed remote procedure, initializing first if needed.
	///
	/// # Errors
	///
	/// [`Error::Application`] when the host reports a failure, [`Error::Transport`] when the
	/// channel fails, [`Error::Disposed`] when the client is disposed meanwhile.
	pub async fn call<M: Method>(&self, method: &M) -> Result<M::Output> {
		let args = serde_json::to_value(method).map_err(|e| Error::Encode {
			method: M::NAME.to_owned(),
			reason: e.to_string(),
		})?;
		let payload = self.request(M::NAME, args).await?;
		serde_json::from_value(payload).map_err(|e| Error::Decode {
			method: M::NAME.to_owned(),
			reason: e.to_string(),
		})
	}

	/// Calls a remote procedure by name with a raw argument object.
	pub async fn request(&self, method: &str, args: JsonValue) -> Result<JsonValue> {
		let session = self.session().await?;
		session.request(&self.inner.ids, method, args).await
	}

	/// Shuts the host down.
	///
	/// Pending calls fail with [`Error::Disposed`]. The host is then asked to clean up, bounded by
	/// [`ClientOptions::dispose_grace`], before the channel is torn down. Safe to call before
	/// [`Self::init`] and more than once; a later call starts a new session.
	pub async fn dispose(&self) {
		let session = {
			let mut inflight = self.inner.inflight.lock();
			if let Some(attempt) = inflight.take() {
				attempt.cancel.cancel();
			}
			self.inner.session.lock().take()
		};
		self.inner.set_state(BridgeState::Disposed);

		let Some(session) = session else {
			debug!("dispose without a live session");
			return;
		};
		let settled = session.correlator.settle_all_pending(Error::Disposed);

		let args = serde_json::to_value(Cleanup::default()).unwrap_or_default();
		let grace = self.inner.options.dispose_grace;
		match tokio::time::timeout(grace, session.request(&self.inner.ids, Cleanup::NAME, args)).await {
			Ok(Ok(_)) => debug!("host cleanup acknowledged"),
			Ok(Err(e)) => warn!(error = %e, "host cleanup failed"),
			Err(_) => warn!(grace_ms = grace.as_millis() as u64, "host cleanup timed out"),
		}

		session.close(Error::Disposed);
		info!(pending = settled, "client disposed");
	}
}

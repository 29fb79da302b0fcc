//! Pending-call registry.
//!
//! Every outstanding call owns a one-shot completion keyed by its correlation id. A completion is
//! removed on the first terminal envelope or on bulk settlement, whichever comes first, so each
//! call settles at most once. The map is private; only the operations below touch it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::envelope::CorrelationId;
use crate::error::{Error, Result};

#[cfg(test)]
mod tests;

/// How a pending call ends: the raw response payload, or an error.
pub type Outcome = Result<JsonValue>;

struct Pending {
	calls: HashMap<CorrelationId, oneshot::Sender<Outcome>>,
	/// Set once the owning session is torn down; later registrations fail with it.
	closed: Option<Error>,
}

/// Pairs terminal envelopes with the calls waiting on them.
pub struct Correlator {
	pending: Mutex<Pending>,
	unknown: AtomicU64,
}

impl Correlator {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self {
			pending: Mutex::new(Pending {
				calls: HashMap::new(),
				closed: None,
			}),
			unknown: AtomicU64::new(0),
		}
	}

	/// Registers a pending call and returns its completion.
	///
	/// On a closed registry the completion resolves immediately with the closing error.
	pub fn register(&self, id: CorrelationId) -> oneshot::Receiver<Outcome> {
		let (tx, rx) = oneshot::channel();
		let mut pending = self.pending.lock();
		if let Some(error) = &pending.closed {
			let _ = tx.send(Err(error.clone()));
			return rx;
		}
		if pending.calls.insert(id.clone(), tx).is_some() {
			warn!(correlation_id = %id, "correlation id reused, earlier call abandoned");
		}
		rx
	}

	/// Settles the call registered under `id`.
	///
	/// Returns false when no such call is pending: the id was never issued, was already settled,
	/// or was swept by [`Self::settle_all_pending`]. Such envelopes are logged and counted, never
	/// propagated.
	pub fn settle(&self, id: &CorrelationId, outcome: Outcome) -> bool {
		let Some(tx) = self.pending.lock().calls.remove(id) else {
			self.unknown.fetch_add(1, Ordering::Relaxed);
			warn!(correlation_id = %id, "terminal envelope for unknown correlation id dropped");
			return false;
		};
		if tx.send(outcome).is_err() {
			debug!(correlation_id = %id, "caller gone before settlement");
		}
		true
	}

	/// Rejects every pending call with `error` and empties the registry.
	///
	/// Returns the number of calls settled.
	pub fn settle_all_pending(&self, error: Error) -> usize {
		let calls: Vec<_> = self.pending.lock().calls.drain().collect();
		Self::reject(calls, &error)
	}

	/// Like [`Self::settle_all_pending`], and every later registration fails with `error` too.
	pub fn close(&self, error: Error) -> usize {
		let calls: Vec<_> = {
			let mut pending = self.pending.lock();
			pending.closed.get_or_insert_with(|| error.clone());
			pending.calls.drain().collect()
		};
		Self::reject(calls, &error)
	}

	fn reject(calls: Vec<(CorrelationId, oneshot::Sender<Outcome>)>, error: &Error) -> usize {
		let count = calls.len();
		for (_, tx) in calls {
			let _ = tx.send(Err(error.clone()));
		}
		if count > 0 {
			debug!(pending = count, %error, "settled pending calls");
		}
		count
	}

	/// Returns true once [`Self::close`] has run.
	pub fn is_closed(&self) -> bool {
		self.pending.lock().closed.is_some()
	}

	/// Number of calls awaiting a terminal envelope.
	pub fn pending_count(&self) -> usize {
		self.pending.lock().calls.len()
	}

	/// Number of terminal envelopes dropped because their id was not pending.
	pub fn unknown_settlements(&self) -> u64 {
		self.unknown.load(Ordering::Relaxed)
	}
}

impl Default for Correlator {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for Correlator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Correlator")
			.field("pending", &self.pending_count())
			.field("unknown", &self.unknown_settlements())
			.finish_non_exhaustive()
	}
}

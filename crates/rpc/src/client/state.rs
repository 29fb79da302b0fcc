//! Client lifecycle state.

/// Lifecycle of an [`RpcClient`](super::RpcClient).
///
/// `Disposed` is not final: a later call starts a fresh session.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BridgeState {
	/// No host session; the next call launches one.
	Uninitialized,
	/// Host launched, waiting for `ready`.
	Initializing,
	/// Host ready for calls.
	Ready,
	/// Explicitly disposed.
	Disposed,
}

//! Asynchronous request/response bridge to an isolated execution host.
//!
//! The host is reachable only through an unordered message channel and may take a long time to
//! become ready. This crate turns that channel into awaitable calls:
//! * [`Envelope`]: the wire unit, correlated by a client-generated [`CorrelationId`]
//! * [`Correlator`]: pairs terminal envelopes with pending calls, settling each at most once
//! * [`RpcClient`]: lifecycle (memoized init, dispose, transport failure) plus typed [`Method`] calls
//! * [`HostLauncher`]: starts a host and hands back its channel [`Endpoint`]
//! * [`io`]: JSON-lines framing so the same channel can run over a child process's stdio

#![warn(missing_docs)]

mod channel;
pub mod client;
mod correlator;
mod envelope;
mod error;
pub mod io;
mod launcher;
mod method;

pub use channel::{CHANNEL_CLOSED, ChannelEvent, ChannelSender, Endpoint, pair};
pub use client::{BridgeState, ClientOptions, RpcClient};
pub use correlator::{Correlator, Outcome};
pub use envelope::{CorrelationId, CorrelationIdGen, Envelope, ErrorPayload, Kind};
pub use error::{Error, Result};
pub use launcher::{HostConfig, HostConnection, HostLauncher, ProcessLauncher};
pub use method::{CallPayload, Cleanup, Method};

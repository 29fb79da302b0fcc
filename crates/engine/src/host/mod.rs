//! Host side of the bridge.
//!
//! [`serve`] drives an [`AuditEngine`] from the envelopes arriving on an [`Endpoint`]:
//!
//! * `init` runs the engine's one-time initialization (serialized; repeated `init`s after success
//!   answer `ready` at once);
//! * `call` decodes an [`EngineCall`] and runs it as its own task, so replies go out in completion
//!   order rather than arrival order;
//! * calls before the engine is ready are rejected with [`NOT_INITIALIZED`].
//!
//! The loop ends when the client's channel closes or fails, or when the shutdown token fires, and
//! says goodbye with a `disposed` envelope.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use idslab_rpc::io::spawn_io_endpoint;
use idslab_rpc::{
	ChannelEvent, ChannelSender, CorrelationId, Endpoint, Envelope, ErrorPayload, HostConnection, HostLauncher, Kind,
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::mpsc;
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::calls::EngineCall;
use crate::engine::{AuditEngine, EngineResult};


/// Error message for calls that arrive before the engine is initialized.
pub const NOT_INITIALIZED: &str = "engine not initialized";

/// Error message for calls whose handler panicked.
pub const HANDLER_PANICKED: &str = "engine call panicked";

/// Serves `engine` on `endpoint` until the channel closes or `shutdown` fires.
pub async fn serve(engine: Arc<dyn AuditEngine>, endpoint: Endpoint, shutdown: CancellationToken) {
	let Endpoint { sender, receiver } = endpoint;
	Host {
		engine,
		ready: Arc::new(AtomicBool::new(false)),
		init_lock: Arc::new(AsyncMutex::new(())),
		sender,
		tasks: JoinSet::new(),
		owners: HashMap::new(),
	}
	.run(receiver, shutdown)
	.await;
}

/// Serves `engine` over a JSON-lines byte stream pair, typically the process's stdin and stdout.
pub async fn serve_io<R, W>(engine: Arc<dyn AuditEngine>, reader: R, writer: W, shutdown: CancellationToken)
where
	R: AsyncRead + Unpin + Send + 'static,
	W: AsyncWrite + Unpin + Send + 'static,
{
	let endpoint = spawn_io_endpoint(reader, writer, shutdown.clone());
	serve(engine, endpoint, shutdown).await;
}

struct Host {
	engine: Arc<dyn AuditEngine>,
	ready: Arc<AtomicBool>,
	init_lock: Arc<AsyncMutex<()>>,
	sender: ChannelSender,
	/// Running `init` and `call` handlers; each yields its reply.
	tasks: JoinSet<Envelope>,
	/// Correlation id each running task answers.
	owners: HashMap<task::Id, CorrelationId>,
}

impl Host {
	async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<ChannelEvent>, shutdown: CancellationToken) {
		debug!("host serving");
		loop {
			tokio::select! {
				biased;

				_ = shutdown.cancelled() => {
					debug!("host shutdown requested");
					break;
				}
				joined = self.tasks.join_next_with_id(), if !self.tasks.is_empty() => {
					let reply = match joined {
						Some(Ok((task, reply))) => {
							self.owners.remove(&task);
							reply
						}
						Some(Err(e)) => {
							let Some(id) = self.owners.remove(&e.id()) else {
								continue;
							};
							error!(correlation_id = %id, error = %e, "host task failed");
							Envelope::error(id, ErrorPayload::new(HANDLER_PANICKED))
						}
						None => continue,
					};
					if self.sender.send(reply).is_err() {
						debug!("client went away");
						break;
					}
				}
				event = receiver.recv() => match event {
					Some(ChannelEvent::Message(envelope)) => self.accept(envelope),
					Some(ChannelEvent::Failed(reason)) => {
						error!(%reason, "client channel failed");
						break;
					}
					None => {
						debug!("client channel closed");
						break;
					}
				},
			}
		}

		self.tasks.shutdown().await;
		let _ = self.sender.send(Envelope::disposed());
		info!("host stopped");
	}

	fn accept(&mut self, envelope: Envelope) {
		let Envelope {
			kind,
			payload,
			correlation_id,
		} = envelope;
		let Some(id) = correlation_id else {
			warn!(%kind, "dropping envelope without correlation id");
			return;
		};
		debug!(%kind, correlation_id = %id, "host received envelope");

		match kind {
			Kind::Init => {
				let engine = self.engine.clone();
				let ready = self.ready.clone();
				let lock = self.init_lock.clone();
				let task = self.tasks.spawn(initialize(engine, ready, lock, id.clone())).id();
				self.owners.insert(task, id);
			}
			Kind::Call => {
				if !self.ready.load(Ordering::Acquire) {
					self.reply(Envelope::error(id, ErrorPayload::new(NOT_INITIALIZED)));
					return;
				}
				match serde_json::from_value::<EngineCall>(payload) {
					Ok(call) => {
						let engine = self.engine.clone();
						let ready = self.ready.clone();
						let task = self.tasks.spawn(run_call(engine, ready, id.clone(), call)).id();
						self.owners.insert(task, id);
					}
					Err(e) => {
						warn!(correlation_id = %id, error = %e, "rejecting undecodable call");
						self.reply(Envelope::error(id, ErrorPayload::new(format!("invalid call: {e}"))));
					}
				}
			}
			other => warn!(kind = %other, correlation_id = %id, "unexpected envelope from client"),
		}
	}

	fn reply(&self, envelope: Envelope) {
		if self.sender.send(envelope).is_err() {
			debug!("client went away before reply");
		}
	}
}

async fn initialize(
	engine: Arc<dyn AuditEngine>,
	ready: Arc<AtomicBool>,
	lock: Arc<AsyncMutex<()>>,
	id: CorrelationId,
) -> Envelope {
	let _guard = lock.lock().await;
	if ready.load(Ordering::Acquire) {
		return Envelope::ready(id);
	}
	match engine.init().await {
		Ok(()) => {
			ready.store(true, Ordering::Release);
			info!("engine ready");
			Envelope::ready(id)
		}
		Err(e) => {
			error!(error = %e, "engine initialization failed");
			Envelope::error(id, e.into())
		}
	}
}

async fn run_call(
	engine: Arc<dyn AuditEngine>,
	ready: Arc<AtomicBool>,
	id: CorrelationId,
	call: EngineCall,
) -> Envelope {
	let method = call.name();
	match dispatch(engine.as_ref(), &ready, call).await {
		Ok(payload) => Envelope::response(id, payload),
		Err(e) => {
			debug!(correlation_id = %id, method, error = %e, "call failed");
			Envelope::error(id, e.into())
		}
	}
}

async fn dispatch(engine: &dyn AuditEngine, ready: &AtomicBool, call: EngineCall) -> EngineResult<JsonValue> {
	match call {
		EngineCall::GetAllEntityClasses(c) => to_json(engine.entity_classes(c.schema).await?),
		EngineCall::GetAllDataTypes(c) => to_json(engine.data_types(c.schema).await?),
		EngineCall::GetPredefinedTypes(c) => to_json(engine.predefined_types(c.schema, &c.entity).await?),
		EngineCall::GetEntityAttributes(c) => to_json(engine.entity_attributes(c.schema, &c.entity).await?),
		EngineCall::GetApplicablePsets(c) => {
			to_json(engine.applicable_psets(c.schema, &c.entity, &c.predefined_type).await?)
		}
		EngineCall::GetMaterialCategories(_) => to_json(engine.material_categories().await?),
		EngineCall::GetStandardClassificationSystems(_) => to_json(engine.classification_systems().await?),
		EngineCall::LoadIfc(c) => to_json(engine.load_ifc(&c.name, c.bytes).await?),
		EngineCall::UnloadIfc(c) => to_json(engine.unload_ifc(&c.model).await?),
		EngineCall::AuditIfc(c) => to_json(engine.audit_ifc(&c.model, &c.ids).await?),
		EngineCall::CreateIds(c) => engine.create_ids(c.info).await,
		EngineCall::OpenIds(c) => engine.open_ids(&c.xml, c.validate).await,
		EngineCall::ValidateIds(c) => to_json(engine.validate_ids(c.document).await?),
		EngineCall::ExportIds(c) => to_json(engine.export_ids(c.document).await?),
		EngineCall::CreateSpecification(c) => engine.create_specification(c.options).await,
		EngineCall::DeleteSpecification(c) => engine.delete_specification(c.document, c.index).await,
		EngineCall::CreateEntityFacet(c) => engine.create_facet(c.clause, c.options.into()).await,
		EngineCall::CreateAttributeFacet(c) => engine.create_facet(c.clause, c.options.into()).await,
		EngineCall::CreateClassificationFacet(c) => engine.create_facet(c.clause, c.options.into()).await,
		EngineCall::CreatePropertyFacet(c) => engine.create_facet(c.clause, c.options.into()).await,
		EngineCall::CreateMaterialFacet(c) => engine.create_facet(c.clause, c.options.into()).await,
		EngineCall::CreatePartOfFacet(c) => engine.create_facet(c.clause, c.options.into()).await,
		EngineCall::DeleteFacet(c) => {
			engine.delete_facet(c.specification, c.clause, c.kind, c.index).await
		}
		EngineCall::Cleanup(_) => {
			ready.store(false, Ordering::Release);
			engine.cleanup().await?;
			info!("engine cleaned up");
			Ok(JsonValue::Bool(true))
		}
	}
}

fn to_json<T: Serialize>(value: T) -> EngineResult<JsonValue> {
	Ok(serde_json::to_value(value)?)
}

type EngineFactory = dyn Fn() -> Arc<dyn AuditEngine> + Send + Sync;

/// Runs the host as a task in this process, with a fresh engine per launch.
#[derive(Clone)]
pub struct LocalLauncher {
	factory: Arc<EngineFactory>,
}

impl LocalLauncher {
	/// Creates a launcher building each session's engine with `factory`.
	pub fn new<E, F>(factory: F) -> Self
	where
		E: AuditEngine,
		F: Fn() -> E + Send + Sync + 'static,
	{
		Self {
			factory: Arc::new(move || Arc::new(factory()) as Arc<dyn AuditEngine>),
		}
	}
}

impl fmt::Debug for LocalLauncher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LocalLauncher").finish_non_exhaustive()
	}
}

#[async_trait]
impl HostLauncher for LocalLauncher {
	async fn launch(&self) -> idslab_rpc::Result<HostConnection> {
		let (endpoint, host) = idslab_rpc::pair();
		let shutdown = CancellationToken::new();
		tokio::spawn(serve((self.factory)(), host, shutdown.clone()));
		info!("launched in-process host");
		Ok(HostConnection { endpoint, shutdown })
	}
}

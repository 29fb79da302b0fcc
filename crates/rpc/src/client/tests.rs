use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde::Serialize;
use serde_json::json;

use super::*;
use crate::channel::{Endpoint, pair};
use crate::envelope::CorrelationId;

/// Launches in-memory hosts and hands their endpoints to the test.
struct TestLauncher {
	launches: AtomicUsize,
	fail_next: AtomicBool,
	hosts: mpsc::UnboundedSender<Endpoint>,
}

impl TestLauncher {
	fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Endpoint>) {
		let (hosts, rx) = mpsc::unbounded_channel();
		let launcher = Arc::new(Self {
			launches: AtomicUsize::new(0),
			fail_next: AtomicBool::new(false),
			hosts,
		});
		(launcher, rx)
	}

	fn launches(&self) -> usize {
		self.launches.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl HostLauncher for TestLauncher {
	async fn launch(&self) -> Result<HostConnection> {
		self.launches.fetch_add(1, Ordering::SeqCst);
		if self.fail_next.swap(false, Ordering::SeqCst) {
			return Err(Error::Launch("no such host".into()));
		}
		let (client, host) = pair();
		let _ = self.hosts.send(host);
		Ok(HostConnection {
			endpoint: client,
			shutdown: CancellationToken::new(),
		})
	}
}

#[derive(Serialize)]
struct Echo {
	text: String,
}

impl Method for Echo {
	const NAME: &'static str = "echo";
	type Output = String;
}

fn echo(text: &str) -> Echo {
	Echo { text: text.into() }
}

fn client(launcher: &Arc<TestLauncher>) -> RpcClient {
	RpcClient::from_shared(launcher.clone(), ClientOptions::default())
}

async fn next_envelope(host: &mut Endpoint) -> Envelope {
	match host.receiver.recv().await {
		Some(ChannelEvent::Message(envelope)) => envelope,
		other => panic!("expected envelope, got {other:?}"),
	}
}

/// Takes the next launched host and answers its `init`.
async fn accept(hosts: &mut mpsc::UnboundedReceiver<Endpoint>) -> Endpoint {
	let mut host = hosts.recv().await.expect("host launched");
	let init = next_envelope(&mut host).await;
	assert_eq!(init.kind, Kind::Init);
	host.sender.send(Envelope::ready(init.correlation_id.unwrap())).unwrap();
	host
}

async fn ready_client(launcher: &Arc<TestLauncher>, hosts: &mut mpsc::UnboundedReceiver<Endpoint>) -> (RpcClient, Endpoint) {
	let client = client(launcher);
	let init = tokio::spawn({
		let client = client.clone();
		async move { client.init().await }
	});
	let host = accept(hosts).await;
	init.await.unwrap().unwrap();
	(client, host)
}

/// Receives a call and returns its id and payload.
async fn next_call(host: &mut Endpoint) -> (CorrelationId, CallPayload) {
	let envelope = next_envelope(host).await;
	assert_eq!(envelope.kind, Kind::Call);
	let payload = serde_json::from_value(envelope.payload).unwrap();
	(envelope.correlation_id.unwrap(), payload)
}

#[tokio::test]
async fn concurrent_init_launches_once() {
	let (launcher, mut hosts) = TestLauncher::new();
	let client = client(&launcher);

	let waiters: Vec<_> = (0..5)
		.map(|_| {
			let client = client.clone();
			tokio::spawn(async move { client.init().await })
		})
		.collect();

	let mut host = hosts.recv().await.unwrap();
	let init = next_envelope(&mut host).await;
	assert_eq!(client.state(), BridgeState::Initializing);
	host.sender.send(Envelope::ready(init.correlation_id.unwrap())).unwrap();

	for waiter in waiters {
		waiter.await.unwrap().unwrap();
	}
	assert_eq!(client.state(), BridgeState::Ready);

	client.init().await.unwrap();
	assert_eq!(launcher.launches(), 1);
	assert!(host.receiver.try_recv().is_err());
}

#[tokio::test]
async fn call_initializes_transparently() {
	let (launcher, mut hosts) = TestLauncher::new();
	let client = client(&launcher);

	let call = tokio::spawn({
		let client = client.clone();
		async move { client.call(&echo("hi")).await }
	});
	let mut host = accept(&mut hosts).await;
	let (id, payload) = next_call(&mut host).await;
	assert_eq!(payload.method, "echo");
	assert_eq!(payload.args, json!({ "text": "hi" }));
	host.sender.send(Envelope::response(id, json!("hi"))).unwrap();

	assert_eq!(call.await.unwrap(), Ok("hi".to_owned()));
}

#[tokio::test]
async fn calls_resolve_out_of_order() {
	let (launcher, mut hosts) = TestLauncher::new();
	let (client, mut host) = ready_client(&launcher, &mut hosts).await;

	let first = tokio::spawn({
		let client = client.clone();
		async move { client.call(&echo("first")).await }
	});
	let (first_id, _) = next_call(&mut host).await;
	let second = tokio::spawn({
		let client = client.clone();
		async move { client.call(&echo("second")).await }
	});
	let (second_id, _) = next_call(&mut host).await;
	assert_eq!(client.pending_count(), 2);

	host.sender.send(Envelope::response(second_id, json!("second"))).unwrap();
	assert_eq!(second.await.unwrap(), Ok("second".to_owned()));
	host.sender.send(Envelope::response(first_id, json!("first"))).unwrap();
	assert_eq!(first.await.unwrap(), Ok("first".to_owned()));
}

#[tokio::test]
async fn host_error_rejects_only_its_call() {
	let (launcher, mut hosts) = TestLauncher::new();
	let (client, mut host) = ready_client(&launcher, &mut hosts).await;

	let failing = tokio::spawn({
		let client = client.clone();
		async move { client.call(&echo("bad")).await }
	});
	let (failing_id, _) = next_call(&mut host).await;
	let passing = tokio::spawn({
		let client = client.clone();
		async move { client.call(&echo("good")).await }
	});
	let (passing_id, _) = next_call(&mut host).await;

	host.sender
		.send(Envelope::error(failing_id, ErrorPayload {
			message: "IfcOpenShell raised".into(),
			stack: Some("Traceback".into()),
		}))
		.unwrap();
	host.sender.send(Envelope::response(passing_id, json!("good"))).unwrap();

	assert_eq!(
		failing.await.unwrap(),
		Err(Error::Application {
			message: "IfcOpenShell raised".into(),
			stack: Some("Traceback".into()),
		})
	);
	assert_eq!(passing.await.unwrap(), Ok("good".to_owned()));
	assert_eq!(client.state(), BridgeState::Ready);
}

#[tokio::test]
async fn stray_replies_are_ignored() {
	let (launcher, mut hosts) = TestLauncher::new();
	let (client, mut host) = ready_client(&launcher, &mut hosts).await;

	let call = tokio::spawn({
		let client = client.clone();
		async move { client.call(&echo("x")).await }
	});
	let (id, _) = next_call(&mut host).await;
	host.sender.send(Envelope::response("bogus".into(), json!("nope"))).unwrap();
	host.sender.send(Envelope::response(id.clone(), json!("x"))).unwrap();
	host.sender.send(Envelope::response(id, json!("again"))).unwrap();

	assert_eq!(call.await.unwrap(), Ok("x".to_owned()));
	assert_eq!(client.state(), BridgeState::Ready);
}

#[tokio::test]
async fn undecodable_result_is_a_decode_error() {
	let (launcher, mut hosts) = TestLauncher::new();
	let (client, mut host) = ready_client(&launcher, &mut hosts).await;

	let call = tokio::spawn({
		let client = client.clone();
		async move { client.call(&echo("x")).await }
	});
	let (id, _) = next_call(&mut host).await;
	host.sender.send(Envelope::response(id, json!(42))).unwrap();

	assert!(matches!(call.await.unwrap(), Err(Error::Decode { method, .. }) if method == "echo"));
}

#[tokio::test]
async fn dispose_rejects_pending_and_next_call_relaunches() {
	let (launcher, mut hosts) = TestLauncher::new();
	let (client, mut host) = ready_client(&launcher, &mut hosts).await;

	let pending = tokio::spawn({
		let client = client.clone();
		async move { client.call(&echo("slow")).await }
	});
	let (slow_id, _) = next_call(&mut host).await;

	let disposing = tokio::spawn({
		let client = client.clone();
		async move { client.dispose().await }
	});
	let (cleanup_id, cleanup) = next_call(&mut host).await;
	assert_eq!(cleanup.method, Cleanup::NAME);
	host.sender.send(Envelope::response(cleanup_id, json!(true))).unwrap();
	disposing.await.unwrap();

	assert_eq!(pending.await.unwrap(), Err(Error::Disposed));
	assert_eq!(client.state(), BridgeState::Disposed);
	let _ = host.sender.send(Envelope::response(slow_id, json!("late")));

	let next = tokio::spawn({
		let client = client.clone();
		async move { client.call(&echo("again")).await }
	});
	let mut host = accept(&mut hosts).await;
	let (id, _) = next_call(&mut host).await;
	host.sender.send(Envelope::response(id, json!("again"))).unwrap();

	assert_eq!(next.await.unwrap(), Ok("again".to_owned()));
	assert_eq!(launcher.launches(), 2);
	assert_eq!(client.state(), BridgeState::Ready);
}

#[tokio::test]
async fn dispose_gives_up_on_silent_host() {
	let (launcher, mut hosts) = TestLauncher::new();
	let client = RpcClient::from_shared(launcher.clone(), ClientOptions {
		dispose_grace: Duration::from_millis(20),
	});
	let init = tokio::spawn({
		let client = client.clone();
		async move { client.init().await }
	});
	let _host = accept(&mut hosts).await;
	init.await.unwrap().unwrap();

	client.dispose().await;
	assert_eq!(client.state(), BridgeState::Disposed);
	assert_eq!(client.pending_count(), 0);
}

#[tokio::test]
async fn dispose_before_init_is_harmless() {
	let (launcher, _hosts) = TestLauncher::new();
	let client = client(&launcher);

	client.dispose().await;
	client.dispose().await;
	assert_eq!(client.state(), BridgeState::Disposed);
	assert_eq!(launcher.launches(), 0);
}

#[tokio::test]
async fn dispose_during_init_fails_waiters() {
	let (launcher, mut hosts) = TestLauncher::new();
	let client = client(&launcher);

	let init = tokio::spawn({
		let client = client.clone();
		async move { client.init().await }
	});
	let mut host = hosts.recv().await.unwrap();
	let _ = next_envelope(&mut host).await;

	client.dispose().await;
	assert_eq!(init.await.unwrap(), Err(Error::Disposed));
	assert_eq!(client.state(), BridgeState::Disposed);

	let init = tokio::spawn({
		let client = client.clone();
		async move { client.init().await }
	});
	let _host = accept(&mut hosts).await;
	assert_eq!(init.await.unwrap(), Ok(()));
	assert_eq!(client.state(), BridgeState::Ready);
	assert_eq!(launcher.launches(), 2);
}

#[tokio::test]
async fn transport_failure_rejects_pending_and_resets() {
	let (launcher, mut hosts) = TestLauncher::new();
	let (client, mut host) = ready_client(&launcher, &mut hosts).await;
	let mut states = client.subscribe_state();

	let pending = tokio::spawn({
		let client = client.clone();
		async move { client.call(&echo("x")).await }
	});
	let _ = next_call(&mut host).await;
	host.sender.fail("host crashed");

	assert_eq!(pending.await.unwrap(), Err(Error::Transport("host crashed".into())));
	states.wait_for(|s| *s == BridgeState::Uninitialized).await.unwrap();

	let pending = tokio::spawn({
		let client = client.clone();
		async move { client.call(&echo("y")).await }
	});
	let mut host = accept(&mut hosts).await;
	let _ = next_call(&mut host).await;
	drop(host);

	assert_eq!(pending.await.unwrap(), Err(Error::Transport(CHANNEL_CLOSED.into())));
	assert_eq!(launcher.launches(), 2);
}

#[tokio::test]
async fn failed_launch_allows_retry() {
	let (launcher, mut hosts) = TestLauncher::new();
	let client = client(&launcher);
	launcher.fail_next.store(true, Ordering::SeqCst);

	assert_eq!(client.init().await, Err(Error::Launch("no such host".into())));
	assert_eq!(client.state(), BridgeState::Uninitialized);

	let init = tokio::spawn({
		let client = client.clone();
		async move { client.init().await }
	});
	let _host = accept(&mut hosts).await;
	assert_eq!(init.await.unwrap(), Ok(()));
	assert_eq!(launcher.launches(), 2);
}

#[tokio::test]
async fn init_error_from_host_is_reported() {
	let (launcher, mut hosts) = TestLauncher::new();
	let client = client(&launcher);

	let init = tokio::spawn({
		let client = client.clone();
		async move { client.init().await }
	});
	let mut host = hosts.recv().await.unwrap();
	let envelope = next_envelope(&mut host).await;
	host.sender
		.send(Envelope::error(envelope.correlation_id.unwrap(), ErrorPayload::new("wheel missing")))
		.unwrap();

	assert_eq!(
		init.await.unwrap(),
		Err(Error::Application {
			message: "wheel missing".into(),
			stack: None,
		})
	);
	assert_eq!(client.state(), BridgeState::Uninitialized);
}

use pretty_assertions::assert_eq;
use serde_json::json;

use super::*;

fn id(s: &str) -> CorrelationId {
	CorrelationId::from(s)
}

#[tokio::test]
async fn settle_resolves_registered_call() {
	let correlator = Correlator::new();
	let rx = correlator.register(id("a"));
	assert_eq!(correlator.pending_count(), 1);

	assert!(correlator.settle(&id("a"), Ok(json!(["IFCWALL"]))));
	assert_eq!(rx.await.unwrap(), Ok(json!(["IFCWALL"])));
	assert_eq!(correlator.pending_count(), 0);
}

#[tokio::test]
async fn calls_settle_out_of_order() {
	let correlator = Correlator::new();
	let first = correlator.register(id("1"));
	let second = correlator.register(id("2"));

	assert!(correlator.settle(&id("2"), Ok(json!(2))));
	assert!(correlator.settle(&id("1"), Err(Error::Application {
		message: "boom".into(),
		stack: None,
	})));

	assert_eq!(second.await.unwrap(), Ok(json!(2)));
	assert!(matches!(first.await.unwrap(), Err(Error::Application { message, .. }) if message == "boom"));
}

#[test]
fn unknown_id_is_a_counted_no_op() {
	let correlator = Correlator::new();
	let _rx = correlator.register(id("known"));

	assert!(!correlator.settle(&id("stray"), Ok(json!(null))));
	assert_eq!(correlator.pending_count(), 1);
	assert_eq!(correlator.unknown_settlements(), 1);
}

#[tokio::test]
async fn second_terminal_envelope_is_unknown() {
	let correlator = Correlator::new();
	let rx = correlator.register(id("a"));

	assert!(correlator.settle(&id("a"), Ok(json!(1))));
	assert!(!correlator.settle(&id("a"), Ok(json!(2))));
	assert_eq!(rx.await.unwrap(), Ok(json!(1)));
	assert_eq!(correlator.unknown_settlements(), 1);
}

#[tokio::test]
async fn settle_all_rejects_everything_once() {
	let correlator = Correlator::new();
	let receivers: Vec<_> = ["a", "b", "c"].into_iter().map(|s| correlator.register(id(s))).collect();

	assert_eq!(correlator.settle_all_pending(Error::Disposed), 3);
	assert_eq!(correlator.pending_count(), 0);
	for rx in receivers {
		assert_eq!(rx.await.unwrap(), Err(Error::Disposed));
	}

	assert!(!correlator.settle(&id("a"), Ok(json!(null))));
	assert_eq!(correlator.settle_all_pending(Error::Disposed), 0);
}

#[tokio::test]
async fn closed_registry_rejects_new_calls() {
	let correlator = Correlator::new();
	let before = correlator.register(id("a"));

	assert_eq!(correlator.close(Error::Transport("gone".into())), 1);
	assert!(correlator.is_closed());
	assert_eq!(before.await.unwrap(), Err(Error::Transport("gone".into())));

	let after = correlator.register(id("b"));
	assert_eq!(after.await.unwrap(), Err(Error::Transport("gone".into())));
	assert_eq!(correlator.pending_count(), 0);
}

#[test]
fn settling_after_caller_left_still_counts() {
	let correlator = Correlator::new();
	drop(correlator.register(id("a")));
	assert!(correlator.settle(&id("a"), Ok(json!(null))));
	assert_eq!(correlator.unknown_settlements(), 0);
}

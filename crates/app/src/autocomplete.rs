//! Memoized autocompletion data.

use std::collections::BTreeSet;
use std::sync::Arc;

use idslab_engine::ClassificationSystems;
use idslab_engine::calls::{GetAllEntityClasses, GetMaterialCategories, GetStandardClassificationSystems};
use idslab_ids::IfcVersion;
use idslab_rpc::RpcClient;
use tokio::sync::OnceCell;
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::Result;

/// Values offered while editing facets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Autocompletions {
	/// IFC classes across the configured schemas, deduplicated and sorted.
	pub entity_classes: Vec<String>,
	/// Material category names.
	pub material_categories: Vec<String>,
	/// Classification systems by name.
	pub classification_systems: ClassificationSystems,
}

/// Fetches [`Autocompletions`] on first use and keeps them.
///
/// A failed fetch is not cached; the next request retries.
#[derive(Debug)]
pub struct AutocompleteCache {
	schemas: Vec<IfcVersion>,
	cell: OnceCell<Arc<Autocompletions>>,
}

impl AutocompleteCache {
	/// Creates an empty cache collecting entity classes from `schemas`.
	pub fn new(schemas: Vec<IfcVersion>) -> Self {
		Self {
			schemas,
			cell: OnceCell::new(),
		}
	}

	/// Returns the cached data, fetching it through `client` the first time.
	///
	/// # Errors
	///
	/// Returns the first failed engine call.
	pub async fn get(&self, client: &RpcClient) -> Result<Arc<Autocompletions>> {
		self.cell
			.get_or_try_init(|| fetch(client, &self.schemas))
			.await
			.cloned()
	}

	/// The cached data, if already fetched.
	pub fn cached(&self) -> Option<Arc<Autocompletions>> {
		self.cell.get().cloned()
	}
}

async fn fetch(client: &RpcClient, schemas: &[IfcVersion]) -> Result<Arc<Autocompletions>> {
	let classes = async {
		let mut calls = JoinSet::new();
		for &schema in schemas {
			let client = client.clone();
			calls.spawn(async move { client.call(&GetAllEntityClasses { schema }).await });
		}
		let mut classes = BTreeSet::new();
		while let Some(joined) = calls.join_next().await {
			let fetched = joined.map_err(|e| idslab_rpc::Error::Transport(e.to_string()))??;
			classes.extend(fetched);
		}
		Ok::<_, idslab_rpc::Error>(classes)
	};
	let (classes, material_categories, classification_systems) = tokio::try_join!(
		classes,
		client.call(&GetMaterialCategories {}),
		client.call(&GetStandardClassificationSystems {}),
	)?;
	debug!(classes = classes.len(), "fetched autocompletions");
	Ok(Arc::new(Autocompletions {
		entity_classes: classes.into_iter().collect(),
		material_categories,
		classification_systems,
	}))
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use async_trait::async_trait;
	use idslab_rpc::{ChannelEvent, Endpoint, Envelope, HostConnection, HostLauncher, Kind};
	use pretty_assertions::assert_eq;
	use serde_json::json;
	use tokio::sync::Mutex;
	use tokio_util::sync::CancellationToken;

	use super::*;

	/// Hands out one prepared endpoint; the test plays the host on the other end.
	struct ScriptedLauncher {
		client: Mutex<Option<Endpoint>>,
	}

	#[async_trait]
	impl HostLauncher for ScriptedLauncher {
		async fn launch(&self) -> idslab_rpc::Result<HostConnection> {
			let endpoint = self
				.client
				.lock()
				.await
				.take()
				.ok_or_else(|| idslab_rpc::Error::Launch("already launched".into()))?;
			Ok(HostConnection {
				endpoint,
				shutdown: CancellationToken::new(),
			})
		}
	}

	async fn recv(host: &mut Endpoint) -> Envelope {
		let event = tokio::time::timeout(Duration::from_secs(1), host.receiver.recv())
			.await
			.expect("request within a second");
		match event {
			Some(ChannelEvent::Message(envelope)) => envelope,
			other => panic!("expected envelope, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn schemas_are_fetched_concurrently() {
		let (client_end, mut host) = idslab_rpc::pair();
		let client = RpcClient::new(ScriptedLauncher {
			client: Mutex::new(Some(client_end)),
		});
		let cache = AutocompleteCache::new(vec![IfcVersion::Ifc2x3, IfcVersion::Ifc4]);
		let fetch = tokio::spawn(async move { cache.get(&client).await });

		let init = recv(&mut host).await;
		assert_eq!(init.kind, Kind::Init);
		host.sender.send(Envelope::ready(init.correlation_id.unwrap())).unwrap();

		let mut calls = Vec::new();
		for _ in 0..4 {
			calls.push(recv(&mut host).await);
		}
		let mut schemas: Vec<_> = calls
			.iter()
			.filter(|call| call.payload["method"] == "getAllEntityClasses")
			.map(|call| call.payload["args"]["schema"].as_str().unwrap().to_owned())
			.collect();
		schemas.sort();
		assert_eq!(schemas, vec!["IFC2X3", "IFC4"]);

		for call in calls {
			let reply = match (call.payload["method"].as_str(), call.payload["args"]["schema"].as_str()) {
				(Some("getAllEntityClasses"), Some("IFC4")) => json!(["IfcWall", "IfcPipeSegment"]),
				(Some("getAllEntityClasses"), _) => json!(["IfcWallStandardCase", "IfcWall"]),
				(Some("getMaterialCategories"), _) => json!(["concrete"]),
				_ => json!({}),
			};
			host.sender
				.send(Envelope::response(call.correlation_id.unwrap(), reply))
				.unwrap();
		}

		let data = fetch.await.unwrap().unwrap();
		assert_eq!(data.entity_classes, vec!["IfcPipeSegment", "IfcWall", "IfcWallStandardCase"]);
		assert_eq!(data.material_categories, vec!["concrete"]);
		assert!(data.classification_systems.is_empty());
	}
}

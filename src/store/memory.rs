//! Thread-safe in-memory [`TokenStore`] implementation for tests and short-lived sessions.

// self
use crate::{
	_prelude::*,
	store::{StoreError, StoreFuture, TokenStore},
};

type StoreMap = Arc<RwLock<HashMap<String, String>>>;

/// Thread-safe storage backend that keeps entries in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Creates a store pre-populated with `entries`.
	pub fn with_entries<I, K, V>(entries: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let map = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();

		Self(Arc::new(RwLock::new(map)))
	}

	/// Returns the value under `key` without going through the async contract.
	pub fn peek(&self, key: &str) -> Option<String> {
		self.0.read().get(key).cloned()
	}

	/// Returns the number of stored entries.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when the store holds no entries.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn set_now(map: StoreMap, key: String, value: String) -> Result<(), StoreError> {
		map.write().insert(key, value);

		Ok(())
	}
}
impl TokenStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(key).cloned()) })
	}

	fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move { Self::set_now(map, key, value) })
	}

	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.write().remove(key)) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn set_get_remove_round_trip() {
		let store = MemoryStore::default();

		assert!(store.get("access_token").await.expect("Get should succeed.").is_none());

		store.set("access_token", "tok-1".into()).await.expect("Set should succeed.");

		assert_eq!(store.get("access_token").await.expect("Get should succeed."), Some("tok-1".into()));
		assert_eq!(store.peek("access_token"), Some("tok-1".into()));
		assert_eq!(
			store.remove("access_token").await.expect("Remove should succeed."),
			Some("tok-1".into())
		);
		assert!(store.is_empty());
	}

	#[tokio::test]
	async fn clones_share_entries() {
		let store = MemoryStore::with_entries([("user", "{\"id\":1}")]);
		let clone = store.clone();

		clone.set("access_token", "tok-2".into()).await.expect("Set should succeed.");

		assert_eq!(store.len(), 2);
		assert_eq!(store.peek("access_token"), Some("tok-2".into()));
	}
}

//! Storage contracts and built-in token store implementations.
//!
//! The gateway treats its store like browser local storage: a flat map of string keys to string
//! values. Only two keys are touched by the gateway itself (the access token and the cached user
//! record, see [`StorageKeys`](crate::config::StorageKeys)); embedders may keep anything else
//! alongside them.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Key/value backend the gateway reads credentials from.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Returns the value stored under `key`, if present.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Persists or replaces the value stored under `key`.
	fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()>;

	/// Removes `key`, returning the previous value.
	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures (e.g., serde_json) surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

//! In-process backend and store doubles shared by the integration tests.

#![allow(dead_code)]

// std
use std::{
	collections::HashMap,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use parking_lot::Mutex;
use tokio::sync::Notify;
// self
use exam_gateway::{
	config::GatewayConfig,
	error::TransportError,
	gateway::Gateway,
	http::{ApiRequest, ApiResponse, HttpTransport, TransportFuture},
	http_types::StatusCode,
	navigator::RecordingNavigator,
	store::{MemoryStore, StoreError, StoreFuture, TokenStore},
	url::Url,
};
use time::Duration;

pub const REFRESH_PATH: &str = "/auth/refresh";
pub const LOGIN_PATH: &str = "/auth/login";

/// What the fake backend answers on the refresh endpoint.
#[derive(Clone, Debug)]
pub enum RefreshReply {
	Token(String),
	Status(u16),
	NetworkDown,
}

/// Fake backend that accepts exactly one bearer token on every non-auth path.
///
/// The refresh endpoint can be held shut by a gate so tests can pile requests up behind it.
pub struct FakeBackend {
	accepted: Mutex<Option<String>>,
	refresh_reply: Mutex<RefreshReply>,
	gate: Option<Arc<Notify>>,
	holds: Mutex<HashMap<String, Arc<Notify>>>,
	log: Mutex<Vec<(String, Option<String>)>>,
	timeouts: Mutex<Vec<(String, Option<Duration>)>>,
}
impl FakeBackend {
	pub fn new(accepted: Option<&str>, refresh_reply: RefreshReply) -> Self {
		Self {
			accepted: Mutex::new(accepted.map(str::to_owned)),
			refresh_reply: Mutex::new(refresh_reply),
			gate: None,
			holds: Mutex::new(HashMap::new()),
			log: Mutex::new(Vec::new()),
			timeouts: Mutex::new(Vec::new()),
		}
	}

	/// Holds every refresh call until the returned handle is notified.
	pub fn gated(mut self) -> (Self, Arc<Notify>) {
		let gate = Arc::new(Notify::new());

		self.gate = Some(gate.clone());

		(self, gate)
	}

	/// Holds the reply to the first dispatch of `path` until the returned handle is notified.
	///
	/// The bearer token is still read at dispatch, so the reply reflects the token the request
	/// was sent with.
	pub fn hold(&self, path: &str) -> Arc<Notify> {
		let hold = Arc::new(Notify::new());

		self.holds.lock().insert(path.to_owned(), hold.clone());

		hold
	}

	pub fn accept(&self, token: &str) {
		*self.accepted.lock() = Some(token.to_owned());
	}

	/// Every `(path, bearer)` pair seen so far, in arrival order.
	pub fn log(&self) -> Vec<(String, Option<String>)> {
		self.log.lock().clone()
	}

	pub fn hits(&self, path: &str) -> usize {
		self.log.lock().iter().filter(|(seen, _)| seen == path).count()
	}

	pub fn timeouts(&self, path: &str) -> Vec<Option<Duration>> {
		self.timeouts.lock().iter().filter(|(seen, _)| seen == path).map(|(_, t)| *t).collect()
	}

	pub fn bearers(&self, path: &str) -> Vec<Option<String>> {
		self.log.lock().iter().filter(|(seen, _)| seen == path).map(|(_, b)| b.clone()).collect()
	}

	fn reply(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
		if request.path == REFRESH_PATH {
			return match self.refresh_reply.lock().clone() {
				RefreshReply::Token(token) => {
					self.accept(&token);

					Ok(ApiResponse::json_body(
						StatusCode::OK,
						&serde_json::json!({ "access_token": token }),
					))
				},
				RefreshReply::Status(status) => Ok(ApiResponse::new(
					StatusCode::from_u16(status).unwrap_or(StatusCode::UNAUTHORIZED),
					"{\"message\":\"refresh rejected\"}",
				)),
				RefreshReply::NetworkDown => Err(TransportError::Timeout { path: request.path.clone() }),
			};
		}
		if request.path == LOGIN_PATH {
			return Ok(ApiResponse::new(StatusCode::UNAUTHORIZED, "{\"message\":\"bad credentials\"}"));
		}
		if request.path.starts_with("/locked/") {
			return Ok(ApiResponse::new(StatusCode::UNAUTHORIZED, "{\"message\":\"forbidden scope\"}"));
		}
		if let Some(status) = request.path.strip_prefix("/status/") {
			let status = status.parse().unwrap_or(500);

			return Ok(ApiResponse::new(
				StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
				"upstream",
			));
		}

		let accepted = self.accepted.lock().clone();

		if accepted.is_some() && request.bearer_token() == accepted.as_deref() {
			Ok(ApiResponse::json_body(StatusCode::OK, &serde_json::json!({ "path": request.path })))
		} else {
			Ok(ApiResponse::new(StatusCode::UNAUTHORIZED, "{\"message\":\"token expired\"}"))
		}
	}
}
impl HttpTransport for FakeBackend {
	fn send<'a>(&'a self, request: &'a ApiRequest) -> TransportFuture<'a> {
		Box::pin(async move {
			self.log.lock().push((request.path.clone(), request.bearer_token().map(str::to_owned)));
			self.timeouts.lock().push((request.path.clone(), request.timeout));

			let hold = self.holds.lock().remove(&request.path);

			if let Some(hold) = hold {
				let reply = self.reply(request);

				hold.notified().await;

				return reply;
			}
			if request.path == REFRESH_PATH {
				if let Some(gate) = &self.gate {
					gate.notified().await;
				}
			}

			self.reply(request)
		})
	}
}

/// Store wrapper that counts removals per key.
#[derive(Clone, Default)]
pub struct CountingStore {
	pub inner: MemoryStore,
	removals: Arc<Mutex<Vec<String>>>,
	sets: Arc<AtomicUsize>,
}
impl CountingStore {
	pub fn with_token(token: &str) -> Self {
		Self {
			inner: MemoryStore::with_entries([
				("access_token", token),
				("user", "{\"id\":1,\"name\":\"Grader\"}"),
			]),
			..Default::default()
		}
	}

	pub fn removals(&self) -> Vec<String> {
		self.removals.lock().clone()
	}

	pub fn sets(&self) -> usize {
		self.sets.load(Ordering::SeqCst)
	}
}
impl TokenStore for CountingStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		self.inner.get(key)
	}

	fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
		self.sets.fetch_add(1, Ordering::SeqCst);

		self.inner.set(key, value)
	}

	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		self.removals.lock().push(key.to_owned());

		self.inner.remove(key)
	}
}

/// Store whose writes always fail, for surfacing backend errors.
pub struct BrokenStore;
impl TokenStore for BrokenStore {
	fn get<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async { Ok(Some("stale".to_owned())) })
	}

	fn set<'a>(&'a self, _key: &'a str, _value: String) -> StoreFuture<'a, ()> {
		Box::pin(async { Err(StoreError::Backend { message: "quota exceeded".into() }) })
	}

	fn remove<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async { Ok(None) })
	}
}

/// Store whose removals always fail, leaving credentials behind.
#[derive(Clone, Default)]
pub struct StickyStore {
	pub inner: MemoryStore,
}
impl TokenStore for StickyStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		self.inner.get(key)
	}

	fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
		self.inner.set(key, value)
	}

	fn remove<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async { Err(StoreError::Backend { message: "storage locked".into() }) })
	}
}

pub fn config() -> GatewayConfig {
	GatewayConfig::builder(
		Url::parse("https://grading.example.com/api/").expect("Fixture base URL should parse."),
	)
	.build()
	.expect("Fixture config should validate.")
}

pub fn gateway(
	backend: Arc<FakeBackend>,
	store: Arc<dyn TokenStore>,
) -> (Gateway<FakeBackend>, RecordingNavigator) {
	gateway_with(config(), backend, store)
}

pub fn gateway_with(
	config: GatewayConfig,
	backend: Arc<FakeBackend>,
	store: Arc<dyn TokenStore>,
) -> (Gateway<FakeBackend>, RecordingNavigator) {
	let navigator = RecordingNavigator::default();
	let gateway = Gateway::<FakeBackend>::with_transport(config, store, backend)
		.with_navigator(Arc::new(navigator.clone()));

	(gateway, navigator)
}

/// Polls `condition` until it holds or a generous deadline passes.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
	for _ in 0..400 {
		if condition() {
			return true;
		}

		tokio::time::sleep(StdDuration::from_millis(5)).await;
	}

	condition()
}

//! Transport primitives for gateway requests.
//!
//! The module exposes [`HttpTransport`] alongside the [`ApiRequest`] descriptor and the buffered
//! [`ApiResponse`] so downstream crates can plug in custom HTTP stacks (or in-process fakes)
//! without losing the gateway's credential injection and refresh protocol. A transport only moves
//! bytes: it never inspects status codes, never retries, and never touches the token store.

// self
use crate::{
	_prelude::*,
	error::{CodecError, ConfigError, TransportError},
};

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of performing one request/response cycle.
///
/// Implementations must be `Send + Sync + 'static` so one transport can back every clone of a
/// gateway. The returned future must own (or borrow from `self`/`request`) everything it needs;
/// the gateway keeps the request alive until the future resolves.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Dispatches `request` and buffers the full response body.
	///
	/// Non-success statuses are *not* errors at this layer; only failures to obtain a response
	/// (network, deadline, IO) map to [`TransportError`].
	fn send<'a>(&'a self, request: &'a ApiRequest) -> TransportFuture<'a>;
}

/// Fully resolved request descriptor handed to an [`HttpTransport`].
///
/// The descriptor doubles as the retry record: once the gateway re-dispatches it after a refresh
/// it is marked retried and a second authorization failure passes straight through.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Relative path as supplied by the caller (without query string).
	pub path: String,
	/// Absolute URL, including query parameters.
	pub url: Url,
	/// Request headers; `Authorization` is rewritten on every dispatch.
	pub headers: HeaderMap,
	/// Serialized JSON body, if any.
	pub body: Option<Vec<u8>>,
	/// Per-request deadline forwarded to the transport.
	pub timeout: Option<Duration>,
	retried: bool,
}
impl ApiRequest {
	/// Creates a descriptor carrying the default JSON headers.
	pub fn new(method: Method, path: impl Into<String>, url: Url) -> Self {
		let mut headers = HeaderMap::new();
		let json = HeaderValue::from_static("application/json");

		headers.insert(::http::header::CONTENT_TYPE, json.clone());
		headers.insert(::http::header::ACCEPT, json);

		Self { method, path: path.into(), url, headers, body: None, timeout: None, retried: false }
	}

	/// Attaches a serialized JSON body.
	pub fn with_body(mut self, body: Vec<u8>) -> Self {
		self.body = Some(body);

		self
	}

	/// Overrides the per-request deadline.
	pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.timeout = timeout;

		self
	}

	/// Applies caller-supplied headers, validating names and values.
	pub fn with_headers(mut self, headers: &[(String, String)]) -> Result<Self> {
		for (name, value) in headers {
			let invalid = || ConfigError::InvalidHeader { name: name.clone() };
			let name = ::http::header::HeaderName::from_bytes(name.as_bytes())
				.map_err(|_| invalid())?;
			let value = HeaderValue::from_str(value).map_err(|_| invalid())?;

			self.headers.insert(name, value);
		}

		Ok(self)
	}

	/// Returns `true` once the gateway has re-dispatched this descriptor after a refresh.
	pub fn is_retried(&self) -> bool {
		self.retried
	}

	/// Returns the bearer token currently attached, if any.
	pub fn bearer_token(&self) -> Option<&str> {
		self.headers
			.get(::http::header::AUTHORIZATION)?
			.to_str()
			.ok()?
			.strip_prefix("Bearer ")
	}

	pub(crate) fn mark_retried(&mut self) {
		self.retried = true;
	}
}

/// Buffered response returned by an [`HttpTransport`].
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response with empty headers.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Creates a response whose body is the JSON encoding of `value`.
	pub fn json_body(status: StatusCode, value: &serde_json::Value) -> Self {
		Self::new(status, value.to_string())
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Returns the body decoded lossily as UTF-8.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Decodes the body as JSON, treating an empty body as `null`.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let body: &[u8] = if self.body.iter().all(u8::is_ascii_whitespace) {
			b"null"
		} else {
			&self.body
		};
		let mut de = serde_json::Deserializer::from_slice(body);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| CodecError::Json { source, status: self.status.as_u16() }.into())
	}
}

/// Per-request options accepted by the gateway verbs.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
	/// Query parameters appended to the resolved URL.
	pub query: Vec<(String, String)>,
	/// Extra headers; validated when the request is built.
	pub headers: Vec<(String, String)>,
	/// Deadline overriding the configured request timeout.
	pub timeout: Option<Duration>,
}
impl RequestOptions {
	/// Appends a query parameter.
	pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
		self.query.push((key.into(), value.to_string()));

		self
	}

	/// Appends an extra header.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Overrides the deadline for this request.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// The default client keeps a cookie store, which carries the HTTP-only refresh credential the
/// backend sets at login. Configure any custom [`ReqwestClient`] with `cookie_store(true)` for
/// the same reason.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a cookie-aware client.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().cookie_store(true).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send<'a>(&'a self, request: &'a ApiRequest) -> TransportFuture<'a> {
		Box::pin(async move {
			let mut builder = self
				.0
				.request(request.method.clone(), request.url.clone())
				.headers(request.headers.clone());

			if let Some(body) = request.body.as_ref() {
				builder = builder.body(body.clone());
			}
			if let Some(timeout) = request.timeout {
				builder = builder.timeout(timeout.unsigned_abs());
			}

			let response =
				builder.send().await.map_err(|e| map_reqwest_error(&request.path, e))?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body =
				response.bytes().await.map_err(|e| map_reqwest_error(&request.path, e))?.to_vec();

			Ok(ApiResponse { status, headers, body })
		})
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(path: &str, e: ReqwestError) -> TransportError {
	if e.is_timeout() {
		TransportError::Timeout { path: path.to_owned() }
	} else {
		TransportError::network(path, e)
	}
}

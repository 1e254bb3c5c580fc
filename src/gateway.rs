//! Authenticated request gateway: credential injection, 401 recovery, and the public verbs.
//!
//! Every call flows through two named stages. [`Gateway::attach_credentials`] re-reads the access
//! token from the [`TokenStore`] before each dispatch, and [`Gateway::handle_response`] decides
//! whether an authorization failure is absorbed by the single-flight refresh protocol (see
//! [`refresh`]) or passed straight back to the caller.

pub mod interceptor;
pub mod refresh;
pub mod session;

pub use interceptor::ResponseVerdict;
pub use refresh::{RefreshCoordinator, RefreshMetrics};

// self
use crate::{
	_prelude::*,
	config::GatewayConfig,
	error::CodecError,
	http::{ApiRequest, ApiResponse, HttpTransport, RequestOptions},
	navigator::{Navigator, NoopNavigator},
	obs::{self, Operation, OperationSpan, Outcome},
	store::TokenStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Gateway specialized for the crate's default reqwest transport.
pub type ReqwestGateway = Gateway<ReqwestTransport>;

/// Mediates every outgoing API call for one application session.
///
/// The gateway owns the transport, token store, and navigator handles together with the refresh
/// coordinator, so concurrent callers share one refresh-in-flight flag and one pending queue.
/// Clones share that state; build a separate gateway for an isolated session.
pub struct Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Transport used for every outbound request, including the refresh call.
	pub transport: Arc<T>,
	/// Backend configuration.
	pub config: GatewayConfig,
	/// Shared counters for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	store: Arc<dyn TokenStore>,
	navigator: Arc<dyn Navigator>,
	refresh: Arc<RefreshCoordinator>,
}
impl<T> Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a gateway around a caller-provided transport.
	pub fn with_transport(
		config: GatewayConfig,
		store: Arc<dyn TokenStore>,
		transport: impl Into<Arc<T>>,
	) -> Self {
		Self {
			transport: transport.into(),
			store,
			navigator: Arc::new(NoopNavigator),
			config,
			refresh_metrics: Default::default(),
			refresh: Default::default(),
		}
	}

	/// Replaces the navigator used for the login redirect.
	pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
		self.navigator = navigator;

		self
	}

	/// Returns the token store holding the access token and cached user record.
	pub fn store(&self) -> &Arc<dyn TokenStore> {
		&self.store
	}

	/// Returns the navigator invoked once the session cannot be renewed.
	pub fn navigator(&self) -> &Arc<dyn Navigator> {
		&self.navigator
	}

	/// Returns the coordinator guarding the refresh-in-flight flag and pending queue.
	pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
		&self.refresh
	}

	/// Issues a `GET` and decodes the response body.
	pub async fn get<R>(&self, path: &str, options: RequestOptions) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.call(Method::GET, path, None, options).await
	}

	/// Issues a `POST` with an optional JSON body and decodes the response body.
	pub async fn post<B, R>(&self, path: &str, body: Option<&B>, options: RequestOptions) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		let body = body.map(encode_body).transpose()?;

		self.call(Method::POST, path, body, options).await
	}

	/// Issues a `PUT` with an optional JSON body and decodes the response body.
	pub async fn put<B, R>(&self, path: &str, body: Option<&B>, options: RequestOptions) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		let body = body.map(encode_body).transpose()?;

		self.call(Method::PUT, path, body, options).await
	}

	/// Issues a `PATCH` with an optional JSON body and decodes the response body.
	pub async fn patch<B, R>(
		&self,
		path: &str,
		body: Option<&B>,
		options: RequestOptions,
	) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		let body = body.map(encode_body).transpose()?;

		self.call(Method::PATCH, path, body, options).await
	}

	/// Issues a `DELETE` and decodes the response body (use `()` for empty replies).
	pub async fn delete<R>(&self, path: &str, options: RequestOptions) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.call(Method::DELETE, path, None, options).await
	}

	/// Builds a request descriptor for `path` without dispatching it.
	pub fn build_request(
		&self,
		method: Method,
		path: &str,
		body: Option<Vec<u8>>,
		options: &RequestOptions,
	) -> Result<ApiRequest> {
		let url = self.config.resolve(path, &options.query)?;
		let request = ApiRequest::new(method, path, url)
			.with_headers(&options.headers)?
			.with_timeout(options.timeout.or(self.config.request_timeout));

		Ok(match body {
			Some(body) => request.with_body(body),
			None => request,
		})
	}

	/// Dispatches a prepared request through both interceptor stages.
	///
	/// A first 401 on a non-auth endpoint is absorbed: the gateway joins (or leads) the
	/// single-flight refresh and re-dispatches the request once with the renewed token.
	/// Every other non-success status surfaces as [`Error::Status`].
	pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse> {
		const OP: Operation = Operation::Request;

		let span = OperationSpan::new(OP, "send");

		obs::record_operation(OP, Outcome::Attempt);

		let result = span
			.instrument(async move {
				let (response, generation) = self.dispatch(&mut request).await?;

				match self.handle_response(&request, response) {
					ResponseVerdict::Settled(result) => result,
					ResponseVerdict::Recover => {
						request.mark_retried();

						self.recover(request, generation).await
					},
				}
			})
			.await;

		obs::record_result(OP, &result);

		result
	}

	async fn call<R>(
		&self,
		method: Method,
		path: &str,
		body: Option<Vec<u8>>,
		options: RequestOptions,
	) -> Result<R>
	where
		R: DeserializeOwned,
	{
		let request = self.build_request(method, path, body, &options)?;

		self.send(request).await?.json()
	}
}
#[cfg(feature = "reqwest")]
impl Gateway<ReqwestTransport> {
	/// Creates a gateway backed by a cookie-aware reqwest client.
	///
	/// Request deadlines come from [`GatewayConfig::request_timeout`] and
	/// [`GatewayConfig::refresh_timeout`]; the underlying client carries none of its own.
	pub fn new(config: GatewayConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
		let transport = ReqwestTransport::new()?;

		Ok(Self::with_transport(config, store, transport))
	}
}
impl<T> Clone for Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			store: self.store.clone(),
			navigator: self.navigator.clone(),
			config: self.config.clone(),
			refresh_metrics: self.refresh_metrics.clone(),
			refresh: self.refresh.clone(),
		}
	}
}
impl<T> Debug for Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("base_url", &self.config.base_url.as_str())
			.field("refreshing", &self.refresh.is_refreshing())
			.field("queued", &self.refresh.queued())
			.finish()
	}
}

fn encode_body<B>(body: &B) -> Result<Vec<u8>>
where
	B: ?Sized + Serialize,
{
	serde_json::to_vec(body).map_err(|e| CodecError::Body(e).into())
}

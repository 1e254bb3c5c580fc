//! The two interceptor stages wrapped around the transport.

// crates.io
use ::http::header::AUTHORIZATION;
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	error::ConfigError,
	gateway::Gateway,
	http::{ApiRequest, ApiResponse, HttpTransport},
};

/// Decision taken by [`Gateway::handle_response`].
#[derive(Debug)]
pub enum ResponseVerdict {
	/// The response is final: a success, or a failure the gateway does not absorb.
	Settled(Result<ApiResponse>),
	/// First 401 on a non-auth endpoint; the refresh protocol takes over.
	Recover,
}

impl<T> Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Request stage: attaches `Authorization: Bearer <token>` from the store, or strips the
	/// header when no token is stored.
	///
	/// Returns the refresh generation observed *before* the token was read, so the response
	/// stage can tell whether a refresh completed after this dispatch.
	pub async fn attach_credentials(&self, request: &mut ApiRequest) -> Result<u64> {
		let generation = self.refresh.generation();
		let token = self.store.get(&self.config.storage_keys.access_token).await?;

		match token.map(AccessToken::new).filter(|token| !token.is_empty()) {
			Some(token) => {
				let mut value = HeaderValue::from_str(&token.bearer())
					.map_err(|_| ConfigError::InvalidHeader { name: AUTHORIZATION.to_string() })?;

				value.set_sensitive(true);
				request.headers.insert(AUTHORIZATION, value);
			},
			None => {
				request.headers.remove(AUTHORIZATION);
			},
		}

		Ok(generation)
	}

	/// Response stage: classifies a transport response.
	pub fn handle_response(&self, request: &ApiRequest, response: ApiResponse) -> ResponseVerdict {
		let recoverable = response.status == StatusCode::UNAUTHORIZED
			&& !request.is_retried()
			&& !self.config.is_auth_endpoint(&request.path);

		if recoverable { ResponseVerdict::Recover } else { ResponseVerdict::Settled(settle(request, response)) }
	}

	/// Runs the request stage and the transport, returning the raw response together with the
	/// refresh generation observed at dispatch.
	pub(crate) async fn dispatch(&self, request: &mut ApiRequest) -> Result<(ApiResponse, u64)> {
		let generation = self.attach_credentials(request).await?;
		let response = self.transport.send(request).await?;

		Ok((response, generation))
	}
}

/// Converts a response into the caller-facing result without any recovery.
pub(crate) fn settle(request: &ApiRequest, response: ApiResponse) -> Result<ApiResponse> {
	if response.is_success() {
		Ok(response)
	} else {
		Err(Error::Status {
			method: request.method.clone(),
			path: request.path.clone(),
			status: response.status.as_u16(),
			body: response.text(),
		})
	}
}

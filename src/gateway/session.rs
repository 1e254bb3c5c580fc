//! Session lifecycle: login, logout, and reads of the locally cached session.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, Credentials, LoginResponse},
	error::CodecError,
	gateway::{Gateway, encode_body},
	http::{HttpTransport, RequestOptions},
	obs::{self, Operation, OperationSpan, Outcome},
};

impl<T> Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Exchanges credentials at the login endpoint and stores the returned session.
	///
	/// The access token lands under the configured token key and the user record (when present)
	/// is cached as JSON under the user key. A 401 from this endpoint is returned as-is.
	pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse> {
		const OP: Operation = Operation::Login;

		let span = OperationSpan::new(OP, "login");

		obs::record_operation(OP, Outcome::Attempt);

		let result = span
			.instrument(async move {
				let body = encode_body(credentials)?;
				let request = self.build_request(
					Method::POST,
					&self.config.endpoints.login,
					Some(body),
					&RequestOptions::default(),
				)?;
				let response: LoginResponse = self.send(request).await?.json()?;

				if response.access_token.is_empty() {
					return Err(CodecError::EmptyAccessToken.into());
				}

				let keys = &self.config.storage_keys;

				self.store.set(&keys.access_token, response.access_token.expose().to_owned()).await?;

				match &response.user {
					Some(user) => {
						let user = serde_json::to_string(user).map_err(CodecError::Body)?;

						self.store.set(&keys.user, user).await?;
					},
					None => {
						self.store.remove(&keys.user).await?;
					},
				}

				Ok(response)
			})
			.await;

		obs::record_result(OP, &result);

		result
	}

	/// Notifies the logout endpoint and clears the local session.
	///
	/// The local session is cleared even when the backend call fails; the backend result is
	/// returned afterwards.
	pub async fn logout(&self) -> Result<()> {
		const OP: Operation = Operation::Logout;

		let span = OperationSpan::new(OP, "logout");

		obs::record_operation(OP, Outcome::Attempt);

		let result = span
			.instrument(async move {
				let remote = match self.build_request(
					Method::POST,
					&self.config.endpoints.logout,
					None,
					&RequestOptions::default(),
				) {
					Ok(request) => self.send(request).await.map(|_| ()),
					Err(e) => Err(e),
				};

				if let Err(e) = &remote {
					obs::warn(OP, "Logout call failed; clearing the local session anyway.", e);
				}

				self.clear_session().await?;

				remote
			})
			.await;

		obs::record_result(OP, &result);

		result
	}

	/// Returns the stored access token, ignoring blank values.
	pub async fn access_token(&self) -> Result<Option<AccessToken>> {
		let token = self.store.get(&self.config.storage_keys.access_token).await?;

		Ok(token.filter(|token| !token.trim().is_empty()).map(AccessToken::new))
	}

	/// Decodes the cached user record, if one is stored.
	pub async fn cached_user<U>(&self) -> Result<Option<U>>
	where
		U: DeserializeOwned,
	{
		let Some(raw) = self.store.get(&self.config.storage_keys.user).await? else {
			return Ok(None);
		};
		let mut deserializer = serde_json::Deserializer::from_str(&raw);
		let user = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| CodecError::Json { source, status: StatusCode::OK.as_u16() })?;

		Ok(Some(user))
	}

	/// Returns `true` when a non-blank access token is stored.
	pub async fn is_authenticated(&self) -> Result<bool> {
		Ok(self.access_token().await?.is_some())
	}

	/// Removes the access token and the cached user record from the store.
	///
	/// Both removals are attempted; the first failure is returned.
	pub async fn clear_session(&self) -> Result<()> {
		let keys = &self.config.storage_keys;
		let token = self.store.remove(&keys.access_token).await;
		let user = self.store.remove(&keys.user).await;

		token?;
		user?;

		Ok(())
	}
}

//! Gateway configuration shared by every request the gateway issues.
//!
//! The module exposes a validated [`GatewayConfig`] plus the builder used to assemble it, so
//! embedders can describe their backend (base URL, auth endpoints, storage keys, deadlines) in
//! one place and load it from JSON when convenient.

/// Builder API for assembling gateway configurations.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, error::ConfigError};

/// Auth endpoints the gateway treats specially.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEndpoints {
	/// Login endpoint; a 401 here never triggers a refresh.
	pub login: String,
	/// Refresh endpoint minting new access tokens from the ambient cookie.
	pub refresh: String,
	/// Logout endpoint invoked by [`Gateway::logout`](crate::gateway::Gateway::logout).
	pub logout: String,
}
impl Default for AuthEndpoints {
	fn default() -> Self {
		Self {
			login: "/auth/login".into(),
			refresh: "/auth/refresh".into(),
			logout: "/auth/logout".into(),
		}
	}
}

/// Token store keys owned by the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
	/// Key holding the bearer access token.
	pub access_token: String,
	/// Key holding the cached user record.
	pub user: String,
}
impl Default for StorageKeys {
	fn default() -> Self {
		Self { access_token: "access_token".into(), user: "user".into() }
	}
}

/// Immutable gateway configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
	/// Backend origin (and optional path prefix) every relative path is resolved against.
	pub base_url: Url,
	/// Auth endpoints exempt from (or driving) the refresh protocol.
	#[serde(default)]
	pub endpoints: AuthEndpoints,
	/// Location the navigator is sent to once the session cannot be renewed.
	#[serde(default = "default_login_redirect")]
	pub login_redirect: String,
	/// Token store keys.
	#[serde(default)]
	pub storage_keys: StorageKeys,
	/// Deadline applied to the refresh call; `None` relies on the transport default.
	#[serde(default = "default_refresh_timeout")]
	pub refresh_timeout: Option<Duration>,
	/// Deadline applied to every other request; `None` relies on the transport default.
	#[serde(default)]
	pub request_timeout: Option<Duration>,
}
impl GatewayConfig {
	/// Default deadline for the refresh call.
	pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::seconds(30);

	/// Creates a new builder for the provided backend base URL.
	pub fn builder(base_url: Url) -> GatewayConfigBuilder {
		GatewayConfigBuilder::new(base_url)
	}

	/// Parses and validates a JSON configuration document.
	pub fn from_json(raw: &str) -> Result<Self> {
		let mut de = serde_json::Deserializer::from_str(raw);
		let config: Self = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| GatewayConfigError::Parse { message: source.to_string() })
			.map_err(ConfigError::from)?;

		config.validate().map_err(ConfigError::from)?;

		Ok(config)
	}

	/// Returns `true` when `path` targets the login or refresh endpoint.
	///
	/// Leading and trailing slashes and any query string or fragment are ignored, mirroring
	/// [`GatewayConfig::resolve`].
	pub fn is_auth_endpoint(&self, path: &str) -> bool {
		let path = normalize_path(path);

		path == normalize_path(&self.endpoints.login)
			|| path == normalize_path(&self.endpoints.refresh)
	}

	/// Resolves a relative path (and query pairs) against the base URL.
	///
	/// Unlike [`Url::join`], a leading `/` keeps the base URL's path prefix, so
	/// `https://api.example.com/v1` + `/exams` yields `https://api.example.com/v1/exams`.
	pub fn resolve(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
		let base = self.base_url.as_str().trim_end_matches('/');
		let joined = if path.starts_with('/') {
			format!("{base}{path}")
		} else {
			format!("{base}/{path}")
		};
		let mut url = Url::parse(&joined).map_err(|source| ConfigError::InvalidRequestUrl {
			path: path.to_owned(),
			source,
		})?;

		if !query.is_empty() {
			url.query_pairs_mut().extend_pairs(query);
		}

		Ok(url)
	}
}

fn default_login_redirect() -> String {
	"/login".into()
}

fn default_refresh_timeout() -> Option<Duration> {
	Some(GatewayConfig::DEFAULT_REFRESH_TIMEOUT)
}

fn normalize_path(path: &str) -> &str {
	let path = path.split(['?', '#']).next().unwrap_or_default();

	// `resolve` treats `auth/refresh` and `/auth/refresh` as the same URL.
	path.trim_matches('/')
}

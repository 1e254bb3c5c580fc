// std
use std::net::IpAddr;
// self
use crate::{
	_prelude::*,
	config::{AuthEndpoints, GatewayConfig, StorageKeys},
};

/// Errors raised while constructing or validating gateway configurations.
#[derive(Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum GatewayConfigError {
	/// Configuration document could not be parsed.
	#[error("Gateway configuration could not be parsed: {message}.")]
	Parse {
		/// Parser message, including the offending field path.
		message: String,
	},
	/// Base URL cannot carry relative paths.
	#[error("Base URL cannot be used as a base: {url}.")]
	CannotBeABase {
		/// Base URL that failed validation.
		url: String,
	},
	/// Base URL must use HTTPS outside loopback development hosts.
	#[error("Base URL must use HTTPS: {url}.")]
	InsecureBaseUrl {
		/// Base URL that failed validation.
		url: String,
	},
	/// Endpoint paths must be absolute.
	#[error("The {endpoint} endpoint must start with `/`: {path}.")]
	RelativeEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Path that failed validation.
		path: String,
	},
	/// Storage keys must be non-empty and distinct.
	#[error("Storage keys must be non-empty and distinct.")]
	InvalidStorageKeys,
	/// Deadlines must be positive.
	#[error("The {name} must be positive.")]
	NonPositiveTimeout {
		/// Which deadline failed validation.
		name: &'static str,
	},
}

/// Builder for [`GatewayConfig`] values.
#[derive(Debug)]
pub struct GatewayConfigBuilder {
	/// Backend base URL.
	pub base_url: Url,
	/// Auth endpoint paths.
	pub endpoints: AuthEndpoints,
	/// Login redirect location.
	pub login_redirect: String,
	/// Token store keys.
	pub storage_keys: StorageKeys,
	/// Refresh call deadline.
	pub refresh_timeout: Option<Duration>,
	/// Deadline for ordinary requests.
	pub request_timeout: Option<Duration>,
}
impl GatewayConfigBuilder {
	/// Creates a new builder seeded with the provided base URL and defaults elsewhere.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			endpoints: AuthEndpoints::default(),
			login_redirect: "/login".into(),
			storage_keys: StorageKeys::default(),
			refresh_timeout: Some(GatewayConfig::DEFAULT_REFRESH_TIMEOUT),
			request_timeout: None,
		}
	}

	/// Overrides the login endpoint path.
	pub fn login_endpoint(mut self, path: impl Into<String>) -> Self {
		self.endpoints.login = path.into();

		self
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_endpoint(mut self, path: impl Into<String>) -> Self {
		self.endpoints.refresh = path.into();

		self
	}

	/// Overrides the logout endpoint path.
	pub fn logout_endpoint(mut self, path: impl Into<String>) -> Self {
		self.endpoints.logout = path.into();

		self
	}

	/// Overrides the location used after an unrecoverable refresh failure.
	pub fn login_redirect(mut self, location: impl Into<String>) -> Self {
		self.login_redirect = location.into();

		self
	}

	/// Overrides the token store keys.
	pub fn storage_keys(mut self, access_token: impl Into<String>, user: impl Into<String>) -> Self {
		self.storage_keys = StorageKeys { access_token: access_token.into(), user: user.into() };

		self
	}

	/// Overrides (or disables, with `None`) the refresh deadline.
	pub fn refresh_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.refresh_timeout = timeout;

		self
	}

	/// Overrides (or disables, with `None`) the deadline for ordinary requests.
	pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<GatewayConfig, GatewayConfigError> {
		let config = GatewayConfig {
			base_url: self.base_url,
			endpoints: self.endpoints,
			login_redirect: self.login_redirect,
			storage_keys: self.storage_keys,
			refresh_timeout: self.refresh_timeout,
			request_timeout: self.request_timeout,
		};

		config.validate()?;

		Ok(config)
	}
}

impl GatewayConfig {
	/// Validates invariants for the configuration.
	pub(crate) fn validate(&self) -> Result<(), GatewayConfigError> {
		validate_base_url(&self.base_url)?;
		validate_endpoint("login", &self.endpoints.login)?;
		validate_endpoint("refresh", &self.endpoints.refresh)?;
		validate_endpoint("logout", &self.endpoints.logout)?;

		let keys = &self.storage_keys;

		if keys.access_token.is_empty() || keys.user.is_empty() || keys.access_token == keys.user {
			return Err(GatewayConfigError::InvalidStorageKeys);
		}

		validate_timeout("refresh timeout", self.refresh_timeout)?;
		validate_timeout("request timeout", self.request_timeout)?;

		Ok(())
	}
}

fn validate_base_url(url: &Url) -> Result<(), GatewayConfigError> {
	if url.cannot_be_a_base() {
		return Err(GatewayConfigError::CannotBeABase { url: url.to_string() });
	}

	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(GatewayConfigError::InsecureBaseUrl { url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host_str() {
		Some("localhost") => true,
		Some(host) => host
			.trim_start_matches('[')
			.trim_end_matches(']')
			.parse::<IpAddr>()
			.map(|ip| ip.is_loopback())
			.unwrap_or(false),
		None => false,
	}
}

fn validate_endpoint(name: &'static str, path: &str) -> Result<(), GatewayConfigError> {
	if path.starts_with('/') {
		Ok(())
	} else {
		Err(GatewayConfigError::RelativeEndpoint { endpoint: name, path: path.to_owned() })
	}
}

fn validate_timeout(name: &'static str, timeout: Option<Duration>) -> Result<(), GatewayConfigError> {
	match timeout {
		Some(value) if !value.is_positive() => Err(GatewayConfigError::NonPositiveTimeout { name }),
		_ => Ok(()),
	}
}

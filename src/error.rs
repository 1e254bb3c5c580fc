//! Gateway-level error types shared across transports, stores, and session helpers.

// self
use crate::_prelude::*;

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeouts).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Request or response body could not be (de)serialized.
	#[error(transparent)]
	Codec(#[from] CodecError),

	/// Backend answered with a non-success status that the gateway did not absorb.
	#[error("{method} {path} returned HTTP {status}.")]
	Status {
		/// Request method.
		method: Method,
		/// Relative request path.
		path: String,
		/// HTTP status code.
		status: u16,
		/// Raw response body, lossily decoded as UTF-8.
		body: String,
	},
	/// The access token expired and the refresh endpoint could not renew it.
	///
	/// Every caller that waited on the same refresh attempt receives the same shared source.
	#[error("Session expired and the access token could not be renewed.")]
	SessionExpired {
		/// Status of the request that triggered the recovery.
		status: u16,
		/// Refresh failure shared by every waiter of the attempt.
		#[source]
		source: Arc<Error>,
	},
	/// The task leading a refresh was dropped before the refresh settled.
	#[error("Token refresh was abandoned before it settled.")]
	RefreshAbandoned,
}
impl Error {
	/// Returns the HTTP status carried by the error, when one is known.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Status { status, .. } | Self::SessionExpired { status, .. } => Some(*status),
			Self::Codec(CodecError::Json { status, .. }) => Some(*status),
			_ => None,
		}
	}

	/// Returns `true` when the backend rejected the request with HTTP 401.
	pub fn is_unauthorized(&self) -> bool {
		matches!(self, Self::Status { status, .. } if *status == StatusCode::UNAUTHORIZED.as_u16())
	}

	/// Returns `true` when the session was torn down after a failed refresh.
	pub fn is_session_expired(&self) -> bool {
		matches!(self, Self::SessionExpired { .. })
	}
}

/// Configuration and request-construction failures raised by the gateway.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Relative path could not be resolved against the base URL.
	#[error("Request path `{path}` does not resolve to a valid URL.")]
	InvalidRequestUrl {
		/// Offending relative path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A header value contains characters that HTTP forbids.
	#[error("Header `{name}` carries an invalid value.")]
	InvalidHeader {
		/// Header name.
		name: String,
	},
	/// Gateway configuration failed validation.
	#[error(transparent)]
	Gateway(#[from] crate::config::GatewayConfigError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, deadlines).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {path}.")]
	Network {
		/// Relative request path.
		path: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request did not complete before its deadline.
	#[error("Request to {path} timed out.")]
	Timeout {
		/// Relative request path.
		path: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		path: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { path: path.into(), source: Box::new(src) }
	}
}

/// JSON encoding and decoding failures.
#[derive(Debug, ThisError)]
pub enum CodecError {
	/// Response body did not match the expected shape.
	#[error("Response body does not match the expected shape at `{}`.", .source.path())]
	Json {
		/// Structured parsing failure, including the offending path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the decoded response.
		status: u16,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	Body(#[source] serde_json::Error),
	/// Token endpoint returned an empty access token.
	#[error("Token endpoint returned an empty access token.")]
	EmptyAccessToken,
}

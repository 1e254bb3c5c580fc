//! Bearer token wrapper that redacts sensitive material.

// self
use crate::_prelude::*;

/// Redacted access token keeping bearer credentials out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken(String);
impl AccessToken {
	/// Wraps a new token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` when the backend handed out an empty token.
	pub fn is_empty(&self) -> bool {
		self.0.trim().is_empty()
	}

	/// Formats the token as an `Authorization` header value.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}

	/// Consumes the wrapper, returning the raw token.
	pub fn into_inner(self) -> String {
		self.0
	}
}
impl AsRef<str> for AccessToken {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AccessToken").field(&"<redacted>").finish()
	}
}
impl Display for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn token_formatters_redact() {
		let token = AccessToken::new("super-secret");

		assert_eq!(format!("{token:?}"), "AccessToken(\"<redacted>\")");
		assert_eq!(format!("{token}"), "<redacted>");
		assert_eq!(token.bearer(), "Bearer super-secret");
	}

	#[test]
	fn token_deserializes_from_plain_string() {
		let token: AccessToken =
			serde_json::from_str("\"new-token-abc\"").expect("Token should decode from a string.");

		assert_eq!(token.expose(), "new-token-abc");
		assert!(!token.is_empty());
		assert!(AccessToken::new("  ").is_empty());
	}
}

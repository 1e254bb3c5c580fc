//! Credential types handled by the gateway.

pub mod secret;

pub use secret::AccessToken;

// self
use crate::_prelude::*;

/// Email/password pair submitted to the login endpoint.
#[derive(Clone, Serialize)]
pub struct Credentials {
	/// Account email address.
	pub email: String,
	password: String,
}
impl Credentials {
	/// Creates a credential pair.
	pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
		Self { email: email.into(), password: password.into() }
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Body returned by the login endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct LoginResponse {
	/// Freshly minted access token.
	pub access_token: AccessToken,
	/// User record cached alongside the token, when the backend returns one.
	#[serde(default)]
	pub user: Option<serde_json::Value>,
}

/// Body returned by the refresh endpoint.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct RefreshResponse {
	pub(crate) access_token: AccessToken,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn credentials_serialize_but_never_debug_the_password() {
		let credentials = Credentials::new("grader@example.com", "hunter2");
		let payload =
			serde_json::to_value(&credentials).expect("Credentials should serialize to JSON.");

		assert_eq!(payload, serde_json::json!({"email":"grader@example.com","password":"hunter2"}));
		assert!(!format!("{credentials:?}").contains("hunter2"));
	}

	#[test]
	fn login_response_tolerates_missing_user() {
		let response: LoginResponse = serde_json::from_str("{\"access_token\":\"tok-1\"}")
			.expect("Login response without user should decode.");

		assert_eq!(response.access_token.expose(), "tok-1");
		assert!(response.user.is_none());
	}
}

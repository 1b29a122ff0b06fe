//! Upstream payloads and the caller-facing result.

// crates.io
use oauth2::AccessToken;
// self
use crate::_prelude::*;

/// Token endpoint payload; exactly one branch is populated.
///
/// A body carrying an `error` field decodes as [`ExchangeResponse::Error`] even when the status
/// is 200. Bodies with neither `error` nor `access_token` do not decode.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ExchangeResponse {
	/// OAuth error branch.
	Error(TokenErrorResponse),
	/// Successful grant branch.
	Success(TokenGrant),
}

/// OAuth error fields returned by the token endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TokenErrorResponse {
	/// OAuth error code, e.g. `bad_verification_code`.
	pub error: String,
	/// Human-readable description.
	#[serde(default)]
	pub error_description: Option<String>,
	/// Documentation link.
	#[serde(default)]
	pub error_uri: Option<String>,
}

/// Successful grant returned by the token endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenGrant {
	/// Issued access token.
	pub access_token: AccessToken,
	/// Token type, usually `bearer`.
	#[serde(default)]
	pub token_type: Option<String>,
	/// Comma-separated granted scopes.
	#[serde(default)]
	pub scope: Option<String>,
}

/// Subset of the authenticated user's profile.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileInfo {
	/// Display name (`name` upstream).
	#[serde(default, rename = "name")]
	pub display_name: Option<String>,
	/// Public email address.
	#[serde(default)]
	pub email: Option<String>,
}

/// The only structure ever returned to the caller on success.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientResult {
	/// Display name from the profile.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_name: Option<String>,
	/// Email from the profile.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_email: Option<String>,
	/// Issued access token.
	pub token: String,
}
impl ClientResult {
	/// Builds a result from the issued token and, when fetched, the profile.
	pub fn new(token: &AccessToken, profile: Option<ProfileInfo>) -> Self {
		let profile = profile.unwrap_or_default();

		Self {
			user_name: profile.display_name,
			user_email: profile.email,
			token: token.secret().to_owned(),
		}
	}
}
impl Debug for ClientResult {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientResult")
			.field("user_name", &self.user_name)
			.field("user_email", &self.user_email)
			.field("token", &"<redacted>")
			.finish()
	}
}

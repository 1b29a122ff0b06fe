//! Upstream endpoint descriptor.
//!
//! Defaults point at github.com; both URLs can be overridden for GitHub Enterprise hosts or stub
//! upstreams. Only `http` and `https` schemes are accepted.

// self
use crate::{_prelude::*, error::ConfigError};

/// Token-exchange and profile endpoints used by the exchanger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamEndpoints {
	/// Endpoint that redeems authorization codes.
	pub token: Url,
	/// Endpoint that returns the authenticated user's profile.
	pub profile: Url,
}
impl UpstreamEndpoints {
	/// github.com token endpoint.
	pub const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
	/// api.github.com profile endpoint.
	pub const GITHUB_PROFILE_URL: &str = "https://api.github.com/user";

	/// Returns the github.com endpoints.
	pub fn github() -> Result<Self, ConfigError> {
		Self::parse(Self::GITHUB_TOKEN_URL, Self::GITHUB_PROFILE_URL)
	}

	/// Parses and validates both endpoints.
	pub fn parse(token: &str, profile: &str) -> Result<Self, ConfigError> {
		Ok(Self { token: parse_endpoint("token", token)?, profile: parse_endpoint("profile", profile)? })
	}
}

fn parse_endpoint(endpoint: &'static str, value: &str) -> Result<Url, ConfigError> {
	let invalid = || ConfigError::InvalidEndpoint { endpoint, value: value.to_owned() };
	let url = Url::parse(value).map_err(|_| invalid())?;

	match url.scheme() {
		"http" | "https" if url.has_host() => Ok(url),
		_ => Err(invalid()),
	}
}

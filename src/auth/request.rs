//! Inbound parameters and the validated request derived from them.

// crates.io
use oauth2::{AuthorizationCode, ClientId, ClientSecret};
// self
use crate::{_prelude::*, config::ExchangeConfig, error::ClientInputError};

/// Untrusted parameters exactly as the caller sent them.
///
/// A caller-supplied `client_secret` is accepted so such payloads still decode, but it is never
/// read; [`ExchangeRequest::validate`] always injects the configured secret.
#[derive(Clone, Default, Deserialize)]
pub struct ExchangeParams {
	/// Caller-selected client identifier.
	#[serde(default)]
	pub client_id: Option<String>,
	/// Ignored caller-supplied secret.
	#[serde(default)]
	pub client_secret: Option<String>,
	/// Authorization code to redeem.
	#[serde(default)]
	pub code: Option<String>,
}
impl Debug for ExchangeParams {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ExchangeParams")
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("code_set", &self.code.as_deref().is_some_and(|code| !code.is_empty()))
			.finish()
	}
}

/// Validated request ready to be sent upstream.
#[derive(Clone, Debug)]
pub struct ExchangeRequest {
	/// Client identifier (caller-selected or configured default).
	pub client_id: ClientId,
	/// Server-held secret.
	pub client_secret: ClientSecret,
	/// Authorization code to redeem.
	pub code: AuthorizationCode,
}
impl ExchangeRequest {
	/// Validates caller parameters against the server configuration.
	///
	/// Fails with [`ClientInputError::MissingCode`] when `code` is absent or empty and with
	/// [`ClientInputError::MissingClientId`] when neither the caller nor the configuration names
	/// a client. The secret always comes from `config`.
	pub fn validate(params: ExchangeParams, config: &ExchangeConfig) -> Result<Self, ClientInputError> {
		let code = params.code.filter(|code| !code.is_empty()).ok_or(ClientInputError::MissingCode)?;
		let client_id = match params.client_id.filter(|id| !id.is_empty()) {
			Some(id) => ClientId::new(id),
			None => config.client_id.clone().ok_or(ClientInputError::MissingClientId)?,
		};

		Ok(Self {
			client_id,
			client_secret: config.client_secret.clone(),
			code: AuthorizationCode::new(code),
		})
	}

	/// Borrows the request as the outbound JSON body.
	pub fn body(&self) -> TokenExchangeBody<'_> {
		TokenExchangeBody {
			client_id: self.client_id.as_str(),
			client_secret: self.client_secret.secret(),
			code: self.code.secret(),
		}
	}
}

/// JSON body posted to the token endpoint.
#[derive(Serialize)]
pub struct TokenExchangeBody<'a> {
	/// Client identifier.
	pub client_id: &'a str,
	/// Server-held secret.
	pub client_secret: &'a str,
	/// Authorization code.
	pub code: &'a str,
}

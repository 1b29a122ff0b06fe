//! Upstream facade for the token-exchange and profile calls.

pub use oauth2;

// crates.io
use axum::body::Bytes;
use oauth2::{
	AccessToken, AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{ExchangeRequest, ExchangeResponse, ProfileInfo, TokenGrant},
	error::{ConfigError, TransportError, UpstreamRejection},
	http::{ResponseMetadata, ResponseMetadataSlot, UpstreamHttpClient},
	obs::{
		CapturedOutcome, CapturedRequest, CapturedResponse, ExchangeObserver, ExchangeRecord,
		ExchangeStage,
	},
	provider::UpstreamEndpoints,
};

const JSON: &str = "application/json";

/// Maps HTTP transport failures into exchange [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into an exchange error.
	fn map_transport_error(&self, stage: ExchangeStage, error: HttpClientError<E>) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(&self, stage: ExchangeStage, err: HttpClientError<ReqwestError>) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(stage, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) =>
				TransportError::network(stage, std::io::Error::other(message)).into(),
			_ => TransportError::network(stage, std::io::Error::other("unknown HTTP client error"))
				.into(),
		}
	}
}

/// Issues the two upstream calls and classifies their responses.
///
/// Non-2xx responses and OAuth error payloads become [`UpstreamRejection`]s carrying the
/// upstream status and body untouched.
pub(crate) struct GithubFacade<'a, C, M>
where
	C: ?Sized + UpstreamHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	endpoints: &'a UpstreamEndpoints,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
	observer: Option<&'a dyn ExchangeObserver>,
}
impl<'a, C, M> GithubFacade<'a, C, M>
where
	C: ?Sized + UpstreamHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(
		endpoints: &'a UpstreamEndpoints,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
		observer: Option<&'a dyn ExchangeObserver>,
	) -> Self {
		Self { endpoints, http_client, error_mapper, observer }
	}

	/// Redeems the authorization code and returns the grant.
	pub(crate) async fn exchange_code(&self, request: &ExchangeRequest) -> Result<TokenGrant> {
		const STAGE: ExchangeStage = ExchangeStage::TokenExchange;

		let body = serde_json::to_vec(&request.body()).map_err(ConfigError::from)?;
		let http_request = Request::builder()
			.method(Method::POST)
			.uri(self.endpoints.token.as_str())
			.header(CONTENT_TYPE, JSON)
			.header(ACCEPT, JSON)
			.body(body)
			.map_err(ConfigError::from)?;
		let (response, meta) = self.send(STAGE, http_request).await?;

		if !response.status().is_success() {
			return Err(rejection(STAGE, response, meta).into());
		}

		match decode::<ExchangeResponse>(STAGE, response.body())? {
			ExchangeResponse::Success(grant) => Ok(grant),
			ExchangeResponse::Error(payload) => {
				tracing::debug!(error = %payload.error, "Token endpoint returned an OAuth error.");

				Err(rejection(STAGE, response, meta).into())
			},
		}
	}

	/// Fetches the profile of the user the token was issued to.
	pub(crate) async fn fetch_profile(&self, token: &AccessToken) -> Result<ProfileInfo> {
		const STAGE: ExchangeStage = ExchangeStage::ProfileFetch;

		let http_request = Request::builder()
			.method(Method::GET)
			.uri(self.endpoints.profile.as_str())
			.header(AUTHORIZATION, format!("token {}", token.secret()))
			.header(ACCEPT, JSON)
			.body(Vec::new())
			.map_err(ConfigError::from)?;
		let (response, meta) = self.send(STAGE, http_request).await?;

		if !response.status().is_success() {
			return Err(rejection(STAGE, response, meta).into());
		}

		decode(STAGE, response.body())
	}

	async fn send(
		&self,
		stage: ExchangeStage,
		request: HttpRequest,
	) -> Result<(HttpResponse, ResponseMetadata)> {
		let slot = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(slot.clone());
		let captured = self.observer.map(|_| CapturedRequest::capture(&request));
		let result = handle.call(request).await;

		if let (Some(observer), Some(request)) = (self.observer, captured) {
			let outcome = match &result {
				Ok(response) => CapturedOutcome::Response(CapturedResponse::capture(response)),
				Err(e) => CapturedOutcome::TransportFailure(e.to_string()),
			};

			observer.observe(&ExchangeRecord {
				stage,
				captured_at: OffsetDateTime::now_utc(),
				request,
				outcome,
			});
		}

		let response =
			result.map_err(|err| self.error_mapper.map_transport_error(stage, err))?;
		let meta = slot.take().unwrap_or_else(|| ResponseMetadata::from_response(&response));

		Ok((response, meta))
	}
}

fn rejection(
	stage: ExchangeStage,
	response: HttpResponse,
	meta: ResponseMetadata,
) -> UpstreamRejection {
	let content_type = response
		.headers()
		.get(CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.map(ToOwned::to_owned);

	UpstreamRejection {
		stage,
		status: response.status().as_u16(),
		content_type,
		retry_after: meta.retry_after,
		body: Bytes::from(response.into_body()),
	}
}

fn decode<T>(stage: ExchangeStage, body: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut de = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut de)
		.map_err(|source| Error::MalformedUpstream { stage, source })
}

fn map_reqwest_error(stage: ExchangeStage, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransportError::Timeout { stage }.into();
	}

	TransportError::network(stage, err).into()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn decode_reports_path_of_bad_field() {
		let err = decode::<ProfileInfo>(ExchangeStage::ProfileFetch, br#"{"name":42}"#)
			.expect_err("Numeric name should not decode.");

		match err {
			Error::MalformedUpstream { stage, source } => {
				assert_eq!(stage, ExchangeStage::ProfileFetch);
				assert_eq!(source.path().to_string(), "name");
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn rejection_keeps_status_body_and_content_type() {
		let mut response = HttpResponse::new(br#"{"message":"Bad credentials"}"#.to_vec());

		*response.status_mut() = oauth2::http::StatusCode::UNAUTHORIZED;
		response.headers_mut().insert(
			CONTENT_TYPE,
			oauth2::http::HeaderValue::from_static("application/json; charset=utf-8"),
		);

		let meta = ResponseMetadata { retry_after: Some(Duration::seconds(60)) };
		let rejection = rejection(ExchangeStage::ProfileFetch, response, meta);

		assert_eq!(rejection.status, 401);
		assert_eq!(rejection.content_type.as_deref(), Some("application/json; charset=utf-8"));
		assert_eq!(rejection.retry_after, Some(Duration::seconds(60)));
		assert_eq!(&rejection.body[..], br#"{"message":"Bad credentials"}"#);
	}

	#[test]
	fn other_client_errors_become_network_failures() {
		let err = ReqwestTransportErrorMapper
			.map_transport_error(ExchangeStage::TokenExchange, HttpClientError::Other("boom".into()));

		assert!(matches!(err, Error::Transport(TransportError::Network { .. })));
		assert_eq!(err.status(), 502);
	}
}

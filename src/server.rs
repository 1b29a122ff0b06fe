//! HTTP surface: one exchange route, a liveness probe, and the process entry points.
//!
//! The route accepts either a JSON body (`POST`) or query parameters (`GET`), never both; the
//! convention is fixed at startup. Permissive CORS, request tracing, and a whole-request timeout
//! wrap every response. Dropping the connection drops the handler future and with it any
//! in-flight upstream call.

// std
use std::net::SocketAddr;
// crates.io
use axum::{
	Json, Router,
	body::Bytes,
	extract::{Query, State, rejection::QueryRejection},
	http::{
		HeaderMap, HeaderValue, StatusCode,
		header::{CONTENT_TYPE, RETRY_AFTER},
	},
	response::{IntoResponse, Response},
	routing::{MethodRouter, get, post},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
// self
use crate::{
	_prelude::*,
	auth::{ClientResult, ExchangeParams},
	config::{AppConfig, InboundMode, ServerConfig},
	error::ClientInputError,
	exchange::ReqwestExchanger,
};

/// Liveness probe path.
pub const HEALTH_PATH: &str = "/healthz";

/// Shared handler state.
#[derive(Clone, Debug)]
pub struct AppState {
	/// Exchanger shared by every request.
	pub exchanger: ReqwestExchanger,
	/// Whether JSON mode enforces `Content-Type: application/json`.
	pub require_json: bool,
}
impl AppState {
	/// Builds state from validated configuration.
	pub fn new(exchanger: ReqwestExchanger, server: &ServerConfig) -> Self {
		Self { exchanger, require_json: server.require_json }
	}
}

/// Builds the router for the configured inbound convention.
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
	let exchange: MethodRouter<AppState> = match server.inbound {
		InboundMode::JsonBody => post(exchange_json),
		InboundMode::Query => get(exchange_query),
	};

	Router::new()
		.route(&server.path, exchange)
		.route(HEALTH_PATH, get(health))
		.with_state(state)
		.layer(TimeoutLayer::new(server.request_timeout))
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
}

/// Loads configuration from `vars`, then binds and serves until `shutdown` resolves.
///
/// Configuration is validated before any socket is bound; a missing client secret returns an
/// error without listening.
pub async fn run(
	vars: config::Map<String, String>,
	shutdown: impl 'static + Send + Future<Output = ()>,
) -> color_eyre::Result<()> {
	let settings = crate::config::Settings::from_env_map(vars)?;
	let config = AppConfig::from_settings(settings)?;

	serve(config, shutdown).await
}

/// Binds the configured address and serves until `shutdown` resolves.
pub async fn serve(
	config: AppConfig,
	shutdown: impl 'static + Send + Future<Output = ()>,
) -> color_eyre::Result<()> {
	let exchanger = ReqwestExchanger::new(config.exchange.clone())?;
	let listener = TcpListener::bind(config.server.listen).await?;

	serve_on(listener, exchanger, &config.server, shutdown).await
}

/// Serves on an already bound listener.
pub async fn serve_on(
	listener: TcpListener,
	exchanger: ReqwestExchanger,
	server: &ServerConfig,
	shutdown: impl 'static + Send + Future<Output = ()>,
) -> color_eyre::Result<()> {
	let local: SocketAddr = listener.local_addr()?;
	let app = build_router(AppState::new(exchanger, server), server);

	tracing::info!(
		addr = %local,
		path = %server.path,
		inbound = ?server.inbound,
		"Listening for exchange requests."
	);

	axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

	tracing::info!("Server stopped.");

	Ok(())
}

async fn exchange_json(
	State(state): State<AppState>,
	headers: HeaderMap,
	body: Bytes,
) -> Result<Json<ClientResult>> {
	let params = decode_json_params(&headers, &body, state.require_json)?;

	Ok(Json(state.exchanger.exchange(params).await?))
}

async fn exchange_query(
	State(state): State<AppState>,
	query: Result<Query<ExchangeParams>, QueryRejection>,
) -> Result<Json<ClientResult>> {
	let Query(params) = query.map_err(|e| ClientInputError::Decode(e.body_text()))?;

	Ok(Json(state.exchanger.exchange(params).await?))
}

async fn health() -> &'static str {
	"ok"
}

fn decode_json_params(
	headers: &HeaderMap,
	body: &[u8],
	require_json: bool,
) -> Result<ExchangeParams, ClientInputError> {
	if require_json {
		let declared = headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok()).unwrap_or("");
		let essence = declared.split(';').next().unwrap_or("").trim();

		if !essence.eq_ignore_ascii_case("application/json") {
			return Err(ClientInputError::UnsupportedMediaType { found: declared.to_owned() });
		}
	}
	if body.is_empty() {
		return Err(ClientInputError::EmptyBody);
	}

	let mut de = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut de).map_err(|e| ClientInputError::Decode(e.to_string()))
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let status = StatusCode::from_u16(self.status()).unwrap_or(StatusCode::BAD_GATEWAY);

		match self {
			Error::Upstream(rejection) => {
				let content_type = rejection
					.content_type
					.as_deref()
					.and_then(|value| HeaderValue::from_str(value).ok())
					.unwrap_or(HeaderValue::from_static("application/json"));
				let mut response = (status, rejection.body).into_response();

				response.headers_mut().insert(CONTENT_TYPE, content_type);

				if let Some(retry_after) = rejection.retry_after {
					let secs = u64::try_from(retry_after.whole_seconds()).unwrap_or_default();

					response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
				}

				response
			},
			Error::Config(e) => {
				tracing::error!(error = ?e, "Configuration error surfaced during a request.");

				(status, Json(serde_json::json!({ "error": "internal error" }))).into_response()
			},
			other if status.is_server_error() => {
				tracing::error!(error = ?other, "Exchange failed upstream.");

				let reason = status.canonical_reason().unwrap_or("upstream error").to_ascii_lowercase();

				(status, Json(serde_json::json!({ "error": reason }))).into_response()
			},
			other => (status, Json(serde_json::json!({ "error": other.to_string() }))).into_response(),
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use axum::http::header::HeaderName;
	// self
	use super::*;
	use crate::{
		error::{TransportError, UpstreamRejection},
		obs::ExchangeStage,
	};

	fn headers(pairs: &[(HeaderName, &'static str)]) -> HeaderMap {
		pairs.iter().map(|(k, v)| (k.clone(), HeaderValue::from_static(v))).collect()
	}

	#[test]
	fn json_mode_checks_media_type_then_body() {
		let json = headers(&[(CONTENT_TYPE, "application/json; charset=utf-8")]);
		let text = headers(&[(CONTENT_TYPE, "text/plain")]);

		assert_eq!(
			decode_json_params(&text, br#"{"code":"c"}"#, true).map(|_| ()),
			Err(ClientInputError::UnsupportedMediaType { found: "text/plain".into() })
		);
		assert_eq!(decode_json_params(&json, b"", true).map(|_| ()), Err(ClientInputError::EmptyBody));
		assert!(matches!(
			decode_json_params(&json, b"{\"code\":", true),
			Err(ClientInputError::Decode(_))
		));
		assert!(decode_json_params(&text, br#"{"code":"c"}"#, false).is_ok());

		let params =
			decode_json_params(&json, br#"{"code":"c","client_id":"id"}"#, true).expect("Decodes.");

		assert_eq!(params.code.as_deref(), Some("c"));
		assert_eq!(params.client_id.as_deref(), Some("id"));
	}

	#[test]
	fn upstream_rejection_response_is_verbatim() {
		let response = Error::from(UpstreamRejection {
			stage: ExchangeStage::TokenExchange,
			status: 429,
			content_type: Some("application/json; charset=utf-8".into()),
			retry_after: Some(Duration::seconds(7)),
			body: Bytes::from_static(br#"{"error":"slow_down"}"#),
		})
		.into_response();

		assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
		assert_eq!(
			response.headers().get(CONTENT_TYPE),
			Some(&HeaderValue::from_static("application/json; charset=utf-8"))
		);
		assert_eq!(response.headers().get(RETRY_AFTER), Some(&HeaderValue::from(7_u64)));
	}

	#[tokio::test]
	async fn gateway_errors_hide_internal_detail() {
		let mut de = serde_json::Deserializer::from_str(r#"{"access_token":7}"#);
		let source = serde_path_to_error::deserialize::<_, crate::auth::ExchangeResponse>(&mut de)
			.expect_err("Numeric token should not decode.");
		let cases = [
			(
				Error::MalformedUpstream { stage: ExchangeStage::TokenExchange, source },
				StatusCode::BAD_GATEWAY,
				r#"{"error":"bad gateway"}"#,
			),
			(
				TransportError::Timeout { stage: ExchangeStage::ProfileFetch }.into(),
				StatusCode::GATEWAY_TIMEOUT,
				r#"{"error":"gateway timeout"}"#,
			),
		];

		for (error, status, body) in cases {
			let response = error.into_response();

			assert_eq!(response.status(), status);

			let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
				.await
				.expect("Body should be readable.");

			assert_eq!(&bytes[..], body.as_bytes());
		}
	}

	#[test]
	fn client_errors_render_json_message() {
		let response = Error::from(ClientInputError::MissingCode).into_response();

		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
		assert_eq!(
			response.headers().get(CONTENT_TYPE),
			Some(&HeaderValue::from_static("application/json"))
		);
	}
}

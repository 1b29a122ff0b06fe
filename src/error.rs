//! Exchange-level error types shared across validation, upstream calls, and startup.

// crates.io
use axum::body::Bytes;
// self
use crate::{_prelude::*, obs::ExchangeStage};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical exchange error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Caller supplied a malformed or incomplete request.
	#[error(transparent)]
	ClientInput(#[from] ClientInputError),
	/// Upstream answered with a non-success status or an OAuth error payload.
	#[error(transparent)]
	Upstream(#[from] UpstreamRejection),
	/// Upstream could not be reached (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// Upstream returned a success status with a body that does not decode.
	#[error("The {stage} response could not be decoded: {source}.")]
	MalformedUpstream {
		/// Stage whose response failed to decode.
		stage: ExchangeStage,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl Error {
	/// Returns the HTTP status the caller should observe for this error.
	pub fn status(&self) -> u16 {
		match self {
			Self::ClientInput(e) => e.status(),
			Self::Upstream(e) => e.status,
			Self::Transport(e) => e.status(),
			Self::Config(_) => 500,
			// Profile payloads that do not decode are reported as a bad request.
			Self::MalformedUpstream { stage: ExchangeStage::ProfileFetch, .. } => 400,
			Self::MalformedUpstream { .. } => 502,
		}
	}
}

/// Validation failures raised before any upstream call is made.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ClientInputError {
	/// Declared content type is not JSON while JSON is required.
	#[error("unsupported media type: {found}")]
	UnsupportedMediaType {
		/// Content type the caller declared (empty when absent).
		found: String,
	},
	/// Request body was empty.
	#[error("empty body")]
	EmptyBody,
	/// Request payload could not be decoded.
	#[error("{0}")]
	Decode(String),
	/// `code` was absent or empty.
	#[error("missing code")]
	MissingCode,
	/// `client_id` was absent and no server default is configured.
	#[error("missing client_id")]
	MissingClientId,
}
impl ClientInputError {
	/// Returns the HTTP status for this validation failure.
	pub fn status(&self) -> u16 {
		match self {
			Self::UnsupportedMediaType { .. } => 415,
			_ => 400,
		}
	}
}

/// Upstream response forwarded verbatim to the caller.
#[derive(Clone, Debug, ThisError)]
#[error("Upstream {stage} call was rejected with HTTP {status}.")]
pub struct UpstreamRejection {
	/// Stage that produced the rejection.
	pub stage: ExchangeStage,
	/// HTTP status returned by the upstream.
	pub status: u16,
	/// Upstream `Content-Type`, when supplied.
	pub content_type: Option<String>,
	/// Upstream `Retry-After` hint, when supplied.
	pub retry_after: Option<Duration>,
	/// Raw upstream body bytes.
	pub body: Bytes,
}

/// Transport-level failures (network, IO, timeout).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Upstream did not answer within the configured timeout.
	#[error("Timed out while calling the {stage} endpoint.")]
	Timeout {
		/// Stage that timed out.
		stage: ExchangeStage,
	},
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {stage} endpoint.")]
	Network {
		/// Stage that failed.
		stage: ExchangeStage,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling an upstream endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(stage: ExchangeStage, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { stage, source: Box::new(src) }
	}

	/// Returns the gateway status for this failure.
	pub fn status(&self) -> u16 {
		match self {
			Self::Timeout { .. } => 504,
			_ => 502,
		}
	}
}

/// Configuration and validation failures raised at startup or while building requests.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Mandatory client secret is absent.
	#[error("Environment variable GITHUB_CLIENT_SECRET must be set.")]
	MissingClientSecret,
	/// Configuration sources could not be read or deserialized.
	#[error("Configuration could not be loaded.")]
	Load(#[from] config::ConfigError),
	/// Listen address cannot be parsed.
	#[error("Listen address `{value}` is invalid.")]
	InvalidListen {
		/// Offending value.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: std::net::AddrParseError,
	},
	/// Route path does not start with `/` or collides with the liveness probe.
	#[error("Route path `{0}` must start with `/` and differ from `/healthz`.")]
	InvalidPath(String),
	/// Inbound convention is neither `json` nor `query`.
	#[error("Inbound convention `{0}` is not one of `json` or `query`.")]
	InvalidInbound(String),
	/// Log format is neither `pretty` nor `json`.
	#[error("Log format `{0}` is not one of `pretty` or `json`.")]
	InvalidLogFormat(String),
	/// A timeout was configured as zero.
	#[error("The {0} timeout must be positive.")]
	ZeroTimeout(&'static str),
	/// An upstream endpoint is not a valid HTTP(S) URL.
	#[error("The {endpoint} endpoint `{value}` is invalid.")]
	InvalidEndpoint {
		/// Endpoint label.
		endpoint: &'static str,
		/// Offending value.
		value: String,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Outbound payload could not be serialized.
	#[error("Outbound payload could not be serialized.")]
	Serialize(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

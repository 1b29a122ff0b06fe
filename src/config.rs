//! Startup configuration.
//!
//! Values are read once, through the `config` crate, from two environment prefixes:
//!
//! - `GITHUB_CLIENT_ID` / `GITHUB_CLIENT_SECRET` carry the OAuth application credentials.
//! - `EXCHANGE_*` carries server knobs (`EXCHANGE_DEBUG`, `EXCHANGE_LISTEN`, ...).
//!
//! [`Settings`] is the raw deserialized form. [`AppConfig::from_settings`] validates it into
//! immutable values; a missing client secret is rejected there, before any listener exists.

// std
use std::{net::SocketAddr, time::Duration as StdDuration};
// crates.io
use config::{Config, Environment, Map};
use oauth2::{ClientId, ClientSecret};
// self
use crate::{_prelude::*, error::ConfigError, provider::UpstreamEndpoints};

/// Raw settings as they appear in the environment.
#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
	/// Default client identifier.
	pub client_id: Option<String>,
	/// Confidential client secret.
	pub client_secret: Option<String>,
	/// Enables upstream request/response capture.
	pub debug: bool,
	/// Socket address to bind.
	pub listen: String,
	/// Inbound route path.
	pub path: String,
	/// Inbound parameter convention (`json` or `query`).
	pub inbound: String,
	/// Whether the profile fetch runs after a successful exchange.
	pub enrich_profile: bool,
	/// Whether JSON mode enforces `Content-Type: application/json`.
	pub require_json: bool,
	/// Per-call outbound timeout, in seconds.
	pub upstream_timeout_secs: u64,
	/// Whole inbound request timeout, in seconds.
	pub request_timeout_secs: u64,
	/// Token endpoint URL.
	pub token_url: String,
	/// Profile endpoint URL.
	pub profile_url: String,
	/// Log output format (`pretty` or `json`).
	pub log_format: String,
}
impl Settings {
	/// Loads settings from the process environment.
	pub fn load() -> Result<Self, ConfigError> {
		Self::from_env_map(std::env::vars().collect())
	}

	/// Loads settings from an explicit variable map, using the same rules as [`Settings::load`].
	pub fn from_env_map(vars: Map<String, String>) -> Result<Self, ConfigError> {
		let settings = Config::builder()
			.set_default("debug", false)?
			.set_default("listen", "0.0.0.0:8080")?
			.set_default("path", "/authenticate/github")?
			.set_default("inbound", "json")?
			.set_default("enrich_profile", true)?
			.set_default("require_json", true)?
			.set_default("upstream_timeout_secs", 10)?
			.set_default("request_timeout_secs", 30)?
			.set_default("token_url", UpstreamEndpoints::GITHUB_TOKEN_URL)?
			.set_default("profile_url", UpstreamEndpoints::GITHUB_PROFILE_URL)?
			.set_default("log_format", "pretty")?
			// Only the two credential keys are taken from the `GITHUB_` prefix.
			.add_source(credential_source(&vars))
			.add_source(Environment::with_prefix("EXCHANGE").source(Some(vars)))
			.build()?;

		Ok(settings.try_deserialize()?)
	}
}

fn credential_source(vars: &Map<String, String>) -> Environment {
	let credentials = vars
		.iter()
		.filter(|(key, _)| matches!(key.as_str(), "GITHUB_CLIENT_ID" | "GITHUB_CLIENT_SECRET"))
		.map(|(key, value)| (key.clone(), value.clone()))
		.collect();

	Environment::with_prefix("GITHUB").source(Some(credentials))
}

/// Inbound parameter convention; exactly one per deployed instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InboundMode {
	/// `POST` with a JSON body `{client_id?, code}`.
	#[default]
	JsonBody,
	/// `GET` with query parameters `client_id?`, `code`.
	Query,
}
impl FromStr for InboundMode {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"json" => Ok(Self::JsonBody),
			"query" => Ok(Self::Query),
			_ => Err(ConfigError::InvalidInbound(s.to_owned())),
		}
	}
}

/// Subscriber output format used by the binary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
	/// Human-readable multi-line output.
	#[default]
	Pretty,
	/// One JSON object per event.
	Json,
}
impl FromStr for LogFormat {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"pretty" => Ok(Self::Pretty),
			"json" => Ok(Self::Json),
			_ => Err(ConfigError::InvalidLogFormat(s.to_owned())),
		}
	}
}

/// Immutable configuration consumed by the exchanger.
#[derive(Clone)]
pub struct ExchangeConfig {
	/// Fallback client identifier for callers that omit one.
	pub client_id: Option<ClientId>,
	/// Server-held secret injected into every exchange.
	pub client_secret: ClientSecret,
	/// Enables upstream request/response capture.
	pub debug: bool,
	/// Whether the profile fetch runs.
	pub enrich_profile: bool,
	/// Upstream token + profile endpoints.
	pub endpoints: UpstreamEndpoints,
	/// Per-call outbound timeout.
	pub upstream_timeout: StdDuration,
}
impl ExchangeConfig {
	const DEFAULT_UPSTREAM_TIMEOUT: StdDuration = StdDuration::from_secs(10);

	/// Creates a configuration for `endpoints` with default knobs.
	pub fn new(client_secret: impl Into<String>, endpoints: UpstreamEndpoints) -> Self {
		Self {
			client_id: None,
			client_secret: ClientSecret::new(client_secret.into()),
			debug: false,
			enrich_profile: true,
			endpoints,
			upstream_timeout: Self::DEFAULT_UPSTREAM_TIMEOUT,
		}
	}

	/// Sets the fallback client identifier.
	pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(ClientId::new(client_id.into()));

		self
	}

	/// Toggles the profile fetch.
	pub fn with_enrich_profile(mut self, enrich: bool) -> Self {
		self.enrich_profile = enrich;

		self
	}

	/// Toggles upstream capture.
	pub fn with_debug(mut self, debug: bool) -> Self {
		self.debug = debug;

		self
	}

	/// Overrides the per-call outbound timeout.
	pub fn with_upstream_timeout(mut self, timeout: StdDuration) -> Self {
		self.upstream_timeout = timeout;

		self
	}
}
impl Debug for ExchangeConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ExchangeConfig")
			.field("client_id", &self.client_id.as_ref().map(|id| id.as_str()))
			.field("client_secret_set", &true)
			.field("debug", &self.debug)
			.field("enrich_profile", &self.enrich_profile)
			.field("endpoints", &self.endpoints)
			.field("upstream_timeout", &self.upstream_timeout)
			.finish()
	}
}

/// Immutable HTTP server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
	/// Socket address to bind.
	pub listen: SocketAddr,
	/// Inbound route path.
	pub path: String,
	/// Inbound parameter convention.
	pub inbound: InboundMode,
	/// Whether JSON mode enforces `Content-Type: application/json`.
	pub require_json: bool,
	/// Whole inbound request timeout.
	pub request_timeout: StdDuration,
	/// Subscriber output format.
	pub log_format: LogFormat,
}
impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
			path: "/authenticate/github".into(),
			inbound: InboundMode::JsonBody,
			require_json: true,
			request_timeout: StdDuration::from_secs(30),
			log_format: LogFormat::Pretty,
		}
	}
}

/// Validated configuration for the whole process.
#[derive(Clone, Debug)]
pub struct AppConfig {
	/// Exchanger configuration.
	pub exchange: ExchangeConfig,
	/// Server configuration.
	pub server: ServerConfig,
}
impl AppConfig {
	/// Loads and validates configuration from the process environment.
	pub fn load() -> Result<Self, ConfigError> {
		Self::from_settings(Settings::load()?)
	}

	/// Validates raw settings.
	pub fn from_settings(settings: Settings) -> Result<Self, ConfigError> {
		let client_secret = settings
			.client_secret
			.filter(|secret| !secret.is_empty())
			.ok_or(ConfigError::MissingClientSecret)?;
		let client_id = settings.client_id.filter(|id| !id.is_empty()).map(ClientId::new);
		let listen = settings
			.listen
			.parse::<SocketAddr>()
			.map_err(|source| ConfigError::InvalidListen { value: settings.listen.clone(), source })?;

		if !settings.path.starts_with('/') || settings.path == crate::server::HEALTH_PATH {
			return Err(ConfigError::InvalidPath(settings.path));
		}
		if settings.upstream_timeout_secs == 0 {
			return Err(ConfigError::ZeroTimeout("upstream"));
		}
		if settings.request_timeout_secs == 0 {
			return Err(ConfigError::ZeroTimeout("request"));
		}

		let endpoints = UpstreamEndpoints::parse(&settings.token_url, &settings.profile_url)?;
		let exchange = ExchangeConfig {
			client_id,
			client_secret: ClientSecret::new(client_secret),
			debug: settings.debug,
			enrich_profile: settings.enrich_profile,
			endpoints,
			upstream_timeout: StdDuration::from_secs(settings.upstream_timeout_secs),
		};
		let server = ServerConfig {
			listen,
			path: settings.path,
			inbound: settings.inbound.parse()?,
			require_json: settings.require_json,
			request_timeout: StdDuration::from_secs(settings.request_timeout_secs),
			log_format: settings.log_format.parse()?,
		};

		Ok(Self { exchange, server })
	}
}

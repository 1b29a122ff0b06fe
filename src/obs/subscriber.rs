// crates.io
use tracing_subscriber::{
	EnvFilter,
	filter::{Directive, ParseError},
	layer::SubscriberExt,
	util::SubscriberInitExt,
};
// self
use crate::config::LogFormat;

/// Default filter applied when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "github_token_exchange=info,tower_http=info";
/// Directive enabling the debug capture records, added whenever debugging is configured.
pub const CAPTURE_LOG_DIRECTIVE: &str = "github_token_exchange::obs::capture=debug";

/// Builds the process filter from `RUST_LOG` (or [`DEFAULT_LOG_FILTER`]).
///
/// With `debug` set the capture records are always let through, whatever the base filter says
/// about other targets.
pub fn build_log_filter(debug: bool) -> Result<EnvFilter, ParseError> {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

	if !debug {
		return Ok(filter);
	}

	Ok(filter.add_directive(CAPTURE_LOG_DIRECTIVE.parse::<Directive>()?))
}

/// Installs the global subscriber.
///
/// Fails when a global subscriber is already installed.
pub fn init_subscriber(format: LogFormat, debug: bool) -> color_eyre::Result<()> {
	let registry = tracing_subscriber::registry().with(build_log_filter(debug)?);

	match format {
		LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init()?,
		LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).try_init()?,
	}

	Ok(())
}

//! Binary entry point: load configuration, install logging, serve until interrupted.

// crates.io
use color_eyre::{Result, eyre::WrapErr};
// self
use github_token_exchange::{config::AppConfig, obs, server};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	// Fails before any socket is bound; the report goes to stderr and the exit code is 1.
	let config = AppConfig::load().wrap_err("Refusing to start.")?;

	obs::init_subscriber(config.server.log_format, config.exchange.debug)?;

	tracing::info!(
		exchange = ?config.exchange,
		listen = %config.server.listen,
		"Configuration loaded."
	);

	server::serve(config, shutdown_signal()).await
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %e, "Failed to listen for Ctrl-C.");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			},
			Err(e) => {
				tracing::error!(error = %e, "Failed to listen for SIGTERM.");
				std::future::pending::<()>().await;
			},
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}

	tracing::info!("Shutdown signal received.");
}

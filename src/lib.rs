//! Server-side GitHub OAuth code exchange: redeem authorization codes with a confidential client
//! secret that never leaves the server, optionally enrich the result with the user's profile,
//! and hand back a minimal `{user_name, user_email, token}` payload.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod exchange;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod server;
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::{ExchangeConfig, ServerConfig},
		exchange::ReqwestExchanger,
		obs::{ExchangeObserver, ExchangeRecord},
		provider::UpstreamEndpoints,
		server::{self, AppState},
	};

	/// Client identifier used by test configurations.
	pub const TEST_CLIENT_ID: &str = "test-client";
	/// Server-held secret used by test configurations.
	pub const TEST_CLIENT_SECRET: &str = "server-secret";
	/// Token endpoint path served by stub upstreams.
	pub const TOKEN_PATH: &str = "/login/oauth/access_token";
	/// Profile endpoint path served by stub upstreams.
	pub const PROFILE_PATH: &str = "/user";

	/// Observer that keeps every record in memory.
	#[derive(Debug, Default)]
	pub struct RecordingObserver {
		records: Mutex<Vec<ExchangeRecord>>,
	}
	impl RecordingObserver {
		/// Returns a snapshot of the captured records.
		pub fn records(&self) -> Vec<ExchangeRecord> {
			self.records.lock().clone()
		}
	}
	impl ExchangeObserver for RecordingObserver {
		fn observe(&self, record: &ExchangeRecord) {
			self.records.lock().push(record.clone());
		}
	}

	/// Builds a configuration whose endpoints live under `base_url` (a stub upstream).
	pub fn test_exchange_config(base_url: &str) -> ExchangeConfig {
		let endpoints = UpstreamEndpoints::parse(
			&format!("{base_url}{TOKEN_PATH}"),
			&format!("{base_url}{PROFILE_PATH}"),
		)
		.expect("Stub upstream endpoints should parse.");

		ExchangeConfig::new(TEST_CLIENT_SECRET, endpoints).with_client_id(TEST_CLIENT_ID)
	}

	/// Builds a reqwest-backed exchanger for `config`.
	pub fn build_test_exchanger(config: ExchangeConfig) -> ReqwestExchanger {
		ReqwestExchanger::new(config).expect("Failed to build test exchanger.")
	}

	/// Builds the full router around `exchanger`.
	pub fn build_test_router(exchanger: ReqwestExchanger, server: &ServerConfig) -> axum::Router {
		server::build_router(AppState::new(exchanger, server), server)
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::Mutex;
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {httpmock as _, tower as _};

//! Debug capture of upstream round trips.
//!
//! When debugging is enabled the exchanger hands every outbound request and its response (or
//! transport failure) to an [`ExchangeObserver`] as an [`ExchangeRecord`]. Observers are
//! infallible and receive shared references only, so they cannot influence the pipeline.
//! Credentials are replaced with [`REDACTED`] while the record is captured; no observer ever
//! sees the client secret or an issued token.

// crates.io
use oauth2::{HttpRequest, HttpResponse, http::HeaderMap};
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, obs::ExchangeStage};

/// Placeholder substituted for sensitive values.
pub const REDACTED: &str = "<redacted>";

const SENSITIVE_HEADERS: [&str; 1] = ["authorization"];
const SENSITIVE_FIELDS: [&str; 3] = ["client_secret", "access_token", "refresh_token"];

/// Receives structured records of upstream round trips.
pub trait ExchangeObserver
where
	Self: Send + Sync,
{
	/// Called once per upstream call, after the response (or failure) is known.
	fn observe(&self, record: &ExchangeRecord);
}

/// Observer that discards every record.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;
impl ExchangeObserver for NoopObserver {
	fn observe(&self, _record: &ExchangeRecord) {}
}

/// Observer that emits each record as a structured `debug` event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;
impl ExchangeObserver for TracingObserver {
	fn observe(&self, record: &ExchangeRecord) {
		let request = &record.request;

		match &record.outcome {
			CapturedOutcome::Response(response) => tracing::debug!(
				stage = %record.stage,
				captured_at = %record.captured_at,
				method = %request.method,
				uri = %request.uri,
				request_headers = ?request.headers,
				request_body = %request.body,
				status = response.status,
				response_headers = ?response.headers,
				response_body = %response.body,
				"Captured upstream round trip."
			),
			CapturedOutcome::TransportFailure(reason) => tracing::debug!(
				stage = %record.stage,
				captured_at = %record.captured_at,
				method = %request.method,
				uri = %request.uri,
				request_headers = ?request.headers,
				request_body = %request.body,
				failure = %reason,
				"Captured failed upstream call."
			),
		}
	}
}

/// One upstream request together with what came back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangeRecord {
	/// Pipeline stage that issued the call.
	pub stage: ExchangeStage,
	/// Wall-clock time the record was assembled.
	pub captured_at: OffsetDateTime,
	/// Outbound request snapshot.
	pub request: CapturedRequest,
	/// Response snapshot or transport failure.
	pub outcome: CapturedOutcome,
}
impl ExchangeRecord {
	/// Returns the captured response, if the call produced one.
	pub fn response(&self) -> Option<&CapturedResponse> {
		match &self.outcome {
			CapturedOutcome::Response(response) => Some(response),
			CapturedOutcome::TransportFailure(_) => None,
		}
	}
}

/// Result half of an [`ExchangeRecord`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CapturedOutcome {
	/// Upstream answered (any status).
	Response(CapturedResponse),
	/// Upstream could not be reached; carries the transport error message.
	TransportFailure(String),
}

/// Redacted snapshot of an outbound request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedRequest {
	/// HTTP method.
	pub method: String,
	/// Target URI.
	pub uri: String,
	/// Header name/value pairs in wire order.
	pub headers: Vec<(String, String)>,
	/// Body rendered as UTF-8 (lossy).
	pub body: String,
}
impl CapturedRequest {
	/// Snapshots an outbound request.
	pub fn capture(request: &HttpRequest) -> Self {
		Self {
			method: request.method().to_string(),
			uri: request.uri().to_string(),
			headers: capture_headers(request.headers()),
			body: capture_body(request.body()),
		}
	}

	/// Looks up a captured header by case-insensitive name.
	pub fn header(&self, name: &str) -> Option<&str> {
		find_header(&self.headers, name)
	}
}

/// Redacted snapshot of an upstream response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedResponse {
	/// HTTP status code.
	pub status: u16,
	/// Header name/value pairs in wire order.
	pub headers: Vec<(String, String)>,
	/// Body rendered as UTF-8 (lossy).
	pub body: String,
}
impl CapturedResponse {
	/// Snapshots an upstream response.
	pub fn capture(response: &HttpResponse) -> Self {
		Self {
			status: response.status().as_u16(),
			headers: capture_headers(response.headers()),
			body: capture_body(response.body()),
		}
	}

	/// Looks up a captured header by case-insensitive name.
	pub fn header(&self, name: &str) -> Option<&str> {
		find_header(&self.headers, name)
	}
}

fn capture_headers(headers: &HeaderMap) -> Vec<(String, String)> {
	headers
		.iter()
		.map(|(name, value)| {
			let name = name.as_str().to_owned();
			let value = if SENSITIVE_HEADERS.contains(&name.as_str()) {
				REDACTED.to_owned()
			} else {
				String::from_utf8_lossy(value.as_bytes()).into_owned()
			};

			(name, value)
		})
		.collect()
}

fn capture_body(raw: &[u8]) -> String {
	if let Ok(mut object) = serde_json::from_slice::<Map<String, Value>>(raw) {
		let mut touched = false;

		for field in SENSITIVE_FIELDS {
			if let Some(value) = object.get_mut(field) {
				*value = Value::from(REDACTED);
				touched = true;
			}
		}

		if touched {
			return Value::Object(object).to_string();
		}
	}

	String::from_utf8_lossy(raw).into_owned()
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
	headers
		.iter()
		.find(|(key, _)| key.eq_ignore_ascii_case(name))
		.map(|(_, value)| value.as_str())
}

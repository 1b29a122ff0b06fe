//! Observability helpers for the exchange pipeline.
//!
//! # Feature Flags
//!
//! - Spans named `github_token_exchange.exchange` carry the `stage` field for every pipeline step.
//! - Enable `metrics` to increment the `github_token_exchange_stage_total` counter for every
//!   attempt/success/failure, labeled by `stage` + `outcome`.
//!
//! The debug capture side channel lives in [`capture`]: an [`ExchangeObserver`] receives one
//! structured [`ExchangeRecord`] per upstream round trip.

pub mod capture;

mod counter;
mod span;
mod subscriber;

pub use capture::*;
pub use counter::*;
pub use span::*;
pub use subscriber::*;

// self
use crate::_prelude::*;

/// Pipeline stages observed by the exchanger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExchangeStage {
	/// Inbound request validation.
	Validate,
	/// Authorization code redemption at the token endpoint.
	TokenExchange,
	/// Authenticated user profile lookup.
	ProfileFetch,
}
impl ExchangeStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ExchangeStage::Validate => "validate",
			ExchangeStage::TokenExchange => "token_exchange",
			ExchangeStage::ProfileFetch => "profile_fetch",
		}
	}
}
impl Display for ExchangeStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExchangeOutcome {
	/// Entry to a stage.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl ExchangeOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ExchangeOutcome::Attempt => "attempt",
			ExchangeOutcome::Success => "success",
			ExchangeOutcome::Failure => "failure",
		}
	}
}
impl Display for ExchangeOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn stage_labels_are_snake_case() {
		assert_eq!(ExchangeStage::TokenExchange.to_string(), "token_exchange");
		assert_eq!(ExchangeStage::ProfileFetch.to_string(), "profile_fetch");
		assert_eq!(ExchangeOutcome::Failure.as_str(), "failure");
	}
}

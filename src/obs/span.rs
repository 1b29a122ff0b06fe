// self
use crate::{_prelude::*, obs::ExchangeStage};

/// A span builder used by the exchange pipeline.
#[derive(Clone, Debug)]
pub struct ExchangeSpan {
	span: tracing::Span,
}
impl ExchangeSpan {
	/// Creates a new span tagged with the provided stage.
	pub fn new(stage: ExchangeStage) -> Self {
		let span = tracing::info_span!("github_token_exchange.exchange", stage = stage.as_str());

		Self { span }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> tracing::instrument::Instrumented<Fut>
	where
		Fut: Future,
	{
		use tracing::Instrument;

		fut.instrument(self.span.clone())
	}
}

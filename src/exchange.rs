//! The exchange pipeline: validate, redeem the code, optionally fetch the profile, and shape the
//! caller-facing result.
//!
//! Every stage runs inside its own span and records an attempt/success/failure outcome. The first
//! failing stage ends the request; nothing is retried or cached, so two identical calls perform
//! two independent upstream round trips.

// self
use crate::{
	_prelude::*,
	auth::{ClientResult, ExchangeParams, ExchangeRequest},
	config::ExchangeConfig,
	http::{ReqwestHttpClient, UpstreamHttpClient},
	oauth::{GithubFacade, ReqwestTransportErrorMapper, TransportErrorMapper},
	obs::{
		self, ExchangeObserver, ExchangeOutcome, ExchangeSpan, ExchangeStage, NoopObserver,
		TracingObserver,
	},
};

/// Exchanger specialized for the crate's default reqwest transport stack.
pub type ReqwestExchanger = Exchanger<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Redeems GitHub authorization codes on behalf of callers.
///
/// The exchanger owns the immutable configuration, the shared HTTP client, the transport error
/// mapper, and the debug observer. Cloning is cheap and every clone shares the same connection
/// pool.
pub struct Exchanger<C, M>
where
	C: ?Sized + UpstreamHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Configuration loaded at startup.
	pub config: Arc<ExchangeConfig>,
	/// HTTP client wrapper used for every upstream request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Receives captured round trips while `config.debug` is set.
	pub observer: Arc<dyn ExchangeObserver>,
}
impl<C, M> Exchanger<C, M>
where
	C: ?Sized + UpstreamHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an exchanger that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		config: ExchangeConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			config: Arc::new(config),
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			observer: Arc::new(NoopObserver),
		}
	}

	/// Replaces the debug observer.
	pub fn with_observer(mut self, observer: Arc<dyn ExchangeObserver>) -> Self {
		self.observer = observer;

		self
	}

	/// Runs the full pipeline for one inbound request.
	pub async fn exchange(&self, params: ExchangeParams) -> Result<ClientResult> {
		let request = self
			.stage(ExchangeStage::Validate, async {
				ExchangeRequest::validate(params, &self.config).map_err(Error::from)
			})
			.await?;
		let observer = self.config.debug.then_some(self.observer.as_ref());
		let facade: GithubFacade<C, M> = GithubFacade::new(
			&self.config.endpoints,
			self.http_client.clone(),
			self.transport_mapper.clone(),
			observer,
		);
		let grant = self.stage(ExchangeStage::TokenExchange, facade.exchange_code(&request)).await?;
		let profile = if self.config.enrich_profile {
			Some(
				self.stage(ExchangeStage::ProfileFetch, facade.fetch_profile(&grant.access_token))
					.await?,
			)
		} else {
			None
		};

		Ok(ClientResult::new(&grant.access_token, profile))
	}

	async fn stage<T, Fut>(&self, stage: ExchangeStage, fut: Fut) -> Result<T>
	where
		Fut: Future<Output = Result<T>>,
	{
		let span = ExchangeSpan::new(stage);

		obs::record_stage_outcome(stage, ExchangeOutcome::Attempt);

		let result = span.instrument(fut).await;

		match &result {
			Ok(_) => obs::record_stage_outcome(stage, ExchangeOutcome::Success),
			Err(e) => {
				obs::record_stage_outcome(stage, ExchangeOutcome::Failure);

				match e {
					Error::ClientInput(_) | Error::Upstream(_) =>
						tracing::debug!(%stage, status = e.status(), error = %e, "Exchange stage failed."),
					_ => tracing::warn!(%stage, status = e.status(), error = %e, "Exchange stage failed."),
				}
			},
		}

		result
	}
}
impl ReqwestExchanger {
	/// Creates an exchanger with its own reqwest client bounded by `config.upstream_timeout`.
	///
	/// When `config.debug` is set the [`TracingObserver`] is installed.
	pub fn new(config: ExchangeConfig) -> Result<Self> {
		let http_client = ReqwestHttpClient::from_config(&config)?;
		let debug = config.debug;
		let exchanger =
			Self::with_http_client(config, http_client, Arc::new(ReqwestTransportErrorMapper));

		Ok(if debug { exchanger.with_observer(Arc::new(TracingObserver)) } else { exchanger })
	}
}
impl<C, M> Clone for Exchanger<C, M>
where
	C: ?Sized + UpstreamHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			observer: self.observer.clone(),
		}
	}
}
impl<C, M> Debug for Exchanger<C, M>
where
	C: ?Sized + UpstreamHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Exchanger").field("config", &self.config).finish()
	}
}

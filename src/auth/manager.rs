//! Access-token lifecycle: initial acquisition, proactive refresh, and the background tick.
//!
//! The manager is the single writer of the token the client sends. Request paths read it
//! through [`CredentialManager::current_token`], which loads an atomically published
//! snapshot and never waits on a refresh in progress. A refresh is attempted whenever the
//! source holds no token or the token has [`REFRESH_THRESHOLD`] or less left to live. A
//! failed refresh leaves the previous token in place; the next tick retries.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use arc_swap::ArcSwap;
use tokio::{runtime::Handle, task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{CredentialError, CredentialSource, TokenSecret},
	obs,
};

/// Remaining lifetime at or below which a token is refreshed.
pub const REFRESH_THRESHOLD: Duration = Duration::seconds(60);
/// Default period of the background refresh tick.
pub const DEFAULT_REFRESH_INTERVAL: StdDuration = StdDuration::from_secs(10);

/// What a single refresh check did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
	/// The current token is fresh enough; the source was not asked to refresh.
	Skipped,
	/// The source refreshed and the new token was published.
	Refreshed,
	/// The source failed to refresh; the previous token stays in use.
	Failed,
}

/// Owns the access token used by every outbound request.
pub struct CredentialManager {
	source: Arc<dyn CredentialSource>,
	token: ArcSwap<TokenSecret>,
	metrics: RefreshMetrics,
}
impl CredentialManager {
	/// Acquires the initial token, failing if the source cannot produce one.
	pub async fn initialize(source: Arc<dyn CredentialSource>) -> Result<Self> {
		let failure = if needs_refresh(source.access_token().as_ref(), source.expires_in()) {
			source.refresh().await.err()
		} else {
			None
		};

		if let Some(e) = &failure {
			obs::event!(error, error = %e, "Failed to fetch the initial access token.");
		}

		let token = source
			.access_token()
			.ok_or(Error::CredentialAcquisition { source: failure })?;

		Ok(Self { source, token: ArcSwap::from_pointee(token), metrics: RefreshMetrics::new() })
	}

	/// Returns the latest published token without blocking.
	pub fn current_token(&self) -> Arc<TokenSecret> {
		self.token.load_full()
	}

	/// Refresh counters for this manager.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Refreshes the token when it is absent or about to expire.
	///
	/// Failures are logged and reported as [`RefreshOutcome::Failed`]; they never clear the
	/// published token.
	pub async fn refresh_if_needed(&self) -> RefreshOutcome {
		let outcome = match self.try_refresh().await {
			Ok(outcome) => outcome,
			Err(e) => {
				let err = Error::CredentialRefresh(e);

				obs::event!(error, error = %err, cause = ?StdError::source(&err), "Failed to fetch access token.");

				RefreshOutcome::Failed
			},
		};

		self.publish();

		outcome
	}

	async fn try_refresh(&self) -> Result<RefreshOutcome, CredentialError> {
		let current = self.source.access_token();

		if !needs_refresh(current.as_ref(), self.source.expires_in()) {
			self.metrics.record_skip();

			return Ok(RefreshOutcome::Skipped);
		}

		self.metrics.record_attempt();

		match self.source.refresh().await {
			Ok(()) => {
				self.metrics.record_success();

				obs::event!(debug, expires_in = ?self.source.expires_in(), "Access token refreshed.");

				Ok(RefreshOutcome::Refreshed)
			},
			Err(e) => {
				self.metrics.record_failure();

				Err(e)
			},
		}
	}

	fn publish(&self) {
		if let Some(token) = self.source.access_token() {
			self.token.store(Arc::new(token));
		}
	}

	/// Spawns the periodic refresh task on `runtime`.
	///
	/// The first check runs one `period` after spawning. The task exits once `shutdown` is
	/// cancelled.
	pub(crate) fn spawn_refresh_task(
		self: &Arc<Self>,
		runtime: &Handle,
		period: StdDuration,
		shutdown: CancellationToken,
	) -> JoinHandle<()> {
		let manager = Arc::clone(self);

		runtime.spawn(async move {
			let mut ticker =
				tokio::time::interval_at(tokio::time::Instant::now() + period, period);

			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					_ = shutdown.cancelled() => break,
					_ = ticker.tick() => {
						manager.refresh_if_needed().await;
					},
				}
			}
		})
	}
}
impl Debug for CredentialManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialManager")
			.field("token", &self.token.load())
			.field("metrics", &self.metrics)
			.finish()
	}
}

fn needs_refresh(token: Option<&TokenSecret>, expires_in: Option<Duration>) -> bool {
	token.is_none() || expires_in.is_some_and(|remaining| remaining <= REFRESH_THRESHOLD)
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;

	/// Source whose token lifetime and refresh result are scripted by the test.
	struct ScriptedSource {
		token: RwLock<Option<TokenSecret>>,
		expires_in: RwLock<Option<Duration>>,
		fail: bool,
		refreshes: AtomicUsize,
	}
	impl ScriptedSource {
		fn new(token: Option<&str>, expires_in: Option<Duration>, fail: bool) -> Arc<Self> {
			Arc::new(Self {
				token: RwLock::new(token.map(TokenSecret::new)),
				expires_in: RwLock::new(expires_in),
				fail,
				refreshes: AtomicUsize::new(0),
			})
		}
	}
	impl CredentialSource for ScriptedSource {
		fn access_token(&self) -> Option<TokenSecret> {
			self.token.read().clone()
		}

		fn expires_in(&self) -> Option<Duration> {
			*self.expires_in.read()
		}

		fn refresh(&self) -> crate::auth::CredentialFuture<'_, ()> {
			Box::pin(async move {
				let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;

				if self.fail {
					return Err(CredentialError::Refresh { message: "scripted failure".into() });
				}

				*self.token.write() = Some(TokenSecret::new(format!("token-{n}")));
				*self.expires_in.write() = Some(Duration::hours(1));

				Ok(())
			})
		}
	}

	#[test]
	fn refresh_threshold_is_inclusive() {
		let token = TokenSecret::new("t");

		assert!(needs_refresh(None, None));
		assert!(needs_refresh(Some(&token), Some(Duration::seconds(60))));
		assert!(!needs_refresh(Some(&token), Some(Duration::seconds(61))));
		assert!(!needs_refresh(Some(&token), None));
	}

	#[tokio::test]
	async fn initialize_fetches_missing_token() {
		let source = ScriptedSource::new(None, None, false);
		let manager = CredentialManager::initialize(source.clone())
			.await
			.expect("Initial acquisition should succeed.");

		assert_eq!(manager.current_token().expose(), "token-1");
		assert_eq!(source.refreshes.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn initialize_fails_without_any_token() {
		let source = ScriptedSource::new(None, None, true);
		let err = CredentialManager::initialize(source)
			.await
			.expect_err("Acquisition must fail when no token can be obtained.");

		assert!(matches!(err, Error::CredentialAcquisition { source: Some(_) }));
	}

	#[tokio::test]
	async fn expiring_token_triggers_exactly_one_refresh() {
		let source = ScriptedSource::new(Some("old"), Some(Duration::hours(1)), false);
		let manager = CredentialManager::initialize(source.clone())
			.await
			.expect("Initial acquisition should succeed.");

		*source.expires_in.write() = Some(Duration::seconds(30));

		assert_eq!(manager.refresh_if_needed().await, RefreshOutcome::Refreshed);
		assert_eq!(source.refreshes.load(Ordering::SeqCst), 1);
		assert_eq!(manager.current_token().expose(), "token-1");
		assert_eq!(manager.metrics().attempts(), 1);
		assert_eq!(manager.metrics().skipped(), 0);
		assert!(manager.metrics().last_success().is_some());
	}

	#[tokio::test]
	async fn fresh_token_is_left_alone() {
		let source = ScriptedSource::new(Some("fresh"), Some(Duration::minutes(5)), false);
		let manager = CredentialManager::initialize(source.clone())
			.await
			.expect("Initial acquisition should succeed.");

		assert_eq!(manager.refresh_if_needed().await, RefreshOutcome::Skipped);
		assert_eq!(manager.refresh_if_needed().await, RefreshOutcome::Skipped);
		assert_eq!(source.refreshes.load(Ordering::SeqCst), 0);
		assert_eq!(manager.metrics().attempts(), 0);
		assert_eq!(manager.metrics().skipped(), 2);
		assert_eq!(manager.metrics().checks(), 2);
	}

	#[tokio::test]
	async fn failed_refresh_keeps_previous_token() {
		let source = ScriptedSource::new(Some("still-valid"), Some(Duration::seconds(45)), true);
		// Initialization tolerates the failed refresh because a token is already held.
		let manager = CredentialManager::initialize(source.clone())
			.await
			.expect("A held token should satisfy initialization.");

		assert_eq!(manager.refresh_if_needed().await, RefreshOutcome::Failed);
		assert_eq!(manager.current_token().expose(), "still-valid");
		assert_eq!(manager.metrics().failures(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn background_tick_refreshes_after_one_period() {
		let source = ScriptedSource::new(Some("old"), Some(Duration::seconds(10)), false);
		let manager = Arc::new(
			CredentialManager::initialize(source.clone())
				.await
				.expect("Initial acquisition should succeed."),
		);
		// Initialization already refreshed the near-expiry token once.
		let baseline = source.refreshes.load(Ordering::SeqCst);

		*source.expires_in.write() = Some(Duration::seconds(20));

		let shutdown = CancellationToken::new();
		let task = manager.spawn_refresh_task(
			&Handle::current(),
			StdDuration::from_secs(10),
			shutdown.clone(),
		);

		tokio::time::sleep(StdDuration::from_millis(9_900)).await;
		assert_eq!(source.refreshes.load(Ordering::SeqCst), baseline);

		tokio::time::sleep(StdDuration::from_millis(200)).await;
		assert_eq!(source.refreshes.load(Ordering::SeqCst), baseline + 1);

		shutdown.cancel();
		task.await.expect("Refresh task should exit cleanly after cancellation.");
	}
}

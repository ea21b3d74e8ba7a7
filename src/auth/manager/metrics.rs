// std
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
// self
use crate::_prelude::*;

/// Counters describing the background token refresh loop.
///
/// Every check lands in exactly one bucket: `skipped` when the held token was still fresh,
/// otherwise `attempts` followed by `successes` or `failures`.
#[derive(Debug)]
pub struct RefreshMetrics {
	skipped: AtomicU64,
	attempts: AtomicU64,
	successes: AtomicU64,
	failures: AtomicU64,
	// Unix seconds of the latest successful refresh; `i64::MIN` before the first one.
	last_success: AtomicI64,
}
impl RefreshMetrics {
	pub(crate) fn new() -> Self {
		Self {
			skipped: AtomicU64::new(0),
			attempts: AtomicU64::new(0),
			successes: AtomicU64::new(0),
			failures: AtomicU64::new(0),
			last_success: AtomicI64::new(i64::MIN),
		}
	}

	/// Checks that found the held token far enough from expiry.
	pub fn skipped(&self) -> u64 {
		self.skipped.load(Ordering::Relaxed)
	}

	/// Checks that called the credential source.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Refresh calls that produced a token.
	pub fn successes(&self) -> u64 {
		self.successes.load(Ordering::Relaxed)
	}

	/// Refresh calls the credential source rejected.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Checks run so far, whether or not they refreshed.
	pub fn checks(&self) -> u64 {
		self.skipped() + self.attempts()
	}

	/// When the latest successful refresh finished.
	pub fn last_success(&self) -> Option<OffsetDateTime> {
		match self.last_success.load(Ordering::Relaxed) {
			i64::MIN => None,
			ts => OffsetDateTime::from_unix_timestamp(ts).ok(),
		}
	}

	pub(crate) fn record_skip(&self) {
		self.skipped.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.successes.fetch_add(1, Ordering::Relaxed);
		self.last_success.store(OffsetDateTime::now_utc().unix_timestamp(), Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
impl Default for RefreshMetrics {
	fn default() -> Self {
		Self::new()
	}
}

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::_prelude::*;

/// Thread-safe counters for refresh coordination.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	queued: AtomicU64,
	last_success_at: Mutex<Option<OffsetDateTime>>,
}
impl RefreshMetrics {
	/// Returns the number of refresh calls issued to the backend.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh calls that yielded a stored token.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh calls that tore the session down.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns how many requests waited behind an in-flight refresh.
	pub fn queued(&self) -> u64 {
		self.queued.load(Ordering::Relaxed)
	}

	/// Returns the instant of the last successful refresh.
	pub fn last_success_at(&self) -> Option<OffsetDateTime> {
		*self.last_success_at.lock()
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
		*self.last_success_at.lock() = Some(OffsetDateTime::now_utc());
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_queued(&self) {
		self.queued.fetch_add(1, Ordering::Relaxed);
	}
}

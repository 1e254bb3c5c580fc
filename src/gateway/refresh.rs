//! Single-flight access-token refresh with a pending-request queue.
//!
//! The first request to observe a recoverable 401 becomes the *leader*: it flips the
//! refresh-in-flight flag and calls the refresh endpoint. Requests that hit a 401 while the flag
//! is set park a oneshot completion handle in the queue. When the refresh settles, the flag is
//! cleared and the whole queue is drained in one critical section, so every waiter observes the
//! same outcome. On success each waiter re-dispatches with the new token; on failure the leader
//! tears the session down (store keys removed once, navigator sent to the login entry point) and
//! every waiter is rejected with the shared refresh error.
//!
//! Every settled attempt bumps a generation counter and keeps its outcome. A request whose 401
//! arrives after an attempt it never joined has already settled takes that outcome over: it
//! retries with the current token after a success, or fails with the shared error after a
//! failure, so a late 401 never starts a second refresh or a second teardown.

mod metrics;

pub use metrics::RefreshMetrics;

// std
use std::mem;
// crates.io
use futures::channel::oneshot;
// self
use crate::{
	_prelude::*,
	auth::RefreshResponse,
	error::CodecError,
	gateway::{Gateway, interceptor},
	http::{ApiRequest, ApiResponse, HttpTransport, RequestOptions},
	obs::{self, Operation, OperationSpan, Outcome},
};

type RefreshOutcome = Result<(), Arc<Error>>;

#[derive(Debug, Default)]
struct RefreshState {
	in_flight: bool,
	generation: u64,
	last_outcome: Option<RefreshOutcome>,
	waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// Owner of the refresh-in-flight flag and the pending-request queue.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
	state: Mutex<RefreshState>,
}
impl RefreshCoordinator {
	/// Returns `true` while a refresh call is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.state.lock().in_flight
	}

	/// Returns the number of requests currently parked behind the in-flight refresh.
	pub fn queued(&self) -> usize {
		self.state.lock().waiters.len()
	}

	/// Returns the number of refresh attempts settled so far (abandoned attempts excluded).
	pub fn generation(&self) -> u64 {
		self.state.lock().generation
	}

	/// Joins the in-flight refresh, or claims leadership of a new one.
	///
	/// The flag check, the queue push, and the flag set all happen under one lock, so two
	/// callers can never both lead.
	pub(crate) fn join(&self, seen_generation: u64) -> RefreshTicket<'_> {
		let mut state = self.state.lock();

		if state.in_flight {
			let (tx, rx) = oneshot::channel();

			state.waiters.push(tx);

			return RefreshTicket::Wait(rx);
		}
		let stale = state.generation != seen_generation;

		if let Some(outcome) = state.last_outcome.clone().filter(|_| stale) {
			return RefreshTicket::Settled(outcome);
		}

		state.in_flight = true;

		RefreshTicket::Lead(RefreshLease { coordinator: self, settled: false })
	}

	/// Clears the flag and drains the queue in one critical section.
	///
	/// Abandoned attempts are not recorded, so a later 401 may lead a fresh one.
	fn settle(&self, outcome: RefreshOutcome, record: bool) -> usize {
		let waiters = {
			let mut state = self.state.lock();

			state.in_flight = false;

			if record {
				state.generation += 1;
				state.last_outcome = Some(outcome.clone());
			}

			mem::take(&mut state.waiters)
		};
		let released = waiters.len();

		for waiter in waiters {
			// Receivers dropped by cancelled callers are fine to skip.
			let _ = waiter.send(outcome.clone());
		}

		released
	}
}

/// Role assigned to a request that observed a recoverable 401.
pub(crate) enum RefreshTicket<'a> {
	/// This request issues the refresh call.
	Lead(RefreshLease<'a>),
	/// A refresh is in flight; await its outcome.
	Wait(oneshot::Receiver<RefreshOutcome>),
	/// An attempt settled after this request was dispatched; adopt its outcome.
	Settled(RefreshOutcome),
}

/// Leadership of one refresh attempt.
///
/// Dropping an unsettled lease (the leading task was cancelled) clears the flag and rejects the
/// queue with [`Error::RefreshAbandoned`].
pub(crate) struct RefreshLease<'a> {
	coordinator: &'a RefreshCoordinator,
	settled: bool,
}
impl RefreshLease<'_> {
	pub(crate) fn succeed(mut self) -> usize {
		self.settled = true;

		self.coordinator.settle(Ok(()), true)
	}

	pub(crate) fn fail(mut self, err: Arc<Error>) -> usize {
		self.settled = true;

		self.coordinator.settle(Err(err), true)
	}
}
impl Drop for RefreshLease<'_> {
	fn drop(&mut self) {
		if !self.settled {
			self.coordinator.settle(Err(Arc::new(Error::RefreshAbandoned)), false);
		}
	}
}

impl<T> Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Runs the recovery protocol for a request already marked retried.
	pub(crate) async fn recover(
		&self,
		mut request: ApiRequest,
		seen_generation: u64,
	) -> Result<ApiResponse> {
		let status = StatusCode::UNAUTHORIZED.as_u16();

		match self.refresh.join(seen_generation) {
			RefreshTicket::Lead(lease) => self
				.lead_refresh(lease)
				.await
				.map_err(|source| Error::SessionExpired { status, source })?,
			RefreshTicket::Wait(waiter) => {
				self.refresh_metrics.record_queued();

				waiter
					.await
					.unwrap_or_else(|_| Err(Arc::new(Error::RefreshAbandoned)))
					.map_err(|source| Error::SessionExpired { status, source })?
			},
			RefreshTicket::Settled(Ok(())) => obs::debug(
				Operation::Refresh,
				"Access token was renewed after dispatch; retrying without a refresh.",
			),
			RefreshTicket::Settled(Err(source)) => {
				obs::debug(
					Operation::Refresh,
					"Session was torn down after dispatch; not refreshing.",
				);

				return Err(Error::SessionExpired { status, source });
			},
		}

		let (response, _) = self.dispatch(&mut request).await?;

		interceptor::settle(&request, response)
	}

	async fn lead_refresh(&self, lease: RefreshLease<'_>) -> Result<(), Arc<Error>> {
		const OP: Operation = Operation::Refresh;

		let span = OperationSpan::new(OP, "lead_refresh");

		obs::record_operation(OP, Outcome::Attempt);
		self.refresh_metrics.record_attempt();

		match span.instrument(self.request_access_token()).await {
			Ok(()) => {
				lease.succeed();
				self.refresh_metrics.record_success();
				obs::record_operation(OP, Outcome::Success);

				Ok(())
			},
			Err(err) => {
				obs::warn(OP, "Access token refresh failed; tearing down the session.", &err);

				let err = Arc::new(err);

				if let Err(e) = self.clear_session().await {
					obs::warn(OP, "Session teardown failed.", &e);
				}
				lease.fail(err.clone());
				self.refresh_metrics.record_failure();
				self.navigator.navigate(&self.config.login_redirect);
				obs::record_operation(OP, Outcome::Failure);

				Err(err)
			},
		}
	}

	/// Calls the refresh endpoint and stores the returned access token.
	async fn request_access_token(&self) -> Result<()> {
		let mut request = self
			.build_request(
				Method::POST,
				&self.config.endpoints.refresh,
				None,
				&RequestOptions::default(),
			)?
			.with_timeout(self.config.refresh_timeout);
		let (response, _) = self.dispatch(&mut request).await?;
		let body: RefreshResponse = interceptor::settle(&request, response)?.json()?;

		if body.access_token.is_empty() {
			return Err(CodecError::EmptyAccessToken.into());
		}

		self.store
			.set(&self.config.storage_keys.access_token, body.access_token.into_inner())
			.await?;

		Ok(())
	}
}

//! Background credential refresher with bounded-time, idempotent shutdown.
//!
//! [`Refresher::spawn`] moves the refresher onto its own tokio task. The task alternates
//! between two states:
//!
//! - **Waiting**: the stored credential is outside its renewal window, so the task sleeps for at
//!   most [`RefreshPolicy::poll_interval`] and re-evaluates.
//! - **Renewing**: the credential is missing or within [`RefreshPolicy::renew_before`] of its
//!   expiry, so the task calls the [`CredentialSource`]. Failures are logged and retried after
//!   [`RefreshPolicy::retry_backoff`]; the task never gives up on its own.
//!
//! Every suspension point (poll sleep, backoff sleep, and the in-flight fetch) races the
//! cancellation signal owned by [`RefresherHandle`], so shutdown never waits on a timer.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use tokio::{
	sync::{oneshot, watch},
	time,
};
use tracing::{debug, error, info, warn};
// self
use crate::{
	_prelude::*,
	auth::Credential,
	error::TransientError,
	source::CredentialSource,
	store::CredentialStore,
};

/// Timing knobs for the refresher loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshPolicy {
	/// How long before expiry a credential becomes eligible for renewal.
	pub renew_before: Duration,
	/// Upper bound on a single sleep while waiting for the renewal window.
	pub poll_interval: StdDuration,
	/// Delay between a failed fetch and the next attempt.
	pub retry_backoff: StdDuration,
	/// Upper bound on a single fetch attempt.
	pub fetch_timeout: StdDuration,
	/// How long [`RefresherHandle::shutdown`] waits for the task to acknowledge.
	pub shutdown_timeout: StdDuration,
}
impl RefreshPolicy {
	const DEFAULT_FETCH_TIMEOUT: StdDuration = StdDuration::from_secs(10);
	const DEFAULT_POLL_INTERVAL: StdDuration = StdDuration::from_secs(5 * 60);
	const DEFAULT_RENEW_BEFORE: Duration = Duration::minutes(15);
	const DEFAULT_RETRY_BACKOFF: StdDuration = StdDuration::from_secs(15);
	const DEFAULT_SHUTDOWN_TIMEOUT: StdDuration = StdDuration::from_secs(2);

	/// Overrides the renewal window (defaults to 15 minutes). Negative windows clamp to zero.
	pub fn with_renew_before(mut self, window: Duration) -> Self {
		self.renew_before = if window.is_negative() { Duration::ZERO } else { window };

		self
	}

	/// Overrides the poll interval (defaults to 5 minutes).
	pub fn with_poll_interval(mut self, interval: StdDuration) -> Self {
		self.poll_interval = interval;

		self
	}

	/// Overrides the retry backoff (defaults to 15 seconds).
	pub fn with_retry_backoff(mut self, backoff: StdDuration) -> Self {
		self.retry_backoff = backoff;

		self
	}

	/// Overrides the per-attempt fetch timeout (defaults to 10 seconds).
	pub fn with_fetch_timeout(mut self, timeout: StdDuration) -> Self {
		self.fetch_timeout = timeout;

		self
	}

	/// Overrides the shutdown acknowledgement timeout (defaults to 2 seconds).
	pub fn with_shutdown_timeout(mut self, timeout: StdDuration) -> Self {
		self.shutdown_timeout = timeout;

		self
	}

	/// Returns how long to wait before the next check, or `None` when renewal is due now.
	///
	/// A missing or incomplete credential is treated as already expired.
	pub fn next_wait(
		&self,
		credential: Option<&Credential>,
		now: OffsetDateTime,
	) -> Option<StdDuration> {
		let credential = credential.filter(|credential| credential.is_ready())?;

		if credential.needs_renewal_at(now, self.renew_before) {
			return None;
		}

		let until_renewal = (credential.renew_at(self.renew_before) - now).unsigned_abs();

		Some(until_renewal.min(self.poll_interval))
	}
}
impl Default for RefreshPolicy {
	fn default() -> Self {
		Self {
			renew_before: Self::DEFAULT_RENEW_BEFORE,
			poll_interval: Self::DEFAULT_POLL_INTERVAL,
			retry_backoff: Self::DEFAULT_RETRY_BACKOFF,
			fetch_timeout: Self::DEFAULT_FETCH_TIMEOUT,
			shutdown_timeout: Self::DEFAULT_SHUTDOWN_TIMEOUT,
		}
	}
}

/// Keeps a [`CredentialStore`] populated from a [`CredentialSource`].
pub struct Refresher<S>
where
	S: ?Sized + CredentialSource,
{
	source: Arc<S>,
	store: Arc<CredentialStore>,
	policy: RefreshPolicy,
	metrics: Arc<RefreshMetrics>,
}
impl<S> Refresher<S>
where
	S: ?Sized + CredentialSource,
{
	/// Creates a refresher writing into `store` with the default [`RefreshPolicy`].
	pub fn new(source: impl Into<Arc<S>>, store: Arc<CredentialStore>) -> Self {
		Self {
			source: source.into(),
			store,
			policy: RefreshPolicy::default(),
			metrics: Default::default(),
		}
	}

	/// Replaces the timing policy.
	pub fn with_policy(mut self, policy: RefreshPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Shared counters describing fetch attempts.
	pub fn metrics(&self) -> Arc<RefreshMetrics> {
		Arc::clone(&self.metrics)
	}

	/// Starts the refresher on the current tokio runtime.
	pub fn spawn(self) -> RefresherHandle {
		let (cancel_tx, cancel_rx) = watch::channel(false);
		let (done_tx, done_rx) = oneshot::channel();
		let shutdown_timeout = self.policy.shutdown_timeout;

		tokio::spawn(self.run(cancel_rx, done_tx));

		RefresherHandle { cancel: Some(cancel_tx), done: Some(done_rx), shutdown_timeout }
	}

	async fn run(self, mut cancel: watch::Receiver<bool>, done: oneshot::Sender<()>) {
		info!("Credential refresher started.");

		loop {
			if *cancel.borrow() {
				break;
			}

			let current = self.store.get();

			if let Some(wait) = self.policy.next_wait(current.as_deref(), OffsetDateTime::now_utc())
			{
				debug!(?wait, "Registry credential is valid; waiting before the next check.");

				if !sleep_unless_cancelled(&mut cancel, wait).await {
					break;
				}

				continue;
			}

			info!("Fetching registry credential.");
			self.metrics.record_attempt();

			let attempt = tokio::select! {
				biased;
				_ = cancelled(&mut cancel) => break,
				attempt = self.fetch_bounded() => attempt,
			};

			match attempt {
				Ok(credential) => {
					info!(
						endpoint = %credential.endpoint,
						expires_at = %credential.expires_at,
						"Registry credential refreshed."
					);
					self.metrics.record_success();

					if self.policy.next_wait(Some(&credential), OffsetDateTime::now_utc()).is_none() {
						debug!(
							expires_at = %credential.expires_at,
							ready = credential.is_ready(),
							"Fetched registry credential is already due for renewal; fetching again."
						);
					}

					self.store.set(credential);
				},
				Err(e) => {
					self.metrics.record_failure();
					error!(
						error = %e,
						retry_in = ?self.policy.retry_backoff,
						"Failed to fetch registry credential."
					);

					if current.is_some() {
						warn!("Continuing to serve the previous registry credential.");
					}
					if !sleep_unless_cancelled(&mut cancel, self.policy.retry_backoff).await {
						break;
					}
				},
			}
		}

		info!("Credential refresher stopped.");

		let _ = done.send(());
	}

	async fn fetch_bounded(&self) -> Result<Credential> {
		let timeout = self.policy.fetch_timeout;

		time::timeout(timeout, self.source.fetch())
			.await
			.unwrap_or_else(|_| Err(TransientError::FetchTimeout { timeout }.into()))
	}
}
impl<S> Debug for Refresher<S>
where
	S: ?Sized + CredentialSource,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Refresher")
			.field("policy", &self.policy)
			.field("metrics", &self.metrics)
			.finish()
	}
}

/// Result of [`RefresherHandle::shutdown`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownOutcome {
	/// The task acknowledged the cancellation in time.
	Stopped,
	/// The acknowledgement did not arrive within the shutdown timeout.
	TimedOut,
	/// Shutdown had already been requested by an earlier call.
	AlreadyStopped,
}

/// Owner-side handle of a spawned [`Refresher`].
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown) also stops the task, but
/// without waiting for it.
#[derive(Debug)]
pub struct RefresherHandle {
	cancel: Option<watch::Sender<bool>>,
	done: Option<oneshot::Receiver<()>>,
	shutdown_timeout: StdDuration,
}
impl RefresherHandle {
	/// Signals the task to stop and waits up to the policy's shutdown timeout for it.
	///
	/// Later calls return [`ShutdownOutcome::AlreadyStopped`] without waiting.
	pub async fn shutdown(&mut self) -> ShutdownOutcome {
		let (Some(cancel), Some(done)) = (self.cancel.take(), self.done.take()) else {
			return ShutdownOutcome::AlreadyStopped;
		};
		let _ = cancel.send(true);

		match time::timeout(self.shutdown_timeout, done).await {
			Ok(_) => ShutdownOutcome::Stopped,
			Err(_) => {
				error!(
					timeout = ?self.shutdown_timeout,
					"Credential refresher did not stop in time; giving up."
				);

				ShutdownOutcome::TimedOut
			},
		}
	}
}

/// Resolves once cancellation is requested or the handle is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
	let _ = cancel.wait_for(|stop| *stop).await;
}

/// Sleeps for `wait`; returns `false` if cancellation won the race.
async fn sleep_unless_cancelled(cancel: &mut watch::Receiver<bool>, wait: StdDuration) -> bool {
	tokio::select! {
		biased;
		_ = cancelled(cancel) => false,
		_ = time::sleep(wait) => true,
	}
}

//! Observability helpers: tracing subscriber setup and optional metrics counters.
//!
//! # Feature Flags
//!
//! - Enable `metrics` to increment the `ecr_proxy_refresh_total` counter for every credential
//!   fetch attempt/success/failure, and `ecr_proxy_requests_total` for every proxied request
//!   labeled by response status.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each credential fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
	/// A fetch was started.
	Attempt,
	/// A fetch committed a new credential.
	Success,
	/// A fetch failed or timed out.
	Failure,
}
impl RefreshOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshOutcome::Attempt => "attempt",
			RefreshOutcome::Success => "success",
			RefreshOutcome::Failure => "failure",
		}
	}
}
impl Display for RefreshOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

// self
use crate::obs::RefreshOutcome;

/// Records a credential fetch outcome via the global metrics recorder (when enabled).
pub fn record_refresh_outcome(outcome: RefreshOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("ecr_proxy_refresh_total", "outcome" => outcome.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

/// Records a completed proxied request via the global metrics recorder (when enabled).
pub fn record_proxied_request(status: u16) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("ecr_proxy_requests_total", "status" => status.to_string()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = status;
	}
}

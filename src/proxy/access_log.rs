// std
use std::time::Instant;
// crates.io
use axum::http::{Method, StatusCode, Uri};
// self
use crate::obs;

/// Access-log record for one proxied request, emitted when dropped.
///
/// The record travels with the response body stream so the byte count and duration cover the
/// full transfer, including clients that disconnect mid-body.
#[derive(Debug)]
pub struct AccessLog {
	method: Method,
	url: String,
	client: Option<String>,
	status: Option<StatusCode>,
	bytes: u64,
	started: Instant,
}
impl AccessLog {
	/// Starts timing a request.
	pub fn start(method: &Method, uri: &Uri, client: Option<String>) -> Self {
		Self {
			method: method.clone(),
			url: uri.to_string(),
			client,
			status: None,
			bytes: 0,
			started: Instant::now(),
		}
	}

	/// Records the status sent to the client.
	pub fn set_status(&mut self, status: StatusCode) {
		self.status = Some(status);
	}

	/// Adds streamed body bytes to the total.
	pub fn record_bytes(&mut self, len: usize) {
		self.bytes = self.bytes.saturating_add(len as u64);
	}

	/// Bytes streamed so far.
	pub fn bytes(&self) -> u64 {
		self.bytes
	}
}
impl Drop for AccessLog {
	fn drop(&mut self) {
		let status = self.status.map(|status| status.as_u16());

		tracing::info!(
			method = %self.method,
			url = %self.url,
			client = self.client.as_deref(),
			status,
			bytes = self.bytes,
			duration_ms = self.started.elapsed().as_millis() as u64,
			"Proxied request."
		);

		if let Some(status) = status {
			obs::record_proxied_request(status);
		}
	}
}

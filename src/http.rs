//! Shared outbound HTTP client for registry traffic.

// std
use std::ops::Deref;
// crates.io
use reqwest::redirect::Policy;
// self
use crate::{_prelude::*, error::ConfigError};

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Registry redirects (blob downloads are typically redirected to pre-signed storage URLs)
/// must reach the client verbatim, so the wrapped client never follows them. Any custom
/// [`ReqwestClient`] passed to [`UpstreamClient::with_client`] must be configured the same
/// way. The client is cheap to clone and shared by every request handler.
#[derive(Clone, Debug)]
pub struct UpstreamClient(pub ReqwestClient);
impl UpstreamClient {
	/// Builds the default client: no redirect following, no response decompression.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
impl AsRef<ReqwestClient> for UpstreamClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for UpstreamClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

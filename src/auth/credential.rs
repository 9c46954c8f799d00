//! Immutable registry credential triple and its renewal schedule.

// self
use crate::{_prelude::*, auth::secret::TokenSecret};

/// Credential minted by the issuing service for one registry endpoint.
///
/// The three fields are only ever replaced together: the store swaps whole values, so a token
/// is never observed next to another credential's expiry or endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
	/// Pre-encoded basic-auth token; callers must avoid logging it.
	pub token: TokenSecret,
	/// Instant the token stops being accepted by the registry.
	pub expires_at: OffsetDateTime,
	/// Base URL of the registry the token belongs to, without a trailing slash.
	pub endpoint: String,
}
impl Credential {
	/// Creates a credential triple.
	pub fn new(
		token: impl Into<String>,
		expires_at: OffsetDateTime,
		endpoint: impl Into<String>,
	) -> Self {
		Self { token: TokenSecret::new(token), expires_at, endpoint: endpoint.into() }
	}

	/// Returns `true` when both the token and the endpoint are non-empty.
	pub fn is_ready(&self) -> bool {
		!self.token.is_empty() && !self.endpoint.is_empty()
	}

	/// Instant at which the refresher should start renewing this credential.
	pub fn renew_at(&self, renew_before: Duration) -> OffsetDateTime {
		self.expires_at.saturating_sub(renew_before)
	}

	/// Returns `true` if the credential is inside its renewal window at `now`.
	pub fn needs_renewal_at(&self, now: OffsetDateTime, renew_before: Duration) -> bool {
		now >= self.renew_at(renew_before)
	}

	/// Joins the endpoint with an origin-form request target (`/path?query`).
	pub fn upstream_target(&self, path_and_query: &str) -> String {
		let base = self.endpoint.trim_end_matches('/');

		if path_and_query.starts_with('/') {
			format!("{base}{path_and_query}")
		} else {
			format!("{base}/{path_and_query}")
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn credential(token: &str, endpoint: &str) -> Credential {
		Credential::new(token, macros::datetime!(2025-01-01 12:00 UTC), endpoint)
	}

	#[test]
	fn readiness_requires_token_and_endpoint() {
		assert!(credential("sometoken", "https://ecrendpoint").is_ready());
		assert!(!credential("", "https://ecrendpoint").is_ready());
		assert!(!credential("sometoken", "").is_ready());
		assert!(!credential("", "").is_ready());
	}

	#[test]
	fn renewal_window_opens_before_expiry() {
		let credential = credential("token", "https://ecrendpoint");
		let window = Duration::minutes(15);

		assert_eq!(credential.renew_at(window), macros::datetime!(2025-01-01 11:45 UTC));
		assert!(!credential.needs_renewal_at(macros::datetime!(2025-01-01 11:44:59 UTC), window));
		assert!(credential.needs_renewal_at(macros::datetime!(2025-01-01 11:45 UTC), window));
		assert!(credential.needs_renewal_at(macros::datetime!(2025-01-01 13:00 UTC), window));
	}

	#[test]
	fn upstream_target_joins_without_duplicate_slashes() {
		let plain = credential("token", "https://ecrendpoint");
		let trailing = credential("token", "https://ecrendpoint/");

		assert_eq!(
			plain.upstream_target("/v2/test/tags/list?last=abc"),
			"https://ecrendpoint/v2/test/tags/list?last=abc"
		);
		assert_eq!(trailing.upstream_target("/v2/"), "https://ecrendpoint/v2/");
		assert_eq!(plain.upstream_target("v2/"), "https://ecrendpoint/v2/");
	}

	#[test]
	fn debug_output_redacts_token() {
		let rendered = format!("{:?}", credential("super-secret", "https://ecrendpoint"));

		assert!(!rendered.contains("super-secret"));
		assert!(rendered.contains("<redacted>"));
	}
}

//! Single-writer, multi-reader snapshot cell holding the current registry credential.

// self
use crate::{_prelude::*, auth::Credential};

type Snapshot = Option<Arc<Credential>>;

/// Thread-safe holder for the latest committed [`Credential`].
///
/// Writers swap in a whole new `Arc`; readers clone the `Arc` under a read lock that is held
/// only for the clone, so a reader never waits on a refresh in flight and never observes a
/// partially updated triple.
#[derive(Debug, Default)]
pub struct CredentialStore(RwLock<Snapshot>);
impl CredentialStore {
	/// Creates an empty store (no credential fetched yet).
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a store seeded with `credential`.
	pub fn with_credential(credential: Credential) -> Self {
		Self(RwLock::new(Some(Arc::new(credential))))
	}

	/// Returns the most recently committed credential, if any.
	pub fn get(&self) -> Snapshot {
		self.0.read().clone()
	}

	/// Atomically replaces the stored credential.
	pub fn set(&self, credential: Credential) {
		let next = Arc::new(credential);

		*self.0.write() = Some(next);
	}

	/// Returns `true` once a credential with a non-empty token and endpoint is stored.
	pub fn is_ready(&self) -> bool {
		self.0.read().as_deref().is_some_and(Credential::is_ready)
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::thread;
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn credential(generation: u32) -> Credential {
		Credential::new(
			format!("token-{generation}"),
			macros::datetime!(2025-01-01 00:00 UTC) + Duration::hours(generation.into()),
			format!("https://registry-{generation}.example"),
		)
	}

	#[test]
	fn empty_store_is_not_ready() {
		let store = CredentialStore::new();

		assert!(store.get().is_none());
		assert!(!store.is_ready());
	}

	#[test]
	fn readiness_follows_credential_fields() {
		let cases = [
			("sometoken", "http://ecrendpoint", true),
			("", "http://ecrendpoint", false),
			("sometoken", "", false),
			("", "", false),
		];

		for (token, endpoint, ready) in cases {
			let store = CredentialStore::with_credential(Credential::new(
				token,
				OffsetDateTime::now_utc(),
				endpoint,
			));

			assert_eq!(store.is_ready(), ready, "Unexpected readiness for token {token:?}.");
		}
	}

	#[test]
	fn set_replaces_the_whole_snapshot() {
		let store = CredentialStore::new();

		store.set(credential(1));

		let first = store.get().expect("Store should hold the first credential.");

		store.set(credential(2));

		let second = store.get().expect("Store should hold the second credential.");

		assert_eq!(first.token.expose(), "token-1");
		assert_eq!(second.token.expose(), "token-2");
		assert_eq!(second.endpoint, "https://registry-2.example");
	}

	#[test]
	fn concurrent_readers_never_observe_torn_credentials() {
		let store = Arc::new(CredentialStore::with_credential(credential(0)));
		let readers = (0..4)
			.map(|_| {
				let store = Arc::clone(&store);

				thread::spawn(move || {
					for _ in 0..2_000 {
						let snapshot = store.get().expect("Store should never be emptied.");
						let generation = snapshot
							.token
							.expose()
							.trim_start_matches("token-")
							.parse::<u32>()
							.expect("Token fixture should carry its generation.");

						assert_eq!(snapshot.endpoint, format!("https://registry-{generation}.example"));
						assert_eq!(
							snapshot.expires_at,
							macros::datetime!(2025-01-01 00:00 UTC) + Duration::hours(generation.into())
						);
					}
				})
			})
			.collect::<Vec<_>>();

		for generation in 1..=500 {
			store.set(credential(generation));
		}
		for reader in readers {
			reader.join().expect("Reader thread should not panic.");
		}
	}
}

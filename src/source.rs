//! Issuing-service seam: anything that can mint a fresh [`Credential`].
//!
//! The refresher only depends on [`CredentialSource`], so tests substitute scripted sources
//! while the binary wires in [`EcrCredentialSource`] (behind the default `ecr` feature).

#[cfg(feature = "ecr")] pub mod ecr;

#[cfg(feature = "ecr")] pub use ecr::EcrCredentialSource;

// self
use crate::{_prelude::*, auth::Credential};

/// Boxed future returned by [`CredentialSource::fetch`].
pub type CredentialFuture<'a> = Pin<Box<dyn Future<Output = Result<Credential>> + 'a + Send>>;

/// Remote service able to issue registry credentials.
///
/// Implementations perform exactly one attempt per call. Timeouts, retries, and backoff belong
/// to the refresher, so a source should surface failures instead of retrying internally.
pub trait CredentialSource
where
	Self: 'static + Send + Sync,
{
	/// Requests a new credential triple from the issuing service.
	fn fetch(&self) -> CredentialFuture<'_>;
}
impl<S> CredentialSource for Arc<S>
where
	S: ?Sized + CredentialSource,
{
	fn fetch(&self) -> CredentialFuture<'_> {
		(**self).fetch()
	}
}

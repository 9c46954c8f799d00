//! Proxy-level error types shared by the refresher, the request handler, and startup wiring.

// crates.io
use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
};
// self
use crate::{_prelude::*, proxy::LinkHeaderError};

/// Proxy-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Startup configuration problem; the process cannot run.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary issuing-service failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS) while talking to the issuing service.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Failure scoped to a single proxied request.
	#[error(transparent)]
	Proxy(#[from] ProxyError),
}

/// Configuration and startup failures. Each of these is fatal for the process.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// The AWS configuration chain resolved no credentials provider.
	#[error("No AWS credentials provider is configured; check the environment or instance profile.")]
	MissingAwsCredentials,
	/// The AWS configuration chain resolved no region.
	#[error("No AWS region is configured; set AWS_REGION or a profile region.")]
	MissingAwsRegion,
	/// Listen host/port pair does not form a socket address.
	#[error("Listen address `{address}` is invalid.")]
	InvalidListenAddress {
		/// Offending `host:port` string.
		address: String,
		/// Underlying parsing failure.
		#[source]
		source: std::net::AddrParseError,
	},
	/// The listening socket could not be bound.
	#[error("Failed to bind listener on `{address}`.")]
	Bind {
		/// Address the listener attempted to bind.
		address: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// The HTTP server stopped with an IO failure.
	#[error("HTTP server terminated unexpectedly.")]
	Serve(#[source] std::io::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// The issuing service did not answer within the per-attempt timeout.
	#[error("Credential fetch did not complete within {timeout:?}.")]
	FetchTimeout {
		/// Timeout that elapsed.
		timeout: StdDuration,
	},
	/// The issuing service answered without any authorization data.
	#[error("Issuing service returned no authorization data.")]
	EmptyAuthorizationData,
	/// The issuing service omitted a field of the credential triple.
	#[error("Issuing service response is missing the {field} field.")]
	IncompleteCredential {
		/// Name of the missing field.
		field: &'static str,
	},
	/// The expiry timestamp could not be represented.
	#[error("Issuing service returned an out-of-range expiry timestamp.")]
	InvalidExpiry,
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying client reported a network failure.
	#[error("Network error occurred while calling the issuing service.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the issuing service.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}

/// Failures that abort a single proxied request.
///
/// Every variant renders as a bare `500 Internal Server Error`; the detail only reaches the
/// logs so nothing about the credential state leaks to clients.
#[derive(Debug, ThisError)]
pub enum ProxyError {
	/// No usable credential has been fetched yet.
	#[error("Registry credential is missing.")]
	MissingCredential,
	/// Endpoint plus request path did not form a valid URL.
	#[error("Upstream target `{target}` is not a valid URL.")]
	InvalidTarget {
		/// Concatenated target string.
		target: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The token cannot be carried in an HTTP header.
	#[error("Registry token contains characters that are not valid in a header.")]
	InvalidAuthorization,
	/// The outbound request failed before a response arrived.
	#[error("Upstream request failed.")]
	Upstream(#[source] ReqwestError),
	/// The upstream `Link` header could not be rewritten.
	#[error("Upstream Link header could not be rewritten.")]
	LinkHeader(#[from] LinkHeaderError),
}
impl IntoResponse for ProxyError {
	fn into_response(self) -> Response {
		StatusCode::INTERNAL_SERVER_ERROR.into_response()
	}
}

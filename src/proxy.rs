//! Reverse-proxy request handling.
//!
//! Every request that is not a probe endpoint is forwarded to the registry endpoint of the
//! current credential. The client's `Authorization` is replaced with the registry credential,
//! the request and response bodies are streamed, redirects reach the client verbatim, and
//! `Link` pagination headers are pointed back at the proxy's own origin.

mod access_log;
mod headers;
mod origin;

pub mod link;

pub use access_log::*;
pub use headers::*;
pub use link::{LinkHeaderError, PaginationLink, rewrite_link_header};
pub use origin::*;

// std
use std::net::SocketAddr;
// crates.io
use axum::{
	body::{Body, HttpBody},
	extract::{ConnectInfo, Request, State},
	http::{HeaderMap, request::Parts, uri::PathAndQuery},
	response::{IntoResponse, Response},
};
use futures::StreamExt;
// self
use crate::{_prelude::*, error::ProxyError, http::UpstreamClient, store::CredentialStore};

/// Shared state for the proxy handler.
#[derive(Clone, Debug)]
pub struct ProxyState {
	/// Credential published by the refresher.
	pub store: Arc<CredentialStore>,
	/// Outbound client; must not follow redirects.
	pub client: UpstreamClient,
	/// Whether forwarded headers shape the client-facing origin.
	pub trust_proxy_headers: bool,
}
impl ProxyState {
	/// Creates state that trusts forwarded headers.
	pub fn new(store: Arc<CredentialStore>, client: UpstreamClient) -> Self {
		Self { store, client, trust_proxy_headers: true }
	}

	/// Overrides whether forwarded headers are trusted.
	pub fn with_trust_proxy_headers(mut self, trust: bool) -> Self {
		self.trust_proxy_headers = trust;

		self
	}

	async fn forward(
		&self,
		parts: Parts,
		body: Body,
		origin: &InboundOrigin,
	) -> Result<(HeaderMap, reqwest::Response), ProxyError> {
		let credential = self
			.store
			.get()
			.filter(|credential| credential.is_ready())
			.ok_or(ProxyError::MissingCredential)?;
		let target = credential
			.upstream_target(parts.uri.path_and_query().map(PathAndQuery::as_str).unwrap_or("/"));
		let url = Url::parse(&target)
			.map_err(|source| ProxyError::InvalidTarget { target: target.clone(), source })?;
		let headers = outbound_request_headers(&parts.headers, &credential.token)?;

		tracing::debug!(method = %parts.method, %url, "Forwarding request upstream.");

		let mut outbound = self.client.request(parts.method, url).headers(headers);

		if body.size_hint().exact() != Some(0) {
			outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
		}

		let upstream = outbound.send().await.map_err(ProxyError::Upstream)?;
		let headers = client_response_headers(upstream.headers(), origin)?;

		Ok((headers, upstream))
	}
}

/// Forwards one inbound request to the registry and streams the answer back.
///
/// Any failure before the upstream status is known answers a bare `500`; the reason is only
/// logged.
pub async fn proxy_request(State(state): State<ProxyState>, request: Request) -> Response {
	let (parts, body) = request.into_parts();
	let peer = parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(peer)| *peer);
	let origin = InboundOrigin::resolve(&parts.uri, &parts.headers, peer, state.trust_proxy_headers);
	let mut access = AccessLog::start(&parts.method, &parts.uri, origin.client.clone());

	match state.forward(parts, body, &origin).await {
		Ok((headers, upstream)) => {
			let status = upstream.status();

			access.set_status(status);

			let stream = upstream.bytes_stream().map(move |chunk| {
				match &chunk {
					Ok(bytes) => access.record_bytes(bytes.len()),
					Err(e) => tracing::warn!(error = %e, "Upstream body stream failed."),
				}

				chunk
			});
			let mut response = Response::new(Body::from_stream(stream));

			*response.status_mut() = status;
			*response.headers_mut() = headers;

			response
		},
		Err(e) => {
			tracing::error!(error = %e, source = ?StdError::source(&e), "Failed to proxy request.");

			let response = e.into_response();

			access.set_status(response.status());

			response
		},
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use axum::http::{Method, StatusCode};
	// self
	use super::*;
	use crate::auth::Credential;

	fn state(store: CredentialStore) -> ProxyState {
		let client = UpstreamClient::new().expect("Default upstream client should build.");

		ProxyState::new(Arc::new(store), client)
	}

	fn request(uri: &str) -> Request {
		axum::http::Request::builder()
			.method(Method::GET)
			.uri(uri)
			.header("host", "localhost:8080")
			.body(Body::empty())
			.expect("Request fixture should build.")
	}

	#[tokio::test]
	async fn empty_store_answers_server_error() {
		let response = proxy_request(State(state(CredentialStore::new())), request("/v2/")).await;

		assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	}

	#[tokio::test]
	async fn unready_credentials_are_not_used() {
		let store = CredentialStore::with_credential(Credential::new(
			"",
			OffsetDateTime::now_utc() + Duration::hours(12),
			"http://127.0.0.1:9",
		));
		let response = proxy_request(State(state(store)), request("/v2/")).await;

		assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	}

	#[tokio::test]
	async fn invalid_targets_answer_server_error() {
		let store = CredentialStore::with_credential(Credential::new(
			"token",
			OffsetDateTime::now_utc() + Duration::hours(12),
			"not a url",
		));
		let response = proxy_request(State(state(store)), request("/v2/")).await;

		assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	}

	#[test]
	fn trust_toggle_is_applied() {
		assert!(state(CredentialStore::new()).trust_proxy_headers);
		assert!(!state(CredentialStore::new()).with_trust_proxy_headers(false).trust_proxy_headers);
	}
}

//! Header translation between the client connection and the registry connection.

// crates.io
use axum::http::{
	HeaderMap, HeaderName, HeaderValue,
	header::{
		AUTHORIZATION, CONNECTION, HOST, LINK, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, TE,
		TRAILER, TRANSFER_ENCODING, UPGRADE,
	},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::ProxyError,
	proxy::{InboundOrigin, LinkHeaderError, link},
};

/// Builds the outbound request headers for the registry.
///
/// Every inbound header is copied except the client's `Authorization`, `Host` (derived from the
/// target URL), and hop-by-hop headers. `Authorization: Basic <token>` is always set; the token
/// is already the encoded basic-auth credential and is sent unchanged.
pub fn outbound_request_headers(
	inbound: &HeaderMap,
	token: &TokenSecret,
) -> Result<HeaderMap, ProxyError> {
	let scoped = connection_scoped(inbound);
	let mut outbound = HeaderMap::with_capacity(inbound.len() + 1);

	for (name, value) in inbound {
		if *name == AUTHORIZATION || *name == HOST || is_hop_by_hop(name, &scoped) {
			continue;
		}

		outbound.append(name.clone(), value.clone());
	}

	let mut authorization = HeaderValue::from_str(&format!("Basic {}", token.expose()))
		.map_err(|_| ProxyError::InvalidAuthorization)?;

	authorization.set_sensitive(true);
	outbound.insert(AUTHORIZATION, authorization);

	Ok(outbound)
}

/// Builds the response headers for the client from the registry's response headers.
///
/// Every value is copied except hop-by-hop headers; each `Link` value is rewritten onto the
/// client-facing origin so pagination keeps going through the proxy.
pub fn client_response_headers(
	upstream: &HeaderMap,
	origin: &InboundOrigin,
) -> Result<HeaderMap, ProxyError> {
	let scoped = connection_scoped(upstream);
	let mut headers = HeaderMap::with_capacity(upstream.len());

	for (name, value) in upstream {
		if is_hop_by_hop(name, &scoped) {
			continue;
		}
		if *name == LINK {
			headers.append(LINK, rewrite_link_value(value, origin)?);

			continue;
		}

		headers.append(name.clone(), value.clone());
	}

	Ok(headers)
}

fn rewrite_link_value(
	value: &HeaderValue,
	origin: &InboundOrigin,
) -> Result<HeaderValue, LinkHeaderError> {
	let raw = value.to_str().map_err(|_| LinkHeaderError::NotText)?;
	let rewritten = link::rewrite_link_header(&origin.scheme, &origin.host, raw)?;

	HeaderValue::from_str(&rewritten).map_err(|_| LinkHeaderError::NotText)
}

/// Header names listed in the `Connection` header, which only apply to that hop.
fn connection_scoped(headers: &HeaderMap) -> Vec<HeaderName> {
	headers
		.get_all(CONNECTION)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(|value| value.split(','))
		.filter_map(|name| HeaderName::from_str(name.trim()).ok())
		.collect()
}

fn is_hop_by_hop(name: &HeaderName, connection_scoped: &[HeaderName]) -> bool {
	*name == CONNECTION
		|| *name == PROXY_AUTHENTICATE
		|| *name == PROXY_AUTHORIZATION
		|| *name == TE
		|| *name == TRAILER
		|| *name == TRANSFER_ENCODING
		|| *name == UPGRADE
		|| name.as_str() == "keep-alive"
		|| connection_scoped.contains(name)
}

//! Client-facing origin resolution for inbound requests.

// std
use std::net::SocketAddr;
// crates.io
use axum::http::{
	HeaderMap, Uri,
	header::{FORWARDED, HOST},
};

/// Scheme and host the client used to reach the proxy, plus the client address for logging.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InboundOrigin {
	/// Request scheme; empty when the client did not say (origin-form request lines).
	pub scheme: String,
	/// `host[:port]` the client addressed.
	pub host: String,
	/// Best-known client address.
	pub client: Option<String>,
}
impl InboundOrigin {
	/// Derives the origin from the request URI and headers.
	///
	/// With `trust_proxy_headers`, `X-Forwarded-Proto`/`X-Forwarded-Scheme`, `X-Forwarded-Host`,
	/// `X-Forwarded-For`/`X-Real-IP` and the RFC 7239 `Forwarded` header override what the
	/// connection itself reports. Only the first entry of comma-separated lists counts.
	pub fn resolve(
		uri: &Uri,
		headers: &HeaderMap,
		peer: Option<SocketAddr>,
		trust_proxy_headers: bool,
	) -> Self {
		let mut origin = Self {
			scheme: uri.scheme_str().unwrap_or_default().to_owned(),
			host: header_text(headers, HOST.as_str())
				.map(str::to_owned)
				.or_else(|| uri.authority().map(|authority| authority.as_str().to_owned()))
				.unwrap_or_default(),
			client: peer.map(|peer| peer.ip().to_string()),
		};

		if trust_proxy_headers {
			origin.apply_forwarded_headers(headers);
		}

		origin
	}

	fn apply_forwarded_headers(&mut self, headers: &HeaderMap) {
		let forwarded = header_text(headers, FORWARDED.as_str())
			.and_then(|value| value.split(',').next())
			.map(ForwardedElement::parse)
			.unwrap_or_default();

		if let Some(scheme) = first_entry(headers, "x-forwarded-proto")
			.or_else(|| first_entry(headers, "x-forwarded-scheme"))
			.or(forwarded.proto)
		{
			self.scheme = scheme.to_ascii_lowercase();
		}
		if let Some(host) = first_entry(headers, "x-forwarded-host").or(forwarded.host) {
			self.host = host.to_owned();
		}
		if let Some(client) = first_entry(headers, "x-forwarded-for")
			.or_else(|| first_entry(headers, "x-real-ip"))
			.or(forwarded.r#for)
		{
			self.client = Some(client.to_owned());
		}
	}
}

/// Parameters of one `Forwarded` element.
#[derive(Debug, Default)]
struct ForwardedElement<'a> {
	proto: Option<&'a str>,
	host: Option<&'a str>,
	r#for: Option<&'a str>,
}
impl<'a> ForwardedElement<'a> {
	fn parse(element: &'a str) -> Self {
		let mut parsed = Self::default();

		for pair in element.split(';') {
			let Some((name, value)) = pair.split_once('=') else {
				continue;
			};
			let value = value.trim().trim_matches('"');

			if value.is_empty() {
				continue;
			}

			match name.trim().to_ascii_lowercase().as_str() {
				"proto" => parsed.proto = Some(value),
				"host" => parsed.host = Some(value),
				"for" => parsed.r#for = Some(value),
				_ => {},
			}
		}

		parsed
	}
}

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers.get(name).and_then(|value| value.to_str().ok())
}

fn first_entry<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	header_text(headers, name)
		.and_then(|value| value.split(',').next())
		.map(str::trim)
		.filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
	// crates.io
	use axum::http::HeaderValue;
	// self
	use super::*;

	fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
		let mut headers = HeaderMap::new();

		for (name, value) in pairs {
			headers.append(*name, HeaderValue::from_static(value));
		}

		headers
	}

	fn peer() -> Option<SocketAddr> {
		Some("10.0.0.7:51234".parse().expect("Peer fixture should parse."))
	}

	#[test]
	fn origin_form_requests_use_host_header_and_empty_scheme() {
		let uri = Uri::from_static("/v2/_catalog");
		let origin = InboundOrigin::resolve(&uri, &headers(&[("host", "localhost:8080")]), peer(), true);

		assert_eq!(origin.scheme, "");
		assert_eq!(origin.host, "localhost:8080");
		assert_eq!(origin.client.as_deref(), Some("10.0.0.7"));
	}

	#[test]
	fn absolute_form_requests_carry_scheme_and_authority() {
		let uri = Uri::from_static("https://proxy.example:8443/v2/");
		let origin = InboundOrigin::resolve(&uri, &HeaderMap::new(), None, false);

		assert_eq!(origin.scheme, "https");
		assert_eq!(origin.host, "proxy.example:8443");
		assert_eq!(origin.client, None);
	}

	#[test]
	fn forwarded_headers_override_when_trusted() {
		let uri = Uri::from_static("/v2/");
		let inbound = headers(&[
			("host", "internal:8080"),
			("x-forwarded-proto", "HTTPS, http"),
			("x-forwarded-host", "registry.example.com, internal"),
			("x-forwarded-for", "203.0.113.9, 10.0.0.1"),
		]);
		let trusted = InboundOrigin::resolve(&uri, &inbound, peer(), true);

		assert_eq!(trusted.scheme, "https");
		assert_eq!(trusted.host, "registry.example.com");
		assert_eq!(trusted.client.as_deref(), Some("203.0.113.9"));

		let ignored = InboundOrigin::resolve(&uri, &inbound, peer(), false);

		assert_eq!(ignored.scheme, "");
		assert_eq!(ignored.host, "internal:8080");
		assert_eq!(ignored.client.as_deref(), Some("10.0.0.7"));
	}

	#[test]
	fn rfc7239_forwarded_is_a_fallback() {
		let uri = Uri::from_static("/v2/");
		let inbound = headers(&[
			("host", "internal:8080"),
			("forwarded", "for=192.0.2.60;proto=https;host=\"mirror.example\", for=10.0.0.1"),
			("x-real-ip", "198.51.100.4"),
		]);
		let origin = InboundOrigin::resolve(&uri, &inbound, peer(), true);

		assert_eq!(origin.scheme, "https");
		assert_eq!(origin.host, "mirror.example");
		assert_eq!(origin.client.as_deref(), Some("198.51.100.4"));
	}
}

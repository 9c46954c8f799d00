//! `Link` header parsing and retargeting.
//!
//! Registries page tag and catalog listings with `Link: <URI>; rel="next"`. The URI points at the
//! upstream host, so before the header is handed to a client it is re-encoded with the proxy's
//! own scheme and host while the path and raw query are kept as-is.

// self
use crate::_prelude::*;

const RELATIVE_BASE: &str = "http://relative.invalid/";

/// Errors produced while parsing or rewriting a `Link` header.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum LinkHeaderError {
	/// The header value contains bytes that are not visible ASCII.
	#[error("Link header value is not valid text.")]
	NotText,
	/// An entry does not start with `<URI>`.
	#[error("Link entry `{entry}` does not start with a `<URI>` target.")]
	MissingTarget {
		/// Offending entry.
		entry: String,
	},
	/// An entry opens `<` without the matching `>`.
	#[error("Link entry `{entry}` has an unterminated `<URI>` target.")]
	UnterminatedTarget {
		/// Offending entry.
		entry: String,
	},
	/// The target between `<` and `>` is not a URI.
	#[error("Link target `{uri}` is not a valid URI.")]
	InvalidTarget {
		/// Offending URI text.
		uri: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A parameter is not of the form `key=value` / `key="value"`.
	#[error("Link parameter `{param}` is malformed.")]
	MalformedParam {
		/// Offending parameter text.
		param: String,
	},
}

/// One entry of a `Link` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaginationLink {
	/// Target URI exactly as it appeared between `<` and `>`.
	pub target: String,
	/// Value of the `rel` parameter, if present.
	pub rel: Option<String>,
	/// Remaining parameters in their original order.
	pub params: Vec<(String, String)>,
}
impl PaginationLink {
	/// Parses every entry of a raw `Link` header value, preserving entry order.
	///
	/// An empty (or whitespace-only) value yields no entries. Any malformed entry fails the
	/// whole header.
	pub fn parse_header(value: &str) -> Result<Vec<Self>, LinkHeaderError> {
		split_outside_quotes(value, ',', true)?
			.into_iter()
			.filter(|entry| !entry.trim().is_empty())
			.map(Self::parse_entry)
			.collect()
	}

	fn parse_entry(entry: &str) -> Result<Self, LinkHeaderError> {
		let entry = entry.trim();
		let rest = entry
			.strip_prefix('<')
			.ok_or_else(|| LinkHeaderError::MissingTarget { entry: entry.to_owned() })?;
		let (uri, rest) = rest
			.split_once('>')
			.ok_or_else(|| LinkHeaderError::UnterminatedTarget { entry: entry.to_owned() })?;
		let target = validate_target(uri.trim())?;
		let mut pieces = split_outside_quotes(rest, ';', false)?.into_iter();
		let mut rel = None;
		let mut params = Vec::new();

		// Anything between `>` and the first `;` is garbage.
		if let Some(leading) = pieces.next()
			&& !leading.trim().is_empty()
		{
			return Err(LinkHeaderError::MalformedParam { param: leading.trim().to_owned() });
		}

		for piece in pieces {
			let piece = piece.trim();

			if piece.is_empty() {
				continue;
			}

			let (key, value) = parse_param(piece)?;

			if rel.is_none() && key.eq_ignore_ascii_case("rel") {
				rel = Some(value);
			} else {
				params.push((key, value));
			}
		}

		Ok(Self { target, rel, params })
	}

	/// Raw path of the target, without scheme, authority, query or fragment.
	pub fn path(&self) -> &str {
		let (path, _) = split_query(strip_origin(&self.target));

		path
	}

	/// Raw query of the target, without the leading `?`.
	pub fn query(&self) -> Option<&str> {
		let (_, query) = split_query(strip_origin(&self.target));

		query
	}

	/// Builds the target URI re-homed onto `scheme://host`, keeping path and query byte-for-byte.
	///
	/// An empty `scheme` defaults to `http`.
	pub fn retarget(&self, scheme: &str, host: &str) -> String {
		let scheme = if scheme.is_empty() { "http" } else { scheme };
		let path = self.path();
		let mut uri = format!("{scheme}://{host}");

		if !path.starts_with('/') {
			uri.push('/');
		}

		uri.push_str(path);

		if let Some(query) = self.query().filter(|query| !query.is_empty()) {
			uri.push('?');
			uri.push_str(query);
		}

		uri
	}

	/// Renders the entry with `uri` in place of the original target.
	pub fn render_with_target(&self, uri: &str) -> String {
		let mut rendered = format!("<{uri}>");

		if let Some(rel) = &self.rel {
			push_param(&mut rendered, "rel", rel);
		}
		for (key, value) in &self.params {
			push_param(&mut rendered, key, value);
		}

		rendered
	}
}

/// Rewrites every entry of a `Link` header value onto `scheme://host`.
///
/// Entries are joined with `, ` in their original order; `rel` is rendered first, followed by
/// the remaining parameters in their original order.
pub fn rewrite_link_header(
	scheme: &str,
	host: &str,
	header: &str,
) -> Result<String, LinkHeaderError> {
	let rewritten = PaginationLink::parse_header(header)?
		.iter()
		.map(|link| link.render_with_target(&link.retarget(scheme, host)))
		.collect::<Vec<_>>();

	Ok(rewritten.join(", "))
}

/// Checks that `uri` is an absolute or relative URI reference and returns it untouched.
///
/// The normalized `Url` is discarded; callers slice path and query from the raw text.
fn validate_target(uri: &str) -> Result<String, LinkHeaderError> {
	match Url::parse(uri) {
		Err(url::ParseError::RelativeUrlWithoutBase) =>
			Url::parse(RELATIVE_BASE).and_then(|base| base.join(uri)),
		other => other,
	}
	.map_err(|source| LinkHeaderError::InvalidTarget { uri: uri.to_owned(), source })?;

	Ok(uri.to_owned())
}

/// Drops the fragment, scheme and authority of a URI reference, leaving `path[?query]`.
fn strip_origin(uri: &str) -> &str {
	let uri = uri.split_once('#').map_or(uri, |(rest, _)| rest);
	let uri = match uri.split_once(':') {
		Some((scheme, rest)) if is_scheme(scheme) => rest,
		_ => uri,
	};

	match uri.strip_prefix("//") {
		Some(authority_and_rest) => authority_and_rest
			.find(['/', '?'])
			.map_or("", |idx| &authority_and_rest[idx..]),
		None => uri,
	}
}

fn split_query(path_and_query: &str) -> (&str, Option<&str>) {
	match path_and_query.split_once('?') {
		Some((path, query)) => (path, Some(query)),
		None => (path_and_query, None),
	}
}

fn is_scheme(candidate: &str) -> bool {
	let mut chars = candidate.chars();

	chars.next().is_some_and(|c| c.is_ascii_alphabetic())
		&& chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn parse_param(piece: &str) -> Result<(String, String), LinkHeaderError> {
	let malformed = || LinkHeaderError::MalformedParam { param: piece.to_owned() };
	let (key, value) = piece.split_once('=').ok_or_else(malformed)?;
	let key = key.trim();
	let value = value.trim();

	if key.is_empty() {
		return Err(malformed());
	}

	let value = match value.strip_prefix('"') {
		Some(quoted) => unquote(quoted.strip_suffix('"').ok_or_else(malformed)?),
		None => value.to_owned(),
	};

	Ok((key.to_owned(), value))
}

fn unquote(inner: &str) -> String {
	let mut value = String::with_capacity(inner.len());
	let mut chars = inner.chars();

	while let Some(c) = chars.next() {
		if c == '\\' {
			if let Some(escaped) = chars.next() {
				value.push(escaped);
			}
		} else {
			value.push(c);
		}
	}

	value
}

fn push_param(rendered: &mut String, key: &str, value: &str) {
	rendered.push_str("; ");
	rendered.push_str(key);
	rendered.push_str("=\"");

	for c in value.chars() {
		if matches!(c, '"' | '\\') {
			rendered.push('\\');
		}

		rendered.push(c);
	}

	rendered.push('"');
}

/// Splits on `delimiter` outside quoted strings (and, when `angles` is set, outside `<...>`).
fn split_outside_quotes(
	value: &str,
	delimiter: char,
	angles: bool,
) -> Result<Vec<&str>, LinkHeaderError> {
	let mut parts = Vec::new();
	let mut start = 0;
	let mut in_quotes = false;
	let mut in_angles = false;
	let mut escaped = false;

	for (idx, c) in value.char_indices() {
		if in_quotes {
			match (escaped, c) {
				(true, _) => escaped = false,
				(false, '\\') => escaped = true,
				(false, '"') => in_quotes = false,
				_ => {},
			}

			continue;
		}

		match c {
			'"' if !in_angles => in_quotes = true,
			'<' if angles => in_angles = true,
			'>' if angles => in_angles = false,
			c if c == delimiter && !in_angles => {
				parts.push(&value[start..idx]);
				start = idx + c.len_utf8();
			},
			_ => {},
		}
	}

	if in_quotes {
		return Err(LinkHeaderError::MalformedParam { param: value[start..].trim().to_owned() });
	}
	if in_angles {
		return Err(LinkHeaderError::UnterminatedTarget { entry: value[start..].trim().to_owned() });
	}

	parts.push(&value[start..]);

	Ok(parts)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const ECR_NEXT: &str = "<https://000000000000.dkr.ecr.eu-west-2.amazonaws.com/v2/test/tags/list?last=somekey>; rel=\"next\"";

	#[test]
	fn rewrites_registry_pagination_link() {
		let rewritten = rewrite_link_header("http", "localhost:8080", ECR_NEXT)
			.expect("Registry pagination link should rewrite.");

		assert_eq!(rewritten, "<http://localhost:8080/v2/test/tags/list?last=somekey>; rel=\"next\"");
	}

	#[test]
	fn empty_scheme_defaults_to_http() {
		let rewritten = rewrite_link_header(
			"",
			"localhost:8080",
			"<https://registry.example/v2/test/tags/list?last=abc>; rel=\"next\"",
		)
		.expect("Link header should rewrite with the default scheme.");

		assert_eq!(rewritten, "<http://localhost:8080/v2/test/tags/list?last=abc>; rel=\"next\"");
	}

	#[test]
	fn retargeting_replaces_origin_and_keeps_path_and_query() {
		let path_and_queries = [
			"/v2/a/b/tags/list?last=N8jylEwUlHaW6oTKiejfZD%2FAsrOJ0PVfMZA2Me%2F29xo93MTx2AYZCQtZKvYC%2BOMSX%3D&n=100",
			"/v2/x/tags/list?last='abc'",
			"/v2/a/../b/./tags/list?n=1",
			"/v2/x/tags/list?last=a b",
			"/v2/x/tags/list?last={a}|\"b\"",
			"/v2/%7Bx%7D/tags/list?last=%41&empty=&flag",
			"/v2/x:y/tags/list?last=a?b",
		];

		for path_and_query in path_and_queries {
			let inputs = [
				format!("<https://000000000000.dkr.ecr.eu-west-2.amazonaws.com{path_and_query}>"),
				format!("<http://127.0.0.1:5000{path_and_query}#fragment>"),
				format!("<{path_and_query}>"),
			];

			for (scheme, host) in [("https", "proxy.internal"), ("http", "localhost:8080")] {
				for input in &inputs {
					let rewritten = rewrite_link_header(scheme, host, input)
						.expect("Fixture link should rewrite.");

					assert_eq!(
						rewritten,
						format!("<{scheme}://{host}{path_and_query}>"),
						"Path and query of {input:?} should survive unchanged."
					);
				}
			}
		}
	}

	#[test]
	fn multiple_entries_keep_entry_and_parameter_order() {
		let header = concat!(
			"<https://registry.example/v2/_catalog?last=b&n=2>; rel=\"next\"; title=\"Next page\"; type=\"application/json\", ",
			"<https://registry.example/v2/_catalog?n=2>; anchor=\"#top\"; rel=first, ",
			"<https://registry.example/v2/_catalog>"
		);
		let rewritten =
			rewrite_link_header("https", "proxy:443", header).expect("Catalog links should rewrite.");

		assert_eq!(
			rewritten,
			concat!(
				"<https://proxy:443/v2/_catalog?last=b&n=2>; rel=\"next\"; title=\"Next page\"; type=\"application/json\", ",
				"<https://proxy:443/v2/_catalog?n=2>; rel=\"first\"; anchor=\"#top\", ",
				"<https://proxy:443/v2/_catalog>"
			)
		);
	}

	#[test]
	fn delimiters_inside_targets_and_quotes_do_not_split() {
		let header = "<https://registry.example/v2/x/tags/list?last=a,b;c>; rel=\"next\"; title=\"a, b; c\"";
		let links =
			PaginationLink::parse_header(header).expect("Quoted delimiters should be tolerated.");

		assert_eq!(links.len(), 1);
		assert_eq!(links[0].path(), "/v2/x/tags/list");
		assert_eq!(links[0].query(), Some("last=a,b;c"));
		assert_eq!(links[0].rel.as_deref(), Some("next"));
		assert_eq!(links[0].params, vec![("title".to_owned(), "a, b; c".to_owned())]);
	}

	#[test]
	fn empty_header_rewrites_to_empty() {
		assert_eq!(rewrite_link_header("http", "localhost", "").as_deref(), Ok(""));
		assert_eq!(rewrite_link_header("http", "localhost", "  ").as_deref(), Ok(""));
	}

	#[test]
	fn malformed_entries_fail_the_whole_header() {
		let cases = [
			"https://registry.example/v2/_catalog; rel=\"next\"",
			"<https://registry.example/v2/_catalog; rel=\"next\"",
			"<http://[::1/v2/_catalog>; rel=\"next\"",
			"<https://registry.example/v2/_catalog>; rel",
			"<https://registry.example/v2/_catalog> junk; rel=\"next\"",
			"<https://registry.example/v2/_catalog>; rel=\"next",
			"<https://registry.example/ok>; rel=\"next\", garbage",
		];

		for header in cases {
			assert!(
				rewrite_link_header("http", "localhost", header).is_err(),
				"Header {header:?} should be rejected."
			);
		}
	}

	#[test]
	fn invalid_targets_report_the_uri() {
		let err = rewrite_link_header("http", "localhost", "<http://[::1/x>; rel=\"next\"")
			.expect_err("Invalid IPv6 target should fail.");

		assert!(matches!(err, LinkHeaderError::InvalidTarget { ref uri, .. } if uri == "http://[::1/x"));
	}
}

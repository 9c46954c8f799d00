//! Process configuration resolved from CLI flags with environment-variable fallbacks.

// std
use std::net::SocketAddr;
// crates.io
use clap::{Parser, ValueEnum};
use tracing_subscriber::filter::LevelFilter;
// self
use crate::{_prelude::*, error::ConfigError};

/// Runtime configuration for the proxy binary.
#[derive(Clone, Debug, Parser)]
#[command(name = "ecr-proxy", version, about)]
pub struct Config {
	/// Interface the HTTP listener binds to.
	#[arg(long, env = "LISTEN_HOST", default_value = "0.0.0.0")]
	pub listen_host: String,
	/// Port the HTTP listener binds to.
	#[arg(long, env = "LISTEN_PORT", default_value_t = 8080)]
	pub listen_port: u16,
	/// Log verbosity: one of INFO, DEBUG, WARN, ERROR. Unknown values fall back to INFO.
	#[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
	pub log_level: String,
	/// Log line encoding.
	#[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
	pub log_format: LogFormat,
	/// Ignore `X-Forwarded-*` / `Forwarded` headers when deriving the client-facing origin.
	#[arg(long, env = "DISABLE_PROXY_HEADERS")]
	pub disable_proxy_headers: bool,
}
impl Config {
	/// Parses the configuration from the process arguments and environment.
	pub fn load() -> Self {
		Self::parse()
	}

	/// Resolves `listen_host:listen_port` into a socket address.
	pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
		let address = if self.listen_host.contains(':') {
			format!("[{}]:{}", self.listen_host, self.listen_port)
		} else {
			format!("{}:{}", self.listen_host, self.listen_port)
		};

		address.parse().map_err(|source| ConfigError::InvalidListenAddress { address, source })
	}

	/// Resolves the configured log level, reporting unrecognized names instead of failing.
	///
	/// Returns the level to use and, when the configured name was not recognized, that name so
	/// the caller can warn about it once logging is up.
	pub fn resolve_log_level(&self) -> (LogLevel, Option<&str>) {
		match self.log_level.parse::<LogLevel>() {
			Ok(level) => (level, None),
			Err(_) => (LogLevel::Info, Some(self.log_level.as_str())),
		}
	}

	/// Returns `true` when forwarded headers should shape the client-facing origin.
	pub fn trust_proxy_headers(&self) -> bool {
		!self.disable_proxy_headers
	}
}

/// Supported log verbosity names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogLevel {
	/// Errors only.
	Error,
	/// Warnings and errors.
	Warn,
	/// Informational messages and above.
	#[default]
	Info,
	/// Everything including debug detail.
	Debug,
}
impl LogLevel {
	/// Returns the canonical upper-case name.
	pub const fn as_str(self) -> &'static str {
		match self {
			LogLevel::Error => "ERROR",
			LogLevel::Warn => "WARN",
			LogLevel::Info => "INFO",
			LogLevel::Debug => "DEBUG",
		}
	}
}
impl FromStr for LogLevel {
	type Err = UnknownLogLevel;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"ERROR" => Ok(LogLevel::Error),
			"WARN" => Ok(LogLevel::Warn),
			"INFO" => Ok(LogLevel::Info),
			"DEBUG" => Ok(LogLevel::Debug),
			other => Err(UnknownLogLevel(other.to_owned())),
		}
	}
}
impl Display for LogLevel {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl From<LogLevel> for LevelFilter {
	fn from(level: LogLevel) -> Self {
		match level {
			LogLevel::Error => LevelFilter::ERROR,
			LogLevel::Warn => LevelFilter::WARN,
			LogLevel::Info => LevelFilter::INFO,
			LogLevel::Debug => LevelFilter::DEBUG,
		}
	}
}

/// Error returned when a log level name is not one of the supported values.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown log level `{0}`.")]
pub struct UnknownLogLevel(pub String);

/// Log line encodings supported by the subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
	/// One JSON object per line.
	#[default]
	Json,
	/// Human-readable lines.
	Pretty,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn parse(args: &[&str]) -> Config {
		Config::try_parse_from(std::iter::once("ecr-proxy").chain(args.iter().copied()))
			.expect("Configuration fixture should parse.")
	}

	#[test]
	fn log_level_names_map_to_levels() {
		let cases = [
			("INFO", LogLevel::Info, None),
			("DEBUG", LogLevel::Debug, None),
			("WARN", LogLevel::Warn, None),
			("ERROR", LogLevel::Error, None),
			("LALALALA", LogLevel::Info, Some("LALALALA")),
		];

		for (name, level, unknown) in cases {
			let config = parse(&["--log-level", name]);

			assert_eq!(config.resolve_log_level(), (level, unknown), "Unexpected level for {name}.");
		}
	}

	#[test]
	fn listen_address_joins_host_and_port() {
		let config = parse(&["--listen-host", "127.0.0.1", "--listen-port", "9000"]);

		assert_eq!(
			config.listen_addr().expect("Loopback address should parse."),
			"127.0.0.1:9000".parse::<SocketAddr>().expect("Fixture address should parse.")
		);

		let ipv6 = parse(&["--listen-host", "::1"]);

		assert_eq!(
			ipv6.listen_addr().expect("IPv6 loopback should parse.").to_string(),
			"[::1]:8080"
		);

		let invalid = parse(&["--listen-host", "not a host"]);

		assert!(matches!(invalid.listen_addr(), Err(ConfigError::InvalidListenAddress { .. })));
	}

	#[test]
	fn proxy_headers_are_trusted_unless_disabled() {
		assert!(parse(&[]).trust_proxy_headers());
		assert!(!parse(&["--disable-proxy-headers"]).trust_proxy_headers());
	}

	#[test]
	fn level_filters_follow_names() {
		assert_eq!(LevelFilter::from(LogLevel::Warn), LevelFilter::WARN);
		assert_eq!(LogLevel::Debug.to_string(), "DEBUG");
	}
}

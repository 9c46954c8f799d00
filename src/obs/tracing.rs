// crates.io
use tracing_subscriber::{EnvFilter, filter::LevelFilter, fmt};
// self
use crate::config::{LogFormat, LogLevel};

/// Installs the global `tracing` subscriber.
///
/// `level` sets the default verbosity; `RUST_LOG` directives, when present, refine it per
/// target. Installing twice is a no-op so tests and embedders may call this freely.
pub fn init_subscriber(level: LogLevel, format: LogFormat) {
	let filter = EnvFilter::builder()
		.with_default_directive(LevelFilter::from(level).into())
		.parse_lossy(std::env::var("RUST_LOG").unwrap_or_default());
	let builder = fmt().with_env_filter(filter).with_target(true);
	let _ = match format {
		LogFormat::Json => builder.json().flatten_event(true).try_init(),
		LogFormat::Pretty => builder.try_init(),
	};
}

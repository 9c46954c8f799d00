//! `ecr-proxy` binary entry point.

// std
use std::process::ExitCode;
// self
use ecr_proxy::{config::Config, obs, server};

#[tokio::main]
async fn main() -> ExitCode {
	let config = Config::load();
	let (level, unknown_level) = config.resolve_log_level();

	obs::init_subscriber(level, config.log_format);

	if let Some(name) = unknown_level {
		tracing::warn!(log_level = name, "Unknown log level; defaulting to INFO.");
	}

	let version = server::VersionInfo::current();

	tracing::info!(
		version = version.version,
		build_date = version.build_date,
		sha = version.sha,
		"Starting ECR proxy."
	);

	match server::run(config).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			tracing::error!(error = %e, source = ?std::error::Error::source(&e), "ECR proxy failed.");

			ExitCode::FAILURE
		},
	}
}

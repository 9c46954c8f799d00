//! HTTP front end: probe endpoints, the proxy fallback, and process lifecycle wiring.

// std
use std::net::SocketAddr;
// crates.io
use axum::{Json, Router, extract::State, http::StatusCode, routing::any};
use tokio::net::TcpListener;
// self
use crate::{
	_prelude::*,
	config::Config,
	error::ConfigError,
	http::UpstreamClient,
	proxy::{self, ProxyState},
	refresh::Refresher,
	source::CredentialSource,
	store::CredentialStore,
};

/// Build metadata served from `/version`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
	/// Crate version.
	pub version: &'static str,
	/// Build date stamped at compile time via `ECR_PROXY_BUILD_DATE`.
	pub build_date: &'static str,
	/// Source revision stamped at compile time via `ECR_PROXY_GIT_SHA`.
	pub sha: &'static str,
}
impl VersionInfo {
	/// Metadata of the running binary.
	pub const fn current() -> Self {
		Self {
			version: env!("CARGO_PKG_VERSION"),
			build_date: match option_env!("ECR_PROXY_BUILD_DATE") {
				Some(date) => date,
				None => "unknown",
			},
			sha: match option_env!("ECR_PROXY_GIT_SHA") {
				Some(sha) => sha,
				None => "unknown",
			},
		}
	}
}

/// Builds the router: `/healthz`, `/readyz` and `/version` for any method, everything else
/// proxied.
pub fn router(state: ProxyState) -> Router {
	Router::new()
		.route("/healthz", any(healthz))
		.route("/readyz", any(readyz))
		.route("/version", any(version))
		.fallback(proxy::proxy_request)
		.with_state(state)
}

async fn healthz() -> StatusCode {
	StatusCode::OK
}

async fn readyz(State(state): State<ProxyState>) -> StatusCode {
	if state.store.is_ready() { StatusCode::OK } else { StatusCode::INTERNAL_SERVER_ERROR }
}

async fn version() -> Json<VersionInfo> {
	Json(VersionInfo::current())
}

/// Binds the listening socket.
pub async fn bind(address: SocketAddr) -> Result<TcpListener, ConfigError> {
	TcpListener::bind(address)
		.await
		.map_err(|source| ConfigError::Bind { address: address.to_string(), source })
}

/// Serves `state` on `listener` until `shutdown` resolves, then drains in-flight requests.
pub async fn serve<F>(
	listener: TcpListener,
	state: ProxyState,
	shutdown: F,
) -> Result<(), ConfigError>
where
	F: 'static + Send + Future<Output = ()>,
{
	axum::serve(listener, router(state).into_make_service_with_connect_info::<SocketAddr>())
		.with_graceful_shutdown(shutdown)
		.await
		.map_err(ConfigError::Serve)
}

/// Resolves on SIGINT or (on Unix) SIGTERM.
pub async fn shutdown_signal() {
	let interrupt = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %e, "Failed to install the SIGINT handler.");
			std::future::pending::<()>().await;
		}
	};
	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			},
			Err(e) => {
				tracing::error!(error = %e, "Failed to install the SIGTERM handler.");
				std::future::pending::<()>().await;
			},
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = interrupt => tracing::info!("Received SIGINT, shutting down."),
		_ = terminate => tracing::info!("Received SIGTERM, shutting down."),
	}
}

/// Runs the proxy against AWS ECR using the default AWS configuration chain.
#[cfg(feature = "ecr")]
pub async fn run(config: Config) -> Result<()> {
	let source = crate::source::EcrCredentialSource::from_env().await?;

	run_with_source(config, source, shutdown_signal()).await
}

/// Runs the proxy with an arbitrary credential source until `shutdown` resolves.
///
/// Startup failures (listen address, bind, HTTP client) are returned before the refresher is
/// started. After the server drains, the refresher is stopped with its bounded timeout.
pub async fn run_with_source<S, F>(config: Config, source: S, shutdown: F) -> Result<()>
where
	S: CredentialSource,
	F: 'static + Send + Future<Output = ()>,
{
	let address = config.listen_addr()?;
	let client = UpstreamClient::new()?;
	let listener = bind(address).await?;
	let store = Arc::new(CredentialStore::new());
	let mut refresher = Refresher::<S>::new(source, Arc::clone(&store)).spawn();
	let state =
		ProxyState::new(store, client).with_trust_proxy_headers(config.trust_proxy_headers());

	tracing::info!(
		%address,
		trust_proxy_headers = state.trust_proxy_headers,
		"Listening for registry requests."
	);

	let served = serve(listener, state, shutdown).await;
	let outcome = refresher.shutdown().await;

	tracing::info!(?outcome, "ECR proxy stopped.");

	served.map_err(Into::into)
}

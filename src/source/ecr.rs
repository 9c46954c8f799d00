//! AWS ECR `GetAuthorizationToken` credential source.

// crates.io
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_ecr::{Client as EcrClient, types::AuthorizationData};
// self
use crate::{
	_prelude::*,
	auth::Credential,
	error::{ConfigError, Error, TransientError, TransportError},
	source::{CredentialFuture, CredentialSource},
};

/// Credential source backed by the ECR API of the default registry for the resolved account.
#[derive(Clone, Debug)]
pub struct EcrCredentialSource {
	client: EcrClient,
}
impl EcrCredentialSource {
	/// Loads the default AWS configuration chain (environment, profile, instance metadata).
	///
	/// Fails when the chain yields no credentials provider or region: without them the client
	/// can never succeed, which makes this a startup error rather than a retryable one.
	pub async fn from_env() -> Result<Self> {
		let config = aws_config::load_defaults(BehaviorVersion::latest()).await;

		Self::from_config(&config)
	}

	/// Builds the source from an already loaded SDK configuration.
	pub fn from_config(config: &SdkConfig) -> Result<Self> {
		if config.credentials_provider().is_none() {
			return Err(ConfigError::MissingAwsCredentials.into());
		}
		if config.region().is_none() {
			return Err(ConfigError::MissingAwsRegion.into());
		}

		Ok(Self::with_client(EcrClient::new(config)))
	}

	/// Wraps an existing ECR client.
	pub fn with_client(client: EcrClient) -> Self {
		Self { client }
	}

	async fn fetch_now(&self) -> Result<Credential> {
		let output = self
			.client
			.get_authorization_token()
			.send()
			.await
			.map_err(TransportError::network)?;
		let data =
			output.authorization_data().first().ok_or(TransientError::EmptyAuthorizationData)?;

		credential_from_authorization_data(data)
	}
}
impl CredentialSource for EcrCredentialSource {
	fn fetch(&self) -> CredentialFuture<'_> {
		Box::pin(self.fetch_now())
	}
}

fn credential_from_authorization_data(data: &AuthorizationData) -> Result<Credential> {
	let token = data
		.authorization_token()
		.ok_or(TransientError::IncompleteCredential { field: "authorizationToken" })?;
	let expires_at = data
		.expires_at()
		.ok_or(TransientError::IncompleteCredential { field: "expiresAt" })?;
	let expires_at = OffsetDateTime::from_unix_timestamp(expires_at.secs())
		.map_err(|_| TransientError::InvalidExpiry)?;
	let endpoint = data
		.proxy_endpoint()
		.ok_or(TransientError::IncompleteCredential { field: "proxyEndpoint" })?;

	Ok(Credential::new(token, expires_at, endpoint))
}

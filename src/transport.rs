//! # Signup Transport Abstraction
//!
//! Transport-agnostic interface over the three signup calls the progress
//! controller needs. The REST client implements it for production; tests
//! drive the controller with scripted implementations.

use async_trait::async_trait;
use std::sync::Arc;

use crate::api_clients::{SignupApiClient, SignupApiConfig};
use crate::config::ClientConfig;
use crate::credentials::CredentialProvider;
use crate::error::ClientResult;
use crate::types::{CreationId, JobStatus, TenantAccess};

/// Calls the progress controller makes against the signup backend.
///
/// Implementations must not hold controller state; every call is a single
/// request whose outcome is handed back to the caller.
///
/// ```rust
/// use async_trait::async_trait;
/// use tenant_provisioning::{
///     ClientError, ClientResult, CreationId, JobState, JobStatus, SignupTransport,
///     TenantAccess,
/// };
///
/// struct AlwaysDone;
///
/// #[async_trait]
/// impl SignupTransport for AlwaysDone {
///     fn transport_name(&self) -> &'static str {
///         "in-memory"
///     }
///
///     async fn start_creation(&self) -> ClientResult<CreationId> {
///         Ok(CreationId::new("1"))
///     }
///
///     async fn creation_status(&self, creation_id: &CreationId) -> ClientResult<JobStatus> {
///         Ok(JobStatus {
///             id: creation_id.clone(),
///             status: JobState::Completed,
///             current_step: None,
///             message: None,
///             result: None,
///             slug: None,
///         })
///     }
///
///     async fn creation_result(&self, _creation_id: &CreationId) -> ClientResult<TenantAccess> {
///         Err(ClientError::server(None, "no result stored"))
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let transport = AlwaysDone;
/// let id = transport.start_creation().await.unwrap();
/// let status = transport.creation_status(&id).await.unwrap();
/// assert!(status.status.is_terminal());
/// # });
/// ```
#[async_trait]
pub trait SignupTransport: Send + Sync {
    /// Get the transport name for debugging/logging.
    fn transport_name(&self) -> &'static str;

    /// Start a provisioning job.
    async fn start_creation(&self) -> ClientResult<CreationId>;

    /// Fetch the status of a provisioning job.
    async fn creation_status(&self, creation_id: &CreationId) -> ClientResult<JobStatus>;

    /// Fetch the final result of a completed job.
    async fn creation_result(&self, creation_id: &CreationId) -> ClientResult<TenantAccess>;
}

#[async_trait]
impl SignupTransport for SignupApiClient {
    fn transport_name(&self) -> &'static str {
        "REST"
    }

    async fn start_creation(&self) -> ClientResult<CreationId> {
        SignupApiClient::start_creation(self).await
    }

    async fn creation_status(&self, creation_id: &CreationId) -> ClientResult<JobStatus> {
        SignupApiClient::creation_status(self, creation_id).await
    }

    async fn creation_result(&self, creation_id: &CreationId) -> ClientResult<TenantAccess> {
        SignupApiClient::creation_result(self, creation_id).await
    }
}

/// Build the REST transport from loaded client configuration
pub fn rest_transport_from_config(
    config: &ClientConfig,
    credentials: Arc<dyn CredentialProvider>,
) -> ClientResult<Arc<dyn SignupTransport>> {
    let api_config = SignupApiConfig {
        base_url: config.signup.base_url.clone(),
        timeout_ms: config.signup.timeout_ms,
    };
    let client = SignupApiClient::new(api_config, credentials)?;
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentials;

    #[test]
    fn test_rest_transport_from_config() {
        let mut config = ClientConfig::default();
        config.signup.base_url = "https://app.example.com".to_string();

        let transport =
            rest_transport_from_config(&config, Arc::new(StaticCredentials::new("token"))).unwrap();
        assert_eq!(transport.transport_name(), "REST");
    }

    #[test]
    fn test_rest_transport_rejects_bad_url() {
        let mut config = ClientConfig::default();
        config.signup.base_url = "not a url".to_string();

        assert!(rest_transport_from_config(&config, Arc::new(StaticCredentials::none())).is_err());
    }
}

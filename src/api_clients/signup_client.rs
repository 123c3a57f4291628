//! # Signup API Client
//!
//! HTTP client for the signup endpoints that start a tenant provisioning job,
//! report its status, and return the final tenant access payload.
//!
//! The client is stateless apart from its connection pool: it performs one
//! request per call and leaves every state transition to the caller.

use reqwest::{header, Client, Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::credentials::{CredentialProvider, StaticCredentials, CSRF_HEADER};
use crate::error::{ClientError, ClientResult};
use crate::types::{
    CreationId, CreationResultResponse, CreationStatusResponse, JobStatus,
    StartCreationResponse, TenantAccess,
};

/// HTTP 419 "Page Expired", returned when the anti-forgery token is stale
const STATUS_PAGE_EXPIRED: u16 = 419;

/// Configuration for the signup API client
///
/// # Examples
///
/// ```rust
/// use tenant_provisioning::SignupApiConfig;
///
/// let config = SignupApiConfig::default();
/// assert_eq!(config.base_url, "http://localhost:8000");
/// assert_eq!(config.timeout_ms, 30000);
/// ```
#[derive(Debug, Clone)]
pub struct SignupApiConfig {
    /// Base URL of the web application (e.g., "<https://app.example.com>")
    pub base_url: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for SignupApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_ms: 30000,
        }
    }
}

/// HTTP client for the signup provisioning endpoints
#[derive(Clone)]
pub struct SignupApiClient {
    client: Client,
    base_url: Url,
    config: SignupApiConfig,
    credentials: Arc<dyn CredentialProvider>,
}

impl std::fmt::Debug for SignupApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout_ms", &self.config.timeout_ms)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl SignupApiClient {
    /// Create a new client with the given configuration and credential source
    pub fn new(
        config: SignupApiConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> ClientResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ClientError::config_error(format!("Invalid base URL '{}': {}", config.base_url, e))
        })?;

        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        default_headers.insert(
            header::HeaderName::from_static("x-requested-with"),
            header::HeaderValue::from_static("XMLHttpRequest"),
        );

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(format!("tenant-provisioning-client/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(default_headers)
            .build()
            .map_err(|e| ClientError::config_error(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            base_url = %base_url,
            timeout_ms = config.timeout_ms,
            "Created signup API client"
        );

        Ok(Self {
            client,
            base_url,
            config,
            credentials,
        })
    }

    /// Create a client that sends no anti-forgery token
    pub fn without_credentials(config: SignupApiConfig) -> ClientResult<Self> {
        Self::new(config, Arc::new(StaticCredentials::none()))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.config.timeout_ms
    }

    /// Append path segments to the base URL, encoding each one
    fn url(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ClientError::config_error(format!(
                    "Base URL '{}' cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn csrf_header(&self) -> ClientResult<Option<header::HeaderValue>> {
        self.credentials
            .csrf_token()
            .map(|token| {
                header::HeaderValue::from_str(&token).map_err(|e| {
                    ClientError::config_error(format!("Invalid {} value: {}", CSRF_HEADER, e))
                })
            })
            .transpose()
    }

    async fn send(&self, method: Method, segments: &[&str]) -> ClientResult<Response> {
        let url = self.url(segments)?;
        debug!("Making {} request to: {}", method, url);

        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(token) = self.csrf_header()? {
            request = request.header(CSRF_HEADER, token);
        }

        request.send().await.map_err(|e| {
            error!("{} {} failed before a response: {}", method, url.path(), e);
            ClientError::from_reqwest(e)
        })
    }

    /// Start a provisioning job and return its id
    pub async fn start_creation(&self) -> ClientResult<CreationId> {
        let response = self.send(Method::POST, &["signup", "start-creation"]).await?;
        let body: StartCreationResponse = decode_response(response).await?;

        if !body.success {
            return Err(ClientError::server(
                None,
                body.message
                    .unwrap_or_else(|| "start-creation reported success=false".to_string()),
            ));
        }

        match body.creation_id {
            Some(creation_id) => {
                info!(creation_id = %creation_id, "Tenant provisioning job started");
                Ok(creation_id)
            }
            None => Err(ClientError::server(
                None,
                match body.redirect {
                    Some(redirect) => format!(
                        "start-creation answered with a redirect to '{}' instead of a creation id",
                        redirect
                    ),
                    None => "start-creation response carried no creation id".to_string(),
                },
            )),
        }
    }

    /// Fetch the current status of a provisioning job
    pub async fn creation_status(&self, creation_id: &CreationId) -> ClientResult<JobStatus> {
        let response = self
            .send(Method::GET, &["signup", "creation-status", creation_id.as_str()])
            .await?;
        let body: CreationStatusResponse = decode_response(response).await?;

        match (body.success, body.status) {
            (true, Some(status)) => {
                debug!(
                    creation_id = %creation_id,
                    job_state = %status.status,
                    current_step = ?status.current_step,
                    "Retrieved creation status"
                );
                Ok(status)
            }
            (true, None) => Err(ClientError::server(
                None,
                "creation-status response carried no status",
            )),
            (false, _) => Err(ClientError::server(
                None,
                body.message
                    .unwrap_or_else(|| "creation-status reported success=false".to_string()),
            )),
        }
    }

    /// Fetch the final tenant access payload of a completed job
    pub async fn creation_result(&self, creation_id: &CreationId) -> ClientResult<TenantAccess> {
        let response = self
            .send(Method::GET, &["api", "tenant-creation-result", creation_id.as_str()])
            .await?;
        let body: CreationResultResponse = decode_response(response).await?;

        match (body.success, body.result) {
            (true, Some(result)) => {
                info!(creation_id = %creation_id, "Retrieved tenant creation result");
                Ok(result)
            }
            (true, None) => Err(ClientError::server(
                None,
                "tenant-creation-result response carried no result",
            )),
            (false, _) => Err(ClientError::server(
                None,
                body.message
                    .unwrap_or_else(|| "tenant-creation-result reported success=false".to_string()),
            )),
        }
    }
}

/// Map a non-2xx status: 401/419 are credential failures, anything else is
/// a server error.
pub(crate) fn status_error(status: StatusCode, body: String) -> ClientError {
    let code = status.as_u16();
    if code == StatusCode::UNAUTHORIZED.as_u16() || code == STATUS_PAGE_EXPIRED {
        return ClientError::auth(code, body);
    }
    ClientError::server(Some(code), body)
}

async fn decode_response<T>(response: Response) -> ClientResult<T>
where
    T: DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        error!("Signup request failed: {} - {}", status, error_text);
        return Err(status_error(status, error_text));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(ClientError::from_reqwest)?;
    serde_json::from_slice(&bytes).map_err(|e| {
        ClientError::server(Some(status.as_u16()), format!("Failed to parse response: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::RotatingCredentials;

    #[test]
    fn test_signup_api_config_default() {
        let config = SignupApiConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.timeout_ms, 30000);
    }

    #[test]
    fn test_client_creation() {
        let client = SignupApiClient::without_credentials(SignupApiConfig {
            base_url: "https://app.example.com".to_string(),
            timeout_ms: 5000,
        })
        .unwrap();
        assert_eq!(client.base_url(), "https://app.example.com/");
        assert_eq!(client.timeout_ms(), 5000);
        assert_eq!(
            client
                .url(&["signup", "creation-status", "42"])
                .unwrap()
                .as_str(),
            "https://app.example.com/signup/creation-status/42"
        );
    }

    #[test]
    fn test_creation_id_stays_a_single_path_segment() {
        let client = SignupApiClient::without_credentials(SignupApiConfig {
            base_url: "https://app.example.com/portal/".to_string(),
            timeout_ms: 5000,
        })
        .unwrap();
        let url = client
            .url(&["signup", "creation-status", "../../admin/users?x=1#top"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://app.example.com/portal/signup/creation-status/..%2F..%2Fadmin%2Fusers%3Fx=1%23top"
        );
        assert_eq!(url.query(), None);
    }

    #[tokio::test]
    async fn test_invalid_token_is_config_error() {
        // Never reaches the network: the header is rejected first
        let client = SignupApiClient::new(
            SignupApiConfig {
                base_url: "http://127.0.0.1:9".to_string(),
                timeout_ms: 2000,
            },
            Arc::new(StaticCredentials::new("tok\n")),
        )
        .unwrap();

        let err = client
            .creation_status(&CreationId::new("42"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
        assert_eq!(err.failure_kind(), crate::error::FailureKind::Auth);
    }

    #[test]
    fn test_invalid_base_url() {
        let result = SignupApiClient::without_credentials(SignupApiConfig {
            base_url: "invalid-url".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn test_debug_hides_token() {
        let creds = RotatingCredentials::new(Some("csrf-secret".to_string()));
        let client = SignupApiClient::new(SignupApiConfig::default(), Arc::new(creds)).unwrap();
        let rendered = format!("{:?}", client);
        assert!(rendered.contains("has_token: true"));
        assert!(!rendered.contains("csrf-secret"));
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::from_u16(419).unwrap(), "expired".into()),
            ClientError::Auth { status: 419, .. }
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "nope".into()),
            ClientError::Auth { status: 401, .. }
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "forbidden".into()),
            ClientError::Server {
                status: Some(403),
                ..
            }
        ));
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, "boom".into()),
            ClientError::Server {
                status: Some(500),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        // Port 9 (discard) on localhost is expected to refuse connections
        let client = SignupApiClient::without_credentials(SignupApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_ms: 2000,
        })
        .unwrap();

        let err = client
            .creation_status(&CreationId::new("42"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }
}

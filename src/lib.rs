#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tenant Provisioning Client
//!
//! Client library for starting a tenant provisioning job on the signup
//! backend and following it to completion.
//!
//! ## Module Organization
//!
//! - [`api_clients`] - HTTP client for the signup endpoints
//! - [`transport`] - Transport trait the progress controller depends on
//! - [`credentials`] - Anti-forgery token providers
//! - [`progress`] - Step mapping, tracker state machine and polling controller
//! - [`config`] - Configuration loading
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tenant_provisioning::{
//!     rest_transport_from_config, ClientConfig, ProgressController, StaticCredentials,
//! };
//!
//! # async fn example() -> tenant_provisioning::ClientResult<()> {
//! let config = ClientConfig::load()?;
//! let transport = rest_transport_from_config(&config, Arc::new(StaticCredentials::none()))?;
//!
//! let handle = ProgressController::new(transport, config.polling).spawn();
//! handle.start()?;
//!
//! let snapshot = handle.wait_for_terminal().await?;
//! println!("provisioning finished as {}", snapshot.state);
//! # Ok(())
//! # }
//! ```

pub mod api_clients;
pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod progress;
pub mod transport;
pub mod types;

// Re-export commonly used types for convenience
pub use api_clients::{SignupApiClient, SignupApiConfig};
pub use config::{ClientConfig, PollingConfig};
pub use credentials::{CredentialProvider, RotatingCredentials, StaticCredentials};
pub use error::{ClientError, ClientResult, FailureKind};
pub use progress::{
    ProgressController, ProgressHandle, ProgressSnapshot, StepPlan, StepStatus, TrackerState,
};
pub use transport::{rest_transport_from_config, SignupTransport};
pub use types::{CreationId, JobState, JobStatus, TenantAccess};

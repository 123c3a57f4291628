//! API Client Modules
//!
//! HTTP clients for the signup endpoints that start tenant provisioning
//! jobs and report their progress.

pub mod signup_client;

pub use signup_client::{SignupApiClient, SignupApiConfig};

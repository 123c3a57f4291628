//! # Credential Providers
//!
//! Supplies the anti-forgery token attached to every signup request as
//! `X-CSRF-TOKEN`. The token is read per request, so a rotation is picked up
//! by the next call without rebuilding the client.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Header carrying the anti-forgery token
pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";

/// Source of the anti-forgery token
pub trait CredentialProvider: Send + Sync + fmt::Debug {
    /// Current token, or `None` to send the request without one
    fn csrf_token(&self) -> Option<String>;
}

/// A token that never changes for the life of the client
#[derive(Clone, Default)]
pub struct StaticCredentials {
    token: Option<String>,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn none() -> Self {
        Self { token: None }
    }
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

impl CredentialProvider for StaticCredentials {
    fn csrf_token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// A token that may be replaced mid-flow, e.g. after the page refreshes it.
///
/// Clones share the same token.
#[derive(Clone, Default)]
pub struct RotatingCredentials {
    token: Arc<RwLock<Option<String>>>,
}

impl RotatingCredentials {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(initial)),
        }
    }

    /// Replace the token used by all subsequent requests
    pub fn rotate(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
        debug!("Anti-forgery token rotated");
    }

    pub fn clear(&self) {
        *self.token.write() = None;
    }
}

impl fmt::Debug for RotatingCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingCredentials")
            .field("has_token", &self.token.read().is_some())
            .finish()
    }
}

impl CredentialProvider for RotatingCredentials {
    fn csrf_token(&self) -> Option<String> {
        self.token.read().clone()
    }
}

//! Error taxonomy of the credential manager.
//!
//! Provider-scoped failures never leave a round and round-scoped failures never
//! leave the scheduler; only [`CredentialError::Config`] reaches the caller of
//! the constructor.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    /// Contradictory or missing principal/keytab pairing, bad renewal mode.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("keytab '{}' not found or not readable", .0.display())]
    KeytabNotFound(PathBuf),

    #[error("login failed for '{principal}': {reason}")]
    LoginFailure { principal: String, reason: String },

    #[error("provider '{service}' failed: {source}")]
    ProviderFailure {
        service: String,
        #[source]
        source: ProviderError,
    },

    /// Raised only while shutting down.
    #[error("interrupted by shutdown")]
    Interrupted,
}

impl CredentialError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn login(principal: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LoginFailure {
            principal: principal.into(),
            reason: reason.into(),
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

/// Failure reported by a single credential provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("provider panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T, E = CredentialError> = std::result::Result<T, E>;

//! Credential providers
//!
//! A provider knows how to obtain a delegation token for one backend service.
//! The manager never implements backend protocols itself; the host application
//! hands it a list of providers at construction.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;

use crate::config::runtime::RuntimeConfig;
use crate::credentials::CredentialBundle;
use crate::error::ProviderError;
use crate::identity::IdentityHandle;

pub mod http;
pub mod registry;

pub use registry::{ProviderDescriptor, ProviderRegistry};

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Unique key of the provider in the registry.
    fn service_name(&self) -> &str;

    /// Whether the backend needs credentials for this run at all.
    async fn requires_credentials(&self, runtime: &RuntimeConfig) -> Result<bool, ProviderError>;

    /// Add this service's tokens to `creds`, obtained as `identity`.
    /// Returns the time by which the tokens must be renewed, if any.
    async fn obtain_tokens(
        &self,
        identity: &IdentityHandle,
        runtime: &RuntimeConfig,
        creds: &mut CredentialBundle,
    ) -> Result<Option<DateTime<Utc>>, ProviderError>;
}

/// Run a provider call, turning a panic into [`ProviderError::Panicked`].
pub(crate) async fn isolate<T, F>(call: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(ProviderError::Panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}

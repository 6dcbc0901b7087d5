//! # Token Renewer Library
//!
//! Keeps short-lived delegation tokens for secured backend services fresh for
//! the lifetime of a long-running job, and pushes every renewed bundle to the
//! job's workers.
//!
//! Modules:
//! - `renewal`: acquisition round, renewal scheduler, ticket refresher, manager
//! - `identity`: login strategy selection and the system identity library
//! - `providers`: credential provider capability, registry, HTTP provider
//! - `credentials`: tokens and the credential bundle
//! - `publishers`: distribution endpoints (channel, file, UDS, HTTP)
//! - `config`: service configuration, loading and validation

pub mod config;
pub mod credentials;
pub mod error;
pub mod helpers;
pub mod identity;
pub mod observability;
pub mod providers;
pub mod publishers;
pub mod renewal;
pub mod resilience;
pub mod server;
pub mod utils;

#[cfg(test)]
pub mod tests;

pub use crate::config::types::ServiceConfig;
pub use crate::credentials::{CredentialBundle, Token};
pub use crate::error::{CredentialError, ProviderError};
pub use crate::providers::CredentialProvider;
pub use crate::publishers::DistributionEndpoint;
pub use crate::renewal::ServiceCredentialsManager;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::runtime::RuntimeConfig;
use crate::credentials::CredentialBundle;
use crate::error::{CredentialError, Result};
use crate::helpers::time::earliest;
use crate::identity::{IdentityHandle, LoginSelector};
use crate::observability::metrics::get_metrics;
use crate::providers::{isolate, CredentialProvider, ProviderRegistry};

static OBTAIN_STAGE: &str = "obtain_tokens";

#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub bundle: CredentialBundle,
    /// `None` when nothing has to be renewed
    pub deadline: Option<DateTime<Utc>>,
    pub identity: IdentityHandle,
    /// services whose contribution was dropped
    pub failed_providers: Vec<String>,
}

/// One acquisition pass: log in, ask every enabled provider, merge.
pub struct TokenAcquisitionRound<P: ?Sized = dyn CredentialProvider> {
    login: Arc<LoginSelector>,
    registry: Arc<ProviderRegistry<P>>,
    runtime: Arc<RuntimeConfig>,
}

impl<P: CredentialProvider + ?Sized> TokenAcquisitionRound<P> {
    pub fn new(
        login: Arc<LoginSelector>,
        registry: Arc<ProviderRegistry<P>>,
        runtime: Arc<RuntimeConfig>,
    ) -> Self {
        Self {
            login,
            registry,
            runtime,
        }
    }

    /// Fails only when no identity could be acquired. Provider failures drop
    /// that provider's tokens and the round carries on.
    pub async fn run_round(&self) -> Result<RoundOutcome> {
        let identity = self.login.acquire_identity().await?;
        let providers = self.registry.enabled_providers(&self.runtime).await;
        let metrics = get_metrics().await;

        let mut bundle = CredentialBundle::new();
        let mut deadline = None;
        let mut failed_providers = Vec::new();

        for descriptor in providers {
            let service = descriptor.service.as_str();
            // a failing provider must not leave half of its tokens behind
            let mut contribution = CredentialBundle::new();
            let obtained = isolate(descriptor.provider.obtain_tokens(
                &identity,
                &self.runtime,
                &mut contribution,
            ))
            .await;

            match obtained {
                Ok(hint) => {
                    deadline = earliest(deadline, hint);
                    deadline = earliest(deadline, contribution.renewal_deadline());
                    metrics
                        .provider_tokens
                        .with_label_values(&[service])
                        .set(contribution.len() as i64);
                    info!(service, tokens = contribution.len(), "provider contributed tokens");
                    bundle.merge(contribution);
                }
                Err(source) => {
                    let err = CredentialError::ProviderFailure {
                        service: service.to_owned(),
                        source,
                    };
                    warn!("{}; continuing without it", err);
                    metrics
                        .provider_failures
                        .with_label_values(&[service, OBTAIN_STAGE])
                        .inc();
                    failed_providers.push(service.to_owned());
                }
            }
        }

        Ok(RoundOutcome {
            bundle,
            deadline,
            identity,
            failed_providers,
        })
    }
}

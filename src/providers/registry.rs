use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::runtime::RuntimeConfig;
use crate::observability::metrics::get_metrics;
use crate::providers::{isolate, CredentialProvider};

static REQUIRES_STAGE: &str = "requires_credentials";

/// One registered provider, keyed by its service name.
pub struct ProviderDescriptor<P: ?Sized = dyn CredentialProvider> {
    pub service: String,
    pub provider: Arc<P>,
    /// configuration switch, independent of what the provider reports
    pub enabled: bool,
}

impl<P: ?Sized> Clone for ProviderDescriptor<P> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            provider: self.provider.clone(),
            enabled: self.enabled,
        }
    }
}

impl<P: ?Sized> std::fmt::Debug for ProviderDescriptor<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("service", &self.service)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Immutable set of providers assembled once at construction.
pub struct ProviderRegistry<P: ?Sized = dyn CredentialProvider> {
    descriptors: Vec<ProviderDescriptor<P>>,
}

impl<P: CredentialProvider + ?Sized> ProviderRegistry<P> {
    /// Register `providers` in order. A later provider with the same service
    /// name replaces the earlier one. `switches` maps service name to the
    /// configured enable flag; services without an entry are enabled.
    pub fn new(providers: Vec<Arc<P>>, switches: &HashMap<String, bool>) -> Self {
        let mut descriptors: Vec<ProviderDescriptor<P>> = Vec::with_capacity(providers.len());
        for provider in providers {
            let service = provider.service_name().to_owned();
            let descriptor = ProviderDescriptor {
                enabled: switches.get(&service).copied().unwrap_or(true),
                service,
                provider,
            };
            match descriptors.iter_mut().find(|d| d.service == descriptor.service) {
                Some(existing) => {
                    warn!(service = %descriptor.service, "duplicate provider registration, keeping the last one");
                    *existing = descriptor;
                }
                None => descriptors.push(descriptor),
            }
        }
        info!(
            "registered providers: {:?}",
            descriptors.iter().map(|d| d.service.as_str()).collect::<Vec<_>>()
        );
        Self { descriptors }
    }

    pub fn descriptors(&self) -> &[ProviderDescriptor<P>] {
        &self.descriptors
    }

    pub fn get(&self, service: &str) -> Option<&ProviderDescriptor<P>> {
        self.descriptors.iter().find(|d| d.service == service)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Providers that are switched on and report that their backend requires
    /// credentials for this run. A provider whose check fails is left out.
    pub async fn enabled_providers(&self, runtime: &RuntimeConfig) -> Vec<ProviderDescriptor<P>> {
        let mut enabled = Vec::with_capacity(self.descriptors.len());
        for descriptor in &self.descriptors {
            if !descriptor.enabled {
                debug!(service = %descriptor.service, "provider disabled by configuration");
                continue;
            }
            match isolate(descriptor.provider.requires_credentials(runtime)).await {
                Ok(true) => enabled.push(descriptor.clone()),
                Ok(false) => {
                    debug!(service = %descriptor.service, "provider does not require credentials")
                }
                Err(err) => {
                    warn!(service = %descriptor.service, "requires_credentials failed, skipping provider: {}", err);
                    get_metrics()
                        .await
                        .provider_failures
                        .with_label_values(&[descriptor.service.as_str(), REQUIRES_STAGE])
                        .inc();
                }
            }
        }
        enabled
    }
}

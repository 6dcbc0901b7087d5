use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::kerberos::KerberosConfig;
use crate::config::renewal::{RenewalConfig, RenewalMode};
use crate::config::runtime::RuntimeConfig;
use crate::config::types::ServiceConfig;
use crate::error::{CredentialError, Result};
use crate::identity::{IdentityLibrary, LoginSelector};
use crate::providers::{CredentialProvider, ProviderRegistry};
use crate::publishers::DistributionEndpoint;
use crate::renewal::refresher::TicketRefresher;
use crate::renewal::round::TokenAcquisitionRound;
use crate::renewal::scheduler::RenewalScheduler;
use crate::renewal::state::{PublishedCredentials, ScheduleState};
use crate::resilience::retry::RetryWait;
use crate::utils::constants::{
    DEFAULT_MIN_DELAY_MS, DEFAULT_RELOGIN_PERIOD_SECS, DEFAULT_RETRY_WAIT_SECS,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalSettings {
    pub mode: RenewalMode,
    pub retry_wait: Duration,
    pub relogin_period: Duration,
    pub min_delay: Duration,
}

impl RenewalSettings {
    pub fn from_config(renewal: &RenewalConfig, kerberos: &KerberosConfig) -> Self {
        let mode = renewal.mode.unwrap_or(if kerberos.keytab.is_some() {
            RenewalMode::Keytab
        } else {
            RenewalMode::TicketCache
        });
        Self {
            mode,
            retry_wait: Duration::from_secs(renewal.retry_wait_seconds.unwrap_or(DEFAULT_RETRY_WAIT_SECS)),
            relogin_period: Duration::from_secs(
                renewal.relogin_period_seconds.unwrap_or(DEFAULT_RELOGIN_PERIOD_SECS),
            ),
            min_delay: Duration::from_millis(renewal.min_delay_ms.unwrap_or(DEFAULT_MIN_DELAY_MS)),
        }
    }
}

impl Default for RenewalSettings {
    fn default() -> Self {
        Self::from_config(&RenewalConfig::default(), &KerberosConfig::default())
    }
}

/// Everything the manager consumes from configuration.
#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    pub settings: RenewalSettings,
    pub principal: Option<String>,
    pub keytab: Option<PathBuf>,
    pub runtime: RuntimeConfig,
    /// service name -> enabled
    pub provider_switches: HashMap<String, bool>,
}

impl ManagerConfig {
    pub fn from_service_config(cfg: &ServiceConfig) -> Self {
        Self {
            settings: RenewalSettings::from_config(&cfg.renewal, &cfg.kerberos),
            principal: cfg
                .kerberos
                .principal
                .as_deref()
                .map(str::trim)
                .filter(|principal| !principal.is_empty())
                .map(str::to_owned),
            keytab: cfg.kerberos.keytab.clone(),
            runtime: cfg.runtime.clone(),
            provider_switches: cfg
                .providers
                .iter()
                .map(|(service, provider)| (service.clone(), provider.enabled))
                .collect(),
        }
    }
}

/// Keeps delegation tokens for all registered services fresh and publishes
/// them after every successful round.
///
/// `start` performs the first round synchronously, then (unless renewal is
/// disabled) arms the renewal loop and, for keytab logins, the ticket
/// refresher. `stop` cancels pending timers and waits for an in-flight round.
pub struct ServiceCredentialsManager<P: ?Sized = dyn CredentialProvider> {
    settings: RenewalSettings,
    login: Arc<LoginSelector>,
    scheduler: Arc<RenewalScheduler<P>>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl<P: CredentialProvider + ?Sized + 'static> ServiceCredentialsManager<P> {
    /// Fails with [`CredentialError::Config`] on an inconsistent login setup.
    pub fn new(
        config: ManagerConfig,
        providers: Vec<Arc<P>>,
        library: Arc<dyn IdentityLibrary>,
        endpoint: Arc<dyn DistributionEndpoint>,
    ) -> Result<Self> {
        let login = Arc::new(LoginSelector::new(config.principal, config.keytab, library)?);
        let settings = config.settings;
        match settings.mode {
            RenewalMode::Keytab if !login.uses_keytab() => {
                return Err(CredentialError::config(
                    "keytab renewal mode requires a principal and a keytab",
                ))
            }
            RenewalMode::TicketCache if login.uses_keytab() => {
                warn!("keytab is configured, it takes precedence over the ticket cache");
            }
            _ => {}
        }
        if settings.min_delay.is_zero() {
            return Err(CredentialError::config("minimum renewal delay must be positive"));
        }

        let registry = Arc::new(ProviderRegistry::new(providers, &config.provider_switches));
        let round = TokenAcquisitionRound::new(login.clone(), registry, Arc::new(config.runtime));
        let shutdown = CancellationToken::new();
        let scheduler = Arc::new(RenewalScheduler::new(
            round,
            endpoint,
            RetryWait::new(settings.retry_wait),
            settings.min_delay,
            shutdown.clone(),
        ));

        Ok(Self {
            settings,
            login,
            scheduler,
            shutdown,
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        })
    }

    /// Obtain the initial credentials and start renewing them.
    /// Returns the initial bundle, `None` if the first round failed (it is then
    /// retried on the regular schedule).
    pub async fn start(&self) -> Option<Arc<PublishedCredentials>> {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("credentials manager already started");
            return self.scheduler.last_published();
        }

        let initial = self.scheduler.run_now().await;
        if self.settings.mode == RenewalMode::Disabled {
            info!("token renewal disabled, initial tokens will not be refreshed");
            return initial;
        }
        if self.shutdown.is_cancelled() {
            return initial;
        }

        let mut tasks = self.tasks.lock().await;
        if self.login.uses_keytab() {
            let refresher = TicketRefresher::new(
                self.login.library().clone(),
                self.settings.relogin_period,
                self.shutdown.clone(),
            );
            tasks.push(refresher.start());
        }
        tasks.push(self.scheduler.spawn());
        info!(mode = ?self.settings.mode, "credentials manager started");
        initial
    }

    /// Request shutdown and wait for the background tasks. A round already in
    /// flight finishes and publishes, but nothing is scheduled after it.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        for task in tasks {
            if let Err(err) = task.await {
                warn!("background task ended abnormally: {}", err);
            }
        }
        info!("credentials manager stopped");
    }

    /// Run a round as soon as possible, e.g. after the ticket cache changed.
    pub fn trigger(&self) {
        self.scheduler.trigger();
    }

    pub async fn state(&self) -> ScheduleState {
        self.scheduler.state().await
    }

    pub fn last_published(&self) -> Option<Arc<PublishedCredentials>> {
        self.scheduler.last_published()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<PublishedCredentials>>> {
        self.scheduler.subscribe()
    }

    pub fn settings(&self) -> &RenewalSettings {
        &self.settings
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

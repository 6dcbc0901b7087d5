// tests/common/mod.rs
pub use axum::Router;
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use crate::config::runtime::RuntimeConfig;
use crate::credentials::{CredentialBundle, Token};
use crate::error::{CredentialError, ProviderError, Result};
use crate::helpers::time::renewal_deadline;
use crate::identity::{IdentityHandle, IdentityLibrary, LoginMethod};
use crate::providers::CredentialProvider;
use crate::publishers::DistributionEndpoint;

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes.
pub async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// ================================
/// Identity library double
/// ================================
pub struct FakeIdentityLibrary {
    pub ambient_user: String,
    pub proxy: bool,
    pub fail_logins: AtomicBool,
    /// logins fail as if killed by shutdown
    pub interrupt_logins: AtomicBool,
    pub login_delay_ms: AtomicU64,
    pub needs_renewal: AtomicBool,
    pub fail_relogin: AtomicBool,
    pub keytab_logins: AtomicUsize,
    pub relogins: AtomicUsize,
    pub cache_logins: Mutex<Vec<(String, Option<PathBuf>)>>,
}

impl FakeIdentityLibrary {
    pub fn new(ambient_user: &str) -> Self {
        Self {
            ambient_user: ambient_user.to_owned(),
            proxy: false,
            fail_logins: AtomicBool::new(false),
            interrupt_logins: AtomicBool::new(false),
            login_delay_ms: AtomicU64::new(0),
            needs_renewal: AtomicBool::new(false),
            fail_relogin: AtomicBool::new(false),
            keytab_logins: AtomicUsize::new(0),
            relogins: AtomicUsize::new(0),
            cache_logins: Mutex::new(Vec::new()),
        }
    }

    pub fn proxy(ambient_user: &str) -> Self {
        Self {
            proxy: true,
            ..Self::new(ambient_user)
        }
    }

    pub fn failing(ambient_user: &str) -> Self {
        let library = Self::new(ambient_user);
        library.fail_logins.store(true, Ordering::SeqCst);
        library
    }

    pub fn last_cache_login(&self) -> Option<(String, Option<PathBuf>)> {
        self.cache_logins.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl IdentityLibrary for FakeIdentityLibrary {
    async fn current_user(&self) -> Result<IdentityHandle> {
        let handle = IdentityHandle::new(self.ambient_user.as_str(), LoginMethod::Ambient);
        Ok(if self.proxy { handle.as_proxy() } else { handle })
    }

    async fn login_from_keytab(&self, principal: &str, _keytab: &Path) -> Result<IdentityHandle> {
        if self.fail_logins.load(Ordering::SeqCst) {
            return Err(CredentialError::login(principal, "KDC unreachable"));
        }
        self.keytab_logins.fetch_add(1, Ordering::SeqCst);
        Ok(IdentityHandle::new(principal, LoginMethod::Keytab))
    }

    async fn login_from_ticket_cache(
        &self,
        principal: &str,
        ticket_cache: Option<&Path>,
    ) -> Result<IdentityHandle> {
        let delay = self.login_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.interrupt_logins.load(Ordering::SeqCst) {
            return Err(CredentialError::Interrupted);
        }
        if self.fail_logins.load(Ordering::SeqCst) {
            return Err(CredentialError::login(principal, "no valid TGT in ticket cache"));
        }
        self.cache_logins
            .lock()
            .unwrap()
            .push((principal.to_owned(), ticket_cache.map(Path::to_path_buf)));
        Ok(IdentityHandle::new(principal, LoginMethod::TicketCache))
    }

    async fn tgt_needs_renewal(&self) -> Result<bool> {
        Ok(self.needs_renewal.load(Ordering::SeqCst))
    }

    async fn relogin_from_keytab(&self) -> Result<()> {
        if self.fail_relogin.load(Ordering::SeqCst) {
            return Err(CredentialError::login("svc", "keytab rejected"));
        }
        self.relogins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// ================================
/// Provider doubles
/// ================================
pub struct StaticProvider {
    pub service: String,
    pub validity: TimeDelta,
    pub issued_at: Option<DateTime<Utc>>,
    pub delay: Duration,
    pub required: bool,
    pub calls: AtomicUsize,
    pub starts: Mutex<Vec<DateTime<Utc>>>,
}

impl StaticProvider {
    pub fn new(service: &str, validity: TimeDelta) -> Self {
        Self {
            service: service.to_owned(),
            validity,
            issued_at: None,
            delay: Duration::ZERO,
            required: true,
            calls: AtomicUsize::new(0),
            starts: Mutex::new(Vec::new()),
        }
    }

    pub fn issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
        self.issued_at = Some(issued_at);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn not_required(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> Vec<DateTime<Utc>> {
        self.starts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialProvider for StaticProvider {
    fn service_name(&self) -> &str {
        &self.service
    }

    async fn requires_credentials(&self, _runtime: &RuntimeConfig) -> Result<bool, ProviderError> {
        Ok(self.required)
    }

    async fn obtain_tokens(
        &self,
        identity: &IdentityHandle,
        _runtime: &RuntimeConfig,
        creds: &mut CredentialBundle,
    ) -> Result<Option<DateTime<Utc>>, ProviderError> {
        let started = Utc::now();
        self.starts.lock().unwrap().push(started);
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let issued = self.issued_at.unwrap_or(started);
        let expires = issued + self.validity;
        let value = format!("{}:{}", self.service, identity.principal);
        creds.add_token(Token::new(self.service.as_str(), value.into_bytes(), issued, expires));
        Ok(Some(renewal_deadline(issued, expires)))
    }
}

pub enum Failure {
    Requires,
    Obtain,
    /// adds a token, then fails
    Partial,
    Panic,
}

pub struct FailingProvider {
    pub service: String,
    pub failure: Failure,
    pub calls: AtomicUsize,
}

impl FailingProvider {
    pub fn new(service: &str, failure: Failure) -> Self {
        Self {
            service: service.to_owned(),
            failure,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CredentialProvider for FailingProvider {
    fn service_name(&self) -> &str {
        &self.service
    }

    async fn requires_credentials(&self, _runtime: &RuntimeConfig) -> Result<bool, ProviderError> {
        match self.failure {
            Failure::Requires => Err(ProviderError::Unavailable("metastore down".to_owned())),
            _ => Ok(true),
        }
    }

    async fn obtain_tokens(
        &self,
        _identity: &IdentityHandle,
        _runtime: &RuntimeConfig,
        creds: &mut CredentialBundle,
    ) -> Result<Option<DateTime<Utc>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure {
            Failure::Partial => {
                let now = Utc::now();
                creds.add_token(Token::new(self.service.as_str(), b"half".to_vec(), now, now + TimeDelta::seconds(60)));
                Err(ProviderError::InvalidResponse("second token missing".to_owned()))
            }
            Failure::Panic => panic!("provider bug"),
            _ => Err(ProviderError::Unavailable("connection refused".to_owned())),
        }
    }
}

/// ================================
/// Distribution endpoint double
/// ================================
#[derive(Default)]
pub struct RecordingEndpoint {
    pub published: Mutex<Vec<(DateTime<Utc>, Arc<Vec<u8>>)>>,
}

impl RecordingEndpoint {
    pub fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.published.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    pub fn last_bundle(&self) -> Option<CredentialBundle> {
        self.published
            .lock()
            .unwrap()
            .last()
            .map(|(_, bytes)| CredentialBundle::from_bytes(bytes).unwrap())
    }
}

impl DistributionEndpoint for RecordingEndpoint {
    fn name(&self) -> &str {
        "recording"
    }

    fn publish(&self, bundle: Arc<Vec<u8>>) {
        self.published.lock().unwrap().push((Utc::now(), bundle));
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{CredentialError, Result};
use crate::identity::handle::IdentityHandle;
use crate::identity::library::IdentityLibrary;
use crate::utils::constants::{ENV_PRINCIPAL, ENV_TICKET_CACHE};

/// Path the selector takes to obtain an identity, decided from configuration
/// once and from the current process identity every round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginStrategy {
    Keytab { principal: String, keytab: PathBuf },
    TicketCache { principal: String, ticket_cache: Option<PathBuf> },
    Ambient,
}

/// Ticket cache overrides taken from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketCacheOverrides {
    pub ticket_cache: Option<PathBuf>,
    pub principal: Option<String>,
}

impl TicketCacheOverrides {
    pub fn from_env() -> Self {
        Self {
            ticket_cache: non_empty_env(ENV_TICKET_CACHE).map(|cache| {
                // MIT style "FILE:/path" prefix
                PathBuf::from(cache.strip_prefix("FILE:").unwrap_or(&cache))
            }),
            principal: non_empty_env(ENV_PRINCIPAL),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

pub struct LoginSelector {
    keytab: Option<(String, PathBuf)>,
    library: Arc<dyn IdentityLibrary>,
}

impl LoginSelector {
    /// Fails with [`CredentialError::Config`] unless principal and keytab are
    /// both set or both absent.
    pub fn new(
        principal: Option<String>,
        keytab: Option<PathBuf>,
        library: Arc<dyn IdentityLibrary>,
    ) -> Result<Self> {
        let keytab = match (principal, keytab) {
            (Some(principal), Some(keytab)) => Some((principal, keytab)),
            (None, None) => None,
            (Some(principal), None) => {
                return Err(CredentialError::config(format!(
                    "principal '{}' is set but keytab is missing; both or neither must be configured",
                    principal
                )))
            }
            (None, Some(keytab)) => {
                return Err(CredentialError::config(format!(
                    "keytab '{}' is set but principal is missing; both or neither must be configured",
                    keytab.display()
                )))
            }
        };
        Ok(Self { keytab, library })
    }

    pub fn uses_keytab(&self) -> bool {
        self.keytab.is_some()
    }

    pub fn library(&self) -> &Arc<dyn IdentityLibrary> {
        &self.library
    }

    /// Resolve which strategy applies right now.
    pub async fn select(&self) -> Result<LoginStrategy> {
        if let Some((principal, keytab)) = &self.keytab {
            return Ok(LoginStrategy::Keytab {
                principal: principal.clone(),
                keytab: keytab.clone(),
            });
        }

        let current = self.library.current_user().await?;
        if current.proxy {
            return Ok(LoginStrategy::Ambient);
        }

        let overrides = TicketCacheOverrides::from_env();
        Ok(LoginStrategy::TicketCache {
            principal: overrides.principal.unwrap_or(current.principal),
            ticket_cache: overrides.ticket_cache,
        })
    }

    /// Fresh identity for one round.
    pub async fn acquire_identity(&self) -> Result<IdentityHandle> {
        let strategy = self.select().await?;
        debug!("login strategy {:?}", strategy);
        match strategy {
            LoginStrategy::Keytab { principal, keytab } => {
                ensure_readable_file(&keytab).await?;
                self.library.login_from_keytab(&principal, &keytab).await
            }
            LoginStrategy::TicketCache { principal, ticket_cache } => {
                info!(principal = %principal, "loading credentials from ticket cache");
                self.library
                    .login_from_ticket_cache(&principal, ticket_cache.as_deref())
                    .await
            }
            LoginStrategy::Ambient => self.library.current_user().await,
        }
    }
}

async fn ensure_readable_file(path: &Path) -> Result<()> {
    let is_file = tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if !is_file || tokio::fs::File::open(path).await.is_err() {
        return Err(CredentialError::KeytabNotFound(path.to_owned()));
    }
    Ok(())
}

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::kerberos::KerberosConfig;
use crate::error::{CredentialError, Result};
use crate::identity::handle::{IdentityHandle, LoginMethod};
use crate::identity::library::IdentityLibrary;
use crate::utils::constants::{DEFAULT_TICKET_LIFETIME_SECS, TGT_RENEW_WINDOW};

#[derive(Debug, Clone)]
struct KeytabLogin {
    principal: String,
    keytab: PathBuf,
    logged_in_at: Instant,
}

/// Identity library backed by the host's `kinit` and `klist` binaries.
///
/// Keytab logins go to a private credential cache so that the ambient cache of
/// the user running the process is never overwritten.
#[derive(Debug)]
pub struct KinitIdentityLibrary {
    kinit: String,
    klist: String,
    credential_cache: PathBuf,
    ticket_lifetime: Duration,
    proxy_user: Option<String>,
    keytab_login: Mutex<Option<KeytabLogin>>,
}

impl KinitIdentityLibrary {
    pub fn new(config: &KerberosConfig) -> Self {
        let credential_cache = config.credential_cache.clone().unwrap_or_else(|| {
            std::env::temp_dir().join(format!("krb5cc_token_renewer_{}", std::process::id()))
        });
        Self {
            kinit: config.kinit_path.clone(),
            klist: config.klist_path.clone(),
            credential_cache,
            ticket_lifetime: Duration::from_secs(
                config.ticket_lifetime_seconds.unwrap_or(DEFAULT_TICKET_LIFETIME_SECS),
            ),
            proxy_user: config.proxy_user.clone(),
            keytab_login: Mutex::new(None),
        }
    }

    pub fn credential_cache(&self) -> &Path {
        &self.credential_cache
    }

    async fn run(&self, program: &str, args: Vec<OsString>) -> std::io::Result<Output> {
        debug!("running {} {:?}", program, args);
        Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
    }

    async fn kinit_keytab(&self, principal: &str, keytab: &Path) -> Result<()> {
        let args = vec![
            OsString::from("-k"),
            OsString::from("-t"),
            keytab.as_os_str().to_owned(),
            OsString::from("-c"),
            self.credential_cache.as_os_str().to_owned(),
            OsString::from(principal),
        ];
        let output = self
            .run(&self.kinit, args)
            .await
            .map_err(|err| CredentialError::login(principal, format!("{}: {}", self.kinit, err)))?;
        if output.status.code().is_none() {
            // killed by a signal, the process group is shutting down
            return Err(CredentialError::Interrupted);
        }
        if !output.status.success() {
            return Err(CredentialError::login(principal, stderr_of(&output)));
        }
        Ok(())
    }

    /// `klist -s` exits non-zero when the cache holds no valid TGT.
    async fn has_valid_tgt(&self, ticket_cache: Option<&Path>) -> std::io::Result<bool> {
        let mut args = vec![OsString::from("-s")];
        if let Some(cache) = ticket_cache {
            args.push(OsString::from("-c"));
            args.push(cache.as_os_str().to_owned());
        }
        Ok(self.run(&self.klist, args).await?.status.success())
    }

    async fn default_principal(&self) -> Option<String> {
        let output = self.run(&self.klist, Vec::new()).await.ok()?;
        if !output.status.success() {
            return None;
        }
        parse_default_principal(&String::from_utf8_lossy(&output.stdout))
    }

    fn last_keytab_login(&self) -> Option<KeytabLogin> {
        self.keytab_login
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn remember_keytab_login(&self, principal: &str, keytab: &Path) {
        let login = KeytabLogin {
            principal: principal.to_owned(),
            keytab: keytab.to_owned(),
            logged_in_at: Instant::now(),
        };
        match self.keytab_login.lock() {
            Ok(mut guard) => *guard = Some(login),
            Err(poisoned) => *poisoned.into_inner() = Some(login),
        }
    }
}

#[async_trait]
impl IdentityLibrary for KinitIdentityLibrary {
    async fn current_user(&self) -> Result<IdentityHandle> {
        if let Some(proxy_user) = &self.proxy_user {
            return Ok(IdentityHandle::new(proxy_user.as_str(), LoginMethod::Ambient).as_proxy());
        }
        let principal = match self.default_principal().await {
            Some(principal) => principal,
            None => std::env::var("USER")
                .map_err(|_| CredentialError::login("<ambient>", "cannot determine current user"))?,
        };
        Ok(IdentityHandle::new(principal, LoginMethod::Ambient))
    }

    async fn login_from_keytab(&self, principal: &str, keytab: &Path) -> Result<IdentityHandle> {
        self.kinit_keytab(principal, keytab).await?;
        self.remember_keytab_login(principal, keytab);
        info!(principal, "logged in from keytab '{}'", keytab.display());
        Ok(IdentityHandle::new(principal, LoginMethod::Keytab)
            .with_ticket_cache(self.credential_cache.clone()))
    }

    async fn login_from_ticket_cache(
        &self,
        principal: &str,
        ticket_cache: Option<&Path>,
    ) -> Result<IdentityHandle> {
        let valid = self
            .has_valid_tgt(ticket_cache)
            .await
            .map_err(|err| CredentialError::login(principal, format!("{}: {}", self.klist, err)))?;
        if !valid {
            return Err(CredentialError::login(principal, "no valid TGT in ticket cache"));
        }
        let handle = IdentityHandle::new(principal, LoginMethod::TicketCache);
        Ok(match ticket_cache {
            Some(cache) => handle.with_ticket_cache(cache),
            None => handle,
        })
    }

    async fn tgt_needs_renewal(&self) -> Result<bool> {
        let Some(login) = self.last_keytab_login() else {
            return Ok(false);
        };
        let renew_after = self.ticket_lifetime.mul_f64(TGT_RENEW_WINDOW);
        if login.logged_in_at.elapsed() >= renew_after {
            return Ok(true);
        }
        let valid = self
            .has_valid_tgt(Some(&self.credential_cache))
            .await
            .map_err(|err| CredentialError::login(&login.principal, err.to_string()))?;
        Ok(!valid)
    }

    async fn relogin_from_keytab(&self) -> Result<()> {
        let login = self
            .last_keytab_login()
            .ok_or_else(|| CredentialError::login("<none>", "no keytab login to renew"))?;
        self.kinit_keytab(&login.principal, &login.keytab).await?;
        self.remember_keytab_login(&login.principal, &login.keytab);
        info!(principal = %login.principal, "TGT renewed from keytab");
        Ok(())
    }
}

fn stderr_of(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr
    }
}

fn parse_default_principal(klist_stdout: &str) -> Option<String> {
    klist_stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("Default principal:"))
        .map(|principal| principal.trim().to_owned())
        .filter(|principal| !principal.is_empty())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_default_principal_from_klist() {
        let out = "Ticket cache: FILE:/tmp/krb5cc_1000\nDefault principal: alice@EXAMPLE.COM\n\nValid starting ...";
        assert_eq!(parse_default_principal(out), Some("alice@EXAMPLE.COM".to_owned()));
        assert_eq!(parse_default_principal("klist: No credentials cache found"), None);
    }

    #[tokio::test]
    async fn no_keytab_login_means_no_renewal() {
        let library = KinitIdentityLibrary::new(&KerberosConfig::default());
        assert!(!library.tgt_needs_renewal().await.unwrap());
        assert!(library.relogin_from_keytab().await.is_err());
    }

    #[tokio::test]
    async fn proxy_user_is_reported_as_delegated() {
        let config = KerberosConfig {
            proxy_user: Some("etl".to_owned()),
            ..KerberosConfig::default()
        };
        let user = KinitIdentityLibrary::new(&config).current_user().await.unwrap();
        assert!(user.proxy);
        assert_eq!(user.principal, "etl");
    }

    #[tokio::test]
    async fn missing_kinit_binary_is_a_login_failure() {
        let config = KerberosConfig {
            kinit_path: "/nonexistent/kinit".to_owned(),
            ..KerberosConfig::default()
        };
        let err = KinitIdentityLibrary::new(&config)
            .login_from_keytab("svc@EXAMPLE.COM", Path::new("/tmp/svc.keytab"))
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::LoginFailure { .. }));
    }
}

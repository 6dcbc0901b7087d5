use serde::Deserialize;
use std::path::PathBuf;

/// ================================
/// Kerberos identity
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct KerberosConfig {
    /// invariant: set together with `keytab` or not at all
    pub principal: Option<String>,
    pub keytab: Option<PathBuf>,
    /// the process runs as a delegated user and cannot derive its own TGT
    pub proxy_user: Option<String>,
    #[serde(default = "default_kinit")]
    pub kinit_path: String,
    #[serde(default = "default_klist")]
    pub klist_path: String,
    /// private cache for keytab logins
    pub credential_cache: Option<PathBuf>,
    pub ticket_lifetime_seconds: Option<u64>,
}

impl Default for KerberosConfig {
    fn default() -> Self {
        Self {
            principal: None,
            keytab: None,
            proxy_user: None,
            kinit_path: default_kinit(),
            klist_path: default_klist(),
            credential_cache: None,
            ticket_lifetime_seconds: None,
        }
    }
}

fn default_kinit() -> String {
    "kinit".to_owned()
}

fn default_klist() -> String {
    "klist".to_owned()
}

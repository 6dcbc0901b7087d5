use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RenewalMode {
    /// obtain once at start, never renew
    Disabled,
    Keytab,
    TicketCache,
}

/// ================================
/// Renewal schedule
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RenewalConfig {
    /// defaults to `keytab` when a keytab is configured, `ticket_cache` otherwise
    pub mode: Option<RenewalMode>,
    /// flat wait after a failed round
    pub retry_wait_seconds: Option<u64>,
    /// period of the TGT check for keytab logins
    pub relogin_period_seconds: Option<u64>,
    /// lower bound for any scheduled delay
    pub min_delay_ms: Option<u64>,
}

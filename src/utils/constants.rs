//! Shared constants and invariants

/// Fraction of a token's validity after which it is renewed.
pub const RENEWAL_FRACTION: f64 = 0.75;

/// Fraction of the TGT lifetime after which a keytab relogin is due.
pub const TGT_RENEW_WINDOW: f64 = 0.80;

pub const DEFAULT_RETRY_WAIT_SECS: u64 = 3600;
pub const DEFAULT_RELOGIN_PERIOD_SECS: u64 = 60;
pub const DEFAULT_MIN_DELAY_MS: u64 = 1000;
pub const DEFAULT_TICKET_LIFETIME_SECS: u64 = 24 * 3600;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;

// Environment overrides, read once per round
pub const ENV_TICKET_CACHE: &str = "KRB5CCNAME";
pub const ENV_PRINCIPAL: &str = "KRB5PRINCIPAL";

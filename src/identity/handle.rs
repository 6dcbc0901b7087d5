use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::helpers::time::now;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginMethod {
    Keytab,
    TicketCache,
    Ambient,
}

/// Logged-in principal used for exactly one acquisition round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityHandle {
    pub principal: String,
    pub method: LoginMethod,
    /// Delegated identity that cannot derive a TGT of its own.
    pub proxy: bool,
    pub ticket_cache: Option<PathBuf>,
    pub acquired_at: DateTime<Utc>,
}

impl IdentityHandle {
    pub fn new(principal: impl Into<String>, method: LoginMethod) -> Self {
        Self {
            principal: principal.into(),
            method,
            proxy: false,
            ticket_cache: None,
            acquired_at: now(),
        }
    }

    pub fn with_ticket_cache(mut self, ticket_cache: impl Into<PathBuf>) -> Self {
        self.ticket_cache = Some(ticket_cache.into());
        self
    }

    pub fn as_proxy(mut self) -> Self {
        self.proxy = true;
        self
    }

    /// Short user name, the principal without realm and instance.
    pub fn short_name(&self) -> &str {
        self.principal
            .split(['/', '@'])
            .next()
            .unwrap_or(self.principal.as_str())
    }
}

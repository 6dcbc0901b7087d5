use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credentials::token::Token;
use crate::helpers::time::earliest;

/// Ordered set of tokens keyed by service name.
///
/// Invariant: at most one token per service. Merging a token for a service that
/// is already present replaces it in place, so the first insertion fixes the
/// position and the last one fixes the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBundle {
    tokens: Vec<Token>,
}

impl CredentialBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_token(&mut self, token: Token) {
        match self.tokens.iter_mut().find(|t| t.service == token.service) {
            Some(existing) => *existing = token,
            None => self.tokens.push(token),
        }
    }

    /// Union by service name, `other` wins.
    pub fn merge(&mut self, other: CredentialBundle) {
        for token in other.tokens {
            self.add_token(token);
        }
    }

    pub fn get(&self, service: &str) -> Option<&Token> {
        self.tokens.iter().find(|t| t.service == service)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(|t| t.service.as_str())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Earliest renewal deadline over all tokens, `None` for an empty bundle.
    pub fn renewal_deadline(&self) -> Option<DateTime<Utc>> {
        self.tokens
            .iter()
            .map(Token::renew_at)
            .fold(None, |acc, at| earliest(acc, Some(at)))
    }

    /// Wire form handed to the distribution endpoint.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("serialize credential bundle")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context("deserialize credential bundle")
    }
}

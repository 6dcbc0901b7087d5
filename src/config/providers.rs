use http::Method;
use serde::Deserialize;
use std::collections::HashMap;

/// ================================
/// Providers
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: ProviderTypes,
    /// per-service switch, a disabled provider is never asked for tokens
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// whether the backend requires credentials when runtime security is on
    #[serde(default = "default_true")]
    pub required: bool,
    pub request: RequestConfig,
    pub parse: ParseConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTypes {
    Http,
}

/// HTTP request details
#[derive(Debug, Deserialize, Clone)]
pub struct RequestConfig {
    pub url: String,
    #[serde(with = "http_serde::method", default = "default_method")]
    pub method: Method,
    pub headers: Option<HashMap<String, GenericSourceValue>>,
    pub timeout_ms: Option<u64>,
}

/// Header value sources
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum GenericSourceValue {
    Literal {
        value: String,
    },
    FromEnv {
        from_env: String,
    },
    FromFile {
        path: String,
    },
    /// `{{principal}}`, `{{short_name}}`, `{{service}}`
    Template {
        template: String,
    },
}

/// ================================
/// Parsing - token, issue time, expiration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ParseConfig {
    /// JSON pointer, e.g. `/Token/urlString`
    pub token_pointer: String,
    #[serde(default)]
    pub token_encoding: TokenEncoding,
    /// unix seconds; fetch time when absent
    pub issued_at_pointer: Option<String>,
    /// seconds relative to the issue time
    pub expires_in_pointer: Option<String>,
    /// unix seconds
    pub expires_at_pointer: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenEncoding {
    #[default]
    Plain,
    Base64,
}

fn default_true() -> bool {
    true
}

fn default_method() -> Method {
    Method::GET
}

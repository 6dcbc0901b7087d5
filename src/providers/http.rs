use std::time::Duration;
use std::{env, fs};

use anyhow::anyhow;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::info;

use crate::config::providers::{GenericSourceValue, ParseConfig, ProviderConfig, TokenEncoding};
use crate::config::runtime::RuntimeConfig;
use crate::credentials::{CredentialBundle, Token};
use crate::error::ProviderError;
use crate::helpers::time::now;
use crate::identity::IdentityHandle;
use crate::providers::CredentialProvider;
use crate::utils::constants::DEFAULT_HTTP_TIMEOUT_MS;

/// Provider that fetches a delegation token from an HTTP token endpoint and
/// extracts it from the JSON response with JSON pointers.
#[derive(Debug, Clone)]
pub struct HttpTokenProvider {
    service: String,
    config: ProviderConfig,
    client: Client,
}

impl HttpTokenProvider {
    pub fn new(service: impl Into<String>, config: ProviderConfig, client: Client) -> Self {
        Self {
            service: service.into(),
            config,
            client,
        }
    }
}

#[async_trait]
impl CredentialProvider for HttpTokenProvider {
    fn service_name(&self) -> &str {
        &self.service
    }

    async fn requires_credentials(&self, runtime: &RuntimeConfig) -> Result<bool, ProviderError> {
        Ok(self.config.required && runtime.security_enabled)
    }

    async fn obtain_tokens(
        &self,
        identity: &IdentityHandle,
        _runtime: &RuntimeConfig,
        creds: &mut CredentialBundle,
    ) -> Result<Option<DateTime<Utc>>, ProviderError> {
        let req_cfg = &self.config.request;
        let timeout = Duration::from_millis(req_cfg.timeout_ms.unwrap_or(DEFAULT_HTTP_TIMEOUT_MS));
        let mut request = self
            .client
            .request(req_cfg.method.clone(), &req_cfg.url)
            .timeout(timeout);

        // Build headers dynamically
        if let Some(headers) = &req_cfg.headers {
            for (key, v) in headers {
                let value = prepare_generic_source_value(v, identity, &self.service)?;
                request = request.header(key, value);
            }
        }

        let fetched_at = now();
        let response = request
            .send()
            .await
            .map_err(|err| ProviderError::Unavailable(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ProviderError::Unavailable(format!(
                "HTTP request failed: {}",
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|err| ProviderError::Unavailable(err.to_string()))?;

        let token = parse_token(&self.service, &body, &self.config.parse, fetched_at)?;
        let renew_at = token.renew_at();
        info!(
            service = %self.service,
            principal = %identity.principal,
            "obtained token, expires at {}",
            token.expires_at
        );
        creds.add_token(token);
        Ok(Some(renew_at))
    }
}

fn prepare_generic_source_value(
    value: &GenericSourceValue,
    identity: &IdentityHandle,
    service: &str,
) -> Result<String, ProviderError> {
    match value {
        GenericSourceValue::Literal { value } => Ok(value.to_owned()),
        GenericSourceValue::FromEnv { from_env } => env::var(from_env)
            .map_err(|err| ProviderError::Other(anyhow!("env '{}': {}", from_env, err))),
        GenericSourceValue::FromFile { path } => fs::read_to_string(path)
            .map(|res| res.trim().to_string())
            .map_err(|err| ProviderError::Other(anyhow!("file '{}': {}", path, err))),
        GenericSourceValue::Template { template } => Ok(render_template(template, identity, service)),
    }
}

fn render_template(template: &str, identity: &IdentityHandle, service: &str) -> String {
    let regex = regex::Regex::new(r"\{\{\s*([a-zA-Z_]+)\s*\}\}").expect("static template regex");
    regex
        .replace_all(template, |caps: &regex::Captures| match &caps[1] {
            "principal" => identity.principal.clone(),
            "short_name" => identity.short_name().to_owned(),
            "service" => service.to_owned(),
            _ => caps[0].to_owned(),
        })
        .to_string()
}

/// Extract a token from a JSON body according to `parse`.
pub fn parse_token(
    service: &str,
    body: &str,
    parse: &ParseConfig,
    fetched_at: DateTime<Utc>,
) -> Result<Token, ProviderError> {
    let json: Value = serde_json::from_str(body)
        .map_err(|err| ProviderError::InvalidResponse(format!("body is not JSON: {}", err)))?;

    let raw = json
        .pointer(&parse.token_pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| missing(&parse.token_pointer))?;
    let bytes = match parse.token_encoding {
        TokenEncoding::Plain => raw.as_bytes().to_vec(),
        TokenEncoding::Base64 => STANDARD
            .decode(raw)
            .map_err(|err| ProviderError::InvalidResponse(format!("token is not base64: {}", err)))?,
    };

    let issued_at = match &parse.issued_at_pointer {
        Some(pointer) => unix_seconds(integer_at(&json, pointer)?)?,
        None => fetched_at,
    };

    let expires_at = match (&parse.expires_at_pointer, &parse.expires_in_pointer) {
        (Some(pointer), _) => unix_seconds(integer_at(&json, pointer)?)?,
        (None, Some(pointer)) => {
            let secs = integer_at(&json, pointer)?;
            TimeDelta::try_seconds(secs)
                .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
                .ok_or_else(|| ProviderError::InvalidResponse(format!("'{}' of {}s is out of range", pointer, secs)))?
        }
        (None, None) => {
            return Err(ProviderError::InvalidResponse(
                "no expiration pointer configured".to_owned(),
            ))
        }
    };

    Ok(Token::new(service, bytes, issued_at, expires_at))
}

/// Numbers may come as JSON numbers or numeric strings.
fn integer_at(json: &Value, pointer: &str) -> Result<i64, ProviderError> {
    let value = json.pointer(pointer).ok_or_else(|| missing(pointer))?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| {
            ProviderError::InvalidResponse(format!("'{}' is not an integer: {}", pointer, value))
        })
}

fn unix_seconds(secs: i64) -> Result<DateTime<Utc>, ProviderError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| ProviderError::InvalidResponse(format!("timestamp {} out of range", secs)))
}

fn missing(pointer: &str) -> ProviderError {
    ProviderError::InvalidResponse(format!("field '{}' is absent", pointer))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::identity::LoginMethod;

    fn parse_cfg() -> ParseConfig {
        ParseConfig {
            token_pointer: "/token".to_owned(),
            token_encoding: TokenEncoding::Plain,
            issued_at_pointer: None,
            expires_in_pointer: Some("/expires_in".to_owned()),
            expires_at_pointer: None,
        }
    }

    #[test]
    fn parses_relative_expiry_from_fetch_time() {
        let fetched = Utc::now();
        let token = parse_token("hive", r#"{"token":"abc","expires_in":"600"}"#, &parse_cfg(), fetched).unwrap();
        assert_eq!(token.bytes, b"abc".to_vec());
        assert_eq!(token.issued_at, fetched);
        assert_eq!(token.expires_at, fetched + TimeDelta::seconds(600));
    }

    #[test]
    fn parses_absolute_times_and_base64() {
        let cfg = ParseConfig {
            token_pointer: "/Token/urlString".to_owned(),
            token_encoding: TokenEncoding::Base64,
            issued_at_pointer: Some("/Token/issued".to_owned()),
            expires_in_pointer: None,
            expires_at_pointer: Some("/Token/expires".to_owned()),
        };
        let body = r#"{"Token":{"urlString":"AAEC","issued":1700000000,"expires":1700003600}}"#;
        let token = parse_token("hdfs", body, &cfg, Utc::now()).unwrap();
        assert_eq!(token.bytes, vec![0u8, 1, 2]);
        assert_eq!(token.issued_at.timestamp(), 1_700_000_000);
        assert_eq!(token.expires_at.timestamp(), 1_700_003_600);
    }

    #[test]
    fn out_of_range_lifetime_is_invalid_response() {
        for body in [
            r#"{"token":"abc","expires_in":9223372036854775807}"#,
            r#"{"token":"abc","expires_in":"-9223372036854775808"}"#,
            r#"{"token":"abc","expires_in":9000000000000000}"#,
        ] {
            let err = parse_token("hive", body, &parse_cfg(), Utc::now()).unwrap_err();
            assert!(matches!(err, ProviderError::InvalidResponse(_)), "{}", body);
        }
    }

    #[test]
    fn missing_token_is_invalid_response() {
        let err = parse_token("hive", r#"{"expires_in":60}"#, &parse_cfg(), Utc::now()).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn template_renders_identity_fields() {
        let identity = IdentityHandle::new("etl/host@EXAMPLE.COM", LoginMethod::Keytab);
        assert_eq!(
            render_template("{{short_name}}:{{ service }}:{{principal}}:{{other}}", &identity, "kafka"),
            "etl:kafka:etl/host@EXAMPLE.COM:{{other}}"
        );
    }
}

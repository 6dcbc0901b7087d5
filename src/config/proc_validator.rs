//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Kerberos: principal/keytab pairing, renewal mode consistency
//! - Renewal: positive durations
//! - Providers: url, method, header values, JSON pointers, expiry source
//! - Publishers: paths / urls per type, unique targets
//! - Settings: logging level, metrics path, server address

use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use tracing::{error, info};

use crate::config::kerberos::KerberosConfig;
use crate::config::providers::{GenericSourceValue, ProviderConfig};
use crate::config::publishers::{PublisherConfig, PublisherType};
use crate::config::renewal::{RenewalConfig, RenewalMode};
use crate::config::settings::SettingsConfig;
use crate::config::types::ServiceConfig;

const TEMPLATE_VARIABLES: [&str; 3] = ["principal", "short_name", "service"];

/// Returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_kerberos(&cfg.kerberos, &cfg.renewal, &mut errors);
    validate_renewal(&cfg.renewal, &mut errors);

    for (service, provider_cfg) in &cfg.providers {
        validate_provider(service, provider_cfg, &mut errors);
    }

    // two publishers writing the same target would race each other
    let mut targets: HashMap<String, String> = HashMap::new();
    for (publisher_id, publisher_cfg) in &cfg.publishers {
        validate_publisher(publisher_id, publisher_cfg, &mut errors);
        let target = publisher_cfg
            .path
            .clone()
            .or_else(|| publisher_cfg.url.clone());
        if let Some(target) = target {
            if let Some(prev) = targets.insert(target.clone(), publisher_id.clone()) {
                errors.push(format!(
                    "publishers['{}'] and publishers['{}'] both target '{}'",
                    prev, publisher_id, target
                ));
            }
        }
    }

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        Err(errors)
    }
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if let Some(server) = &settings.server {
        if server.host.trim().is_empty() {
            errors.push("settings.server.host must not be empty".to_owned());
        }
        if server.port.parse::<u16>().is_err() {
            errors.push(format!(
                "settings.server.port '{}' must be an integer in range 0-65535",
                server.port
            ));
        }
    }

    // metrics endpoint start with '/'
    let metrics = &settings.metrics;
    if !metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            metrics.path
        ));
    }
    if metrics.is_enabled && settings.server.is_none() {
        errors.push("settings.metrics.is_enabled requires settings.server".to_owned());
    }

    // logging level
    if let Some(logging) = &settings.logging {
        let valid = ["trace", "debug", "info", "warn", "error"];
        if !valid.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' invalid; allowed: {:?}",
                logging.level, valid
            ));
        }
    }
}

/// KERBEROS VALIDATION
fn validate_kerberos(kerberos: &KerberosConfig, renewal: &RenewalConfig, errors: &mut Vec<String>) {
    let has_principal = kerberos.principal.as_deref().is_some_and(|p| !p.trim().is_empty());
    let has_keytab = kerberos.keytab.is_some();

    if has_principal != has_keytab {
        errors.push(
            "kerberos.principal and kerberos.keytab must be set together or not at all".to_owned(),
        );
    }
    if renewal.mode == Some(RenewalMode::Keytab) && !(has_principal && has_keytab) {
        errors.push("renewal.mode 'keytab' requires kerberos.principal and kerberos.keytab".to_owned());
    }
    if has_keytab && kerberos.proxy_user.is_some() {
        errors.push("kerberos.proxy_user cannot be combined with a keytab login".to_owned());
    }
    if kerberos.ticket_lifetime_seconds == Some(0) {
        errors.push("kerberos.ticket_lifetime_seconds must be > 0".to_owned());
    }
    if let Some(cache) = &kerberos.credential_cache {
        if !cache.is_absolute() {
            errors.push(format!(
                "kerberos.credential_cache '{}' must be an absolute path",
                cache.display()
            ));
        }
    }
}

/// RENEWAL VALIDATION
fn validate_renewal(renewal: &RenewalConfig, errors: &mut Vec<String>) {
    let durations = [
        ("renewal.retry_wait_seconds", renewal.retry_wait_seconds),
        ("renewal.relogin_period_seconds", renewal.relogin_period_seconds),
        ("renewal.min_delay_ms", renewal.min_delay_ms),
    ];
    for (path, value) in durations {
        if value == Some(0) {
            errors.push(format!("{} must be > 0", path));
        }
    }
}

/// PROVIDER BASICS
fn validate_provider(service: &str, cfg: &ProviderConfig, errors: &mut Vec<String>) {
    let url = cfg.request.url.trim();
    if url.is_empty() {
        errors.push(format!("providers.{}: request.url cannot be empty", service));
    } else if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(format!(
            "providers.{}: request.url '{}' must start with http:// or https://",
            service, url
        ));
    }

    match cfg.request.method.as_str() {
        "GET" | "POST" => {}
        m => errors.push(format!(
            "providers.{}: request.method '{}' must be 'GET' or 'POST'",
            service, m
        )),
    }

    if let Some(headers) = &cfg.request.headers {
        for (k, v) in headers {
            validate_generic_source_value(
                &format!("providers.{}.request.headers.{}", service, k),
                v,
                errors,
            );
        }
    }

    let parse = &cfg.parse;
    let pointers = [
        ("token_pointer", Some(&parse.token_pointer)),
        ("issued_at_pointer", parse.issued_at_pointer.as_ref()),
        ("expires_in_pointer", parse.expires_in_pointer.as_ref()),
        ("expires_at_pointer", parse.expires_at_pointer.as_ref()),
    ];
    for (name, pointer) in pointers {
        if let Some(pointer) = pointer {
            if !pointer.is_empty() && !pointer.starts_with('/') {
                errors.push(format!(
                    "providers.{}: parse.{} '{}' must be a JSON pointer starting with '/'",
                    service, name, pointer
                ));
            }
        }
    }
    match (&parse.expires_in_pointer, &parse.expires_at_pointer) {
        (Some(_), Some(_)) => errors.push(format!(
            "providers.{}: parse.expires_in_pointer and parse.expires_at_pointer are mutually exclusive",
            service
        )),
        (None, None) => errors.push(format!(
            "providers.{}: one of parse.expires_in_pointer or parse.expires_at_pointer is required",
            service
        )),
        _ => {}
    }
}

fn validate_generic_source_value(path: &str, value: &GenericSourceValue, errors: &mut Vec<String>) {
    match value {
        GenericSourceValue::Literal { .. } => {}
        GenericSourceValue::FromEnv { from_env } => {
            if from_env.trim().is_empty() {
                errors.push(format!("{}: from_env must name a variable", path));
            }
        }
        GenericSourceValue::FromFile { path: file } => {
            if !Path::new(file).is_absolute() {
                errors.push(format!("{}: path '{}' must be absolute", path, file));
            }
        }
        GenericSourceValue::Template { template } => {
            validate_template_placeholders(path, template, errors);
        }
    }
}

fn validate_template_placeholders(path: &str, template: &str, errors: &mut Vec<String>) {
    let re = Regex::new(r"\{\{\s*([a-zA-Z0-9_\.]+)\s*\}\}").expect("static template regex");
    for caps in re.captures_iter(template) {
        let var = &caps[1];
        if !TEMPLATE_VARIABLES.contains(&var) {
            errors.push(format!(
                "{}: unknown template variable '{}'; allowed: {:?}",
                path, var, TEMPLATE_VARIABLES
            ));
        }
    }
}

/// PUBLISHER BASICS
fn validate_publisher(publisher_id: &str, cfg: &PublisherConfig, errors: &mut Vec<String>) {
    match cfg.publisher_type {
        PublisherType::File | PublisherType::Uds => match &cfg.path {
            Some(path) if Path::new(path).is_absolute() => {}
            Some(path) => errors.push(format!(
                "publishers.{}: path '{}' must be absolute",
                publisher_id, path
            )),
            None => errors.push(format!("publishers.{}: path is required", publisher_id)),
        },
        PublisherType::Http => match &cfg.url {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {}
            Some(url) => errors.push(format!(
                "publishers.{}: url '{}' must start with http:// or https://",
                publisher_id, url
            )),
            None => errors.push(format!("publishers.{}: url is required", publisher_id)),
        },
    }
}

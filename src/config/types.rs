use serde::Deserialize;
use std::collections::BTreeMap;

use crate::config::{
    kerberos::KerberosConfig, providers::ProviderConfig, publishers::PublisherConfig,
    renewal::RenewalConfig, runtime::RuntimeConfig, settings::SettingsConfig,
};

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub kerberos: KerberosConfig,
    #[serde(default)]
    pub renewal: RenewalConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// service name -> provider
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    /// publisher id -> publisher
    #[serde(default)]
    pub publishers: BTreeMap<String, PublisherConfig>,
}

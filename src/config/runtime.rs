use serde::Deserialize;
use std::collections::HashMap;

/// Job runtime settings handed to every provider.
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// false when the job targets services with security turned off
    #[serde(default = "default_security_enabled")]
    pub security_enabled: bool,
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl RuntimeConfig {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            security_enabled: default_security_enabled(),
            options: HashMap::new(),
        }
    }
}

fn default_security_enabled() -> bool {
    true
}

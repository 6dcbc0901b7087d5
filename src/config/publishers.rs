use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PublisherType {
    File,
    Uds,
    Http,
}

/// Where serialized bundles are pushed after every successful round.
#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    /// filled from the map key
    #[serde(default)]
    pub publisher_id: String,
    #[serde(rename = "type")]
    pub publisher_type: PublisherType,
    /// `file`/`uds`: absolute filesystem path
    pub path: Option<String>,
    /// `http`: endpoint receiving a POST with the bundle
    pub url: Option<String>,
    pub timeout_ms: Option<u64>,
}

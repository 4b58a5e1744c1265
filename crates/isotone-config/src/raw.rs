use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    pub backend: Option<RawBackend>,
    pub auto_start: Option<bool>,
    pub socket_dir: Option<String>,
    pub poller: Option<RawPoller>,
    pub timeouts: Option<RawTimeouts>,
    pub publisher: Option<RawPublisher>,
    pub services: BTreeMap<String, RawService>,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RawBackend {
    Systemd,
    Windows,
    Simulated,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawPoller {
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawTimeouts {
    pub start: Option<u64>,
    pub stop: Option<u64>,
    pub probe: Option<u64>,
    pub install: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawPublisher {
    pub capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawService {
    pub unit: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub ports: Option<Vec<u16>>,
    pub category: Option<RawCategory>,
    pub install: Option<Vec<String>>,
    pub uninstall: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RawCategory {
    Web,
    Database,
    Mail,
    Tool,
}

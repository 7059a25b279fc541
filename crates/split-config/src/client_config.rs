use std::str::FromStr;

use serde::Deserialize;

use crate::logging::LoggingConfig;
use crate::remote::{AdvancedConfig, RemoteConfig};
use crate::validate;

/// Storage backend selector. `InMemory` spawns the mutex-guarded in-process
/// storages from `split-core`; `Remote` spawns the Redis-backed storages in
/// `split-runtime::remote`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationMode {
    InMemory,
    Remote,
}

// ---------------------------------------------------------------------------
// Raw TOML structure (intermediate representation)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ClientConfigRaw {
    operation_mode: OperationMode,
    labels_enabled: bool,
    split_sync_period_sec: u64,
    segment_sync_period_sec: u64,
    impressions_flush_period_sec: u64,
    counters_flush_period_sec: u64,
    gauges_flush_period_sec: u64,
    latencies_flush_period_sec: u64,
    remote: RemoteConfig,
    advanced: AdvancedConfig,
    instance_id: String,
    sdk_version_tag: String,
    logging: LoggingConfig,
}

impl Default for ClientConfigRaw {
    fn default() -> Self {
        Self {
            operation_mode: OperationMode::InMemory,
            labels_enabled: true,
            split_sync_period_sec: 60,
            segment_sync_period_sec: 60,
            impressions_flush_period_sec: 60,
            counters_flush_period_sec: 60,
            gauges_flush_period_sec: 60,
            latencies_flush_period_sec: 60,
            remote: RemoteConfig::default(),
            advanced: AdvancedConfig::default(),
            instance_id: "unassigned".to_string(),
            sdk_version_tag: "split-rust-0.1.0".to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// ClientConfig (resolved, validated)
// ---------------------------------------------------------------------------

/// The SDK configuration object, parsed from a TOML document with the same
/// raw/resolved split used elsewhere in this codebase for config layers
/// that need validation beyond what `serde` alone expresses.
#[derive(Debug)]
pub struct ClientConfig {
    pub operation_mode: OperationMode,
    pub labels_enabled: bool,
    pub split_sync_period_sec: u64,
    pub segment_sync_period_sec: u64,
    pub impressions_flush_period_sec: u64,
    pub counters_flush_period_sec: u64,
    pub gauges_flush_period_sec: u64,
    pub latencies_flush_period_sec: u64,
    pub remote: RemoteConfig,
    pub advanced: AdvancedConfig,
    pub instance_id: String,
    pub sdk_version_tag: String,
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Read and parse a client config TOML file.
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.as_ref().display()))?;
        content.parse()
    }
}

impl FromStr for ClientConfig {
    type Err = anyhow::Error;

    /// Parse a TOML string into a resolved, validated [`ClientConfig`].
    fn from_str(toml_str: &str) -> anyhow::Result<Self> {
        let raw: ClientConfigRaw = toml::from_str(toml_str)?;

        let config = ClientConfig {
            operation_mode: raw.operation_mode,
            labels_enabled: raw.labels_enabled,
            split_sync_period_sec: raw.split_sync_period_sec,
            segment_sync_period_sec: raw.segment_sync_period_sec,
            impressions_flush_period_sec: raw.impressions_flush_period_sec,
            counters_flush_period_sec: raw.counters_flush_period_sec,
            gauges_flush_period_sec: raw.gauges_flush_period_sec,
            latencies_flush_period_sec: raw.latencies_flush_period_sec,
            remote: raw.remote,
            advanced: raw.advanced,
            instance_id: raw.instance_id,
            sdk_version_tag: raw.sdk_version_tag,
            logging: raw.logging,
        };

        validate::validate(&config)?;

        Ok(config)
    }
}

impl Default for ClientConfig {
    /// The documented defaults, usable without a config file at all (e.g.
    /// in tests, or an embedding application that only wants in-memory mode
    /// with every period at its default).
    fn default() -> Self {
        let raw = ClientConfigRaw::default();
        ClientConfig {
            operation_mode: raw.operation_mode,
            labels_enabled: raw.labels_enabled,
            split_sync_period_sec: raw.split_sync_period_sec,
            segment_sync_period_sec: raw.segment_sync_period_sec,
            impressions_flush_period_sec: raw.impressions_flush_period_sec,
            counters_flush_period_sec: raw.counters_flush_period_sec,
            gauges_flush_period_sec: raw.gauges_flush_period_sec,
            latencies_flush_period_sec: raw.latencies_flush_period_sec,
            remote: raw.remote,
            advanced: raw.advanced,
            instance_id: raw.instance_id,
            sdk_version_tag: raw.sdk_version_tag,
            logging: raw.logging,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

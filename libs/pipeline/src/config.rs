use std::time::Duration;

use serde::Deserialize;

use bridge_api::TableOptions;

// ═══════════════════════════════════════════════════════════════
//  Storage Config
// ═══════════════════════════════════════════════════════════════

/// Column family layout of every mirrored table.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_column_family")]
    pub column_family: String,
    /// Column qualifier holding the message body.
    #[serde(default = "default_column")]
    pub column: String,
    #[serde(default = "default_max_versions")]
    pub max_versions: u32,
    #[serde(default = "default_min_versions")]
    pub min_versions: u32,
    /// Cell TTL in seconds. Absent = keep forever.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

impl StorageConfig {
    pub fn table_options(&self) -> TableOptions {
        TableOptions {
            column_family: self.column_family.clone(),
            column: self.column.clone(),
            max_versions: self.max_versions,
            min_versions: self.min_versions,
            time_to_live: self.ttl_secs.map(Duration::from_secs),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_versions == 0 {
            return Err("storage: max_versions must be at least 1".into());
        }
        if self.min_versions > self.max_versions {
            return Err(format!(
                "storage: min_versions ({}) exceeds max_versions ({})",
                self.min_versions, self.max_versions
            ));
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            column_family: default_column_family(),
            column: default_column(),
            max_versions: default_max_versions(),
            min_versions: default_min_versions(),
            ttl_secs: None,
        }
    }
}

fn default_column_family() -> String {
    "cf".into()
}
fn default_column() -> String {
    "record".into()
}
fn default_max_versions() -> u32 {
    10
}
fn default_min_versions() -> u32 {
    1
}

// ═══════════════════════════════════════════════════════════════
//  Pipeline Config
// ═══════════════════════════════════════════════════════════════

/// Poll loop behaviour and the optional validation gate.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Sleep after an empty poll.
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,
    /// Stop the loop at the first empty poll (replay mode).
    #[serde(default)]
    pub exit_when_idle: bool,
    /// Dot-notation paths every document must contain. Empty = no gate.
    #[serde(default)]
    pub required_fields: Vec<String>,
}

impl PipelineConfig {
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            idle_backoff_ms: default_idle_backoff_ms(),
            exit_when_idle: false,
            required_fields: Vec::new(),
        }
    }
}

fn default_idle_backoff_ms() -> u64 {
    100
}

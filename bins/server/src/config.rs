use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use bridge_api::TableName;
pub use broker_memory::MemoryBrokerConfig;
pub use pipeline::config::{PipelineConfig, StorageConfig};

use crate::error::BridgeError;

#[derive(Parser)]
#[command(name = "cdc-bridge", about = "Mirror CDC topics into a versioned wide-column store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bridge until Ctrl+C (or until idle, see `exit_when_idle`)
    Run(RunArgs),
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml", env = "CONFIG_PATH")]
    pub config: String,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct BridgeConfig {
    pub broker: MemoryBrokerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl BridgeConfig {
    pub fn load(path: &str) -> Result<Self, BridgeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content)
            .map_err(|e| BridgeError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Startup checks that would otherwise surface mid-run.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.broker.topics.is_empty() {
            return Err(BridgeError::Config { context: "broker", detail: "no topics subscribed".into() });
        }
        for topic in &self.broker.topics {
            TableName::from_topic(topic).map_err(|e| BridgeError::Config {
                context: "broker",
                detail: e.message().to_string(),
            })?;
        }
        if self.broker.max_poll_records == 0 {
            return Err(BridgeError::Config {
                context: "broker",
                detail: "max_poll_records must be at least 1".into(),
            });
        }
        self.storage
            .validate()
            .map_err(|detail| BridgeError::Config { context: "storage", detail })
    }
}

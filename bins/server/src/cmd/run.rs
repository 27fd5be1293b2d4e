use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use broker_memory::MemoryBroker;
use codec_json::{JsonDocumentParser, RequiredFieldsValidator};
use pipeline::{BatchProcessor, provision_tables, run_bridge};
use storage_memory::MemoryStore;

use crate::config::{BridgeConfig, RunArgs};
use crate::error::BridgeError;

pub async fn run(args: RunArgs) -> Result<(), BridgeError> {
    tracing::info!("cdc-bridge starting");

    // --- Load config ---
    let config = BridgeConfig::load(&args.config)?;
    config.validate()?;
    tracing::info!(config = %args.config, topics = config.broker.topics.len(), "loaded config");

    // --- Store + tables ---
    let store = Arc::new(MemoryStore::new());
    let tables = provision_tables(
        store.as_ref(),
        &config.broker.topics,
        &config.storage.table_options(),
    )
    .await?;

    // --- Broker ---
    let broker = Arc::new(MemoryBroker::open(&config.broker).await?);
    tracing::info!(lag = broker.lag().await, "broker ready");

    // --- Processor ---
    let mut processor = BatchProcessor::new(store.clone(), broker.clone(), Arc::new(JsonDocumentParser));
    if !config.pipeline.required_fields.is_empty() {
        tracing::info!(fields = ?config.pipeline.required_fields, "document validation enabled");
        processor = processor.with_validator(Arc::new(RequiredFieldsValidator::new(
            config.pipeline.required_fields.clone(),
        )));
    }

    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();
    let signal_token = token.clone();
    let watcher = tokio::spawn(async move {
        let result = tokio::signal::ctrl_c().await;
        if result.is_ok() {
            tracing::info!("shutting down...");
        }
        signal_token.cancel();
        result
    });

    let stats = run_bridge(&processor, &config.pipeline, token).await?;

    if watcher.is_finished() {
        if let Ok(Err(e)) = watcher.await {
            return Err(BridgeError::Signal(e));
        }
    } else {
        watcher.abort();
    }

    for table in &tables {
        tracing::info!(table = %table, rows = store.row_count(table).await.unwrap_or(0), "table summary");
    }
    tracing::info!(
        cycles = stats.cycles,
        messages = stats.messages,
        rows = stats.rows_written,
        skipped = stats.skipped.total(),
        rewound = stats.partitions_rewound,
        lag = broker.lag().await,
        "shutdown complete"
    );
    Ok(())
}

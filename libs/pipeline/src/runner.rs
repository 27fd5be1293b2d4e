use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::processor::{BatchProcessor, CycleStats};
use crate::PipelineError;

// ═══════════════════════════════════════════════════════════════
//  Poll loop — broker.poll() → process_batch() → repeat
// ═══════════════════════════════════════════════════════════════

/// Run poll cycles until `token` is cancelled (or, with `exit_when_idle`,
/// until the first empty poll). Returns the accumulated counters.
///
/// Cancellation is checked between cycles only: a cycle that has started
/// always finishes its writes and commits/rewinds. I/O errors from `poll`
/// are retried after the idle backoff; any other error ends the loop. A
/// cycle in which every partition was rewound is also followed by the idle
/// backoff.
pub async fn run_bridge(
    processor: &BatchProcessor,
    config: &PipelineConfig,
    token: CancellationToken,
) -> Result<CycleStats, PipelineError> {
    let broker = processor.broker().clone();
    let backoff = config.idle_backoff();
    let mut total = CycleStats::default();

    loop {
        let polled = tokio::select! {
            polled = broker.poll() => polled,
            _ = token.cancelled() => break,
        };

        let batch = match polled {
            Ok(batch) => batch,
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, "poll failed, retrying");
                if backoff_or_cancel(&token, backoff).await {
                    break;
                }
                continue;
            }
            Err(e) => return Err(PipelineError::Poll(e)),
        };

        if batch.is_empty() {
            if config.exit_when_idle {
                tracing::info!("no more messages");
                break;
            }
            if backoff_or_cancel(&token, backoff).await {
                break;
            }
            continue;
        }

        let stats = processor.process_batch(batch).await?;
        tracing::info!(
            messages = stats.messages,
            rows = stats.rows_written,
            skipped = stats.skipped.total(),
            committed = stats.partitions_committed,
            rewound = stats.partitions_rewound,
            "cycle done"
        );
        total.merge(&stats);

        // Nothing committed: back off before re-reading the rewound range.
        if stats.partitions_rewound > 0 && stats.partitions_committed == 0 {
            if backoff_or_cancel(&token, backoff).await {
                break;
            }
        }
    }

    tracing::info!(cycles = total.cycles, messages = total.messages, rows = total.rows_written, "bridge stopped");
    Ok(total)
}

/// Sleep for `backoff`; `true` if the token fired first.
async fn backoff_or_cancel(token: &CancellationToken, backoff: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(backoff) => false,
        _ = token.cancelled() => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bridge_api::{
        BrokerClient, ClientError, RowRecord, StorageSink, TableName, TableOptions, TopicPartition,
    };
    use broker_memory::{MemoryBroker, MemoryBrokerConfig};
    use bytes::Bytes;
    use codec_json::JsonDocumentParser;
    use storage_memory::MemoryStore;

    use crate::provision_tables;

    const TOPIC: &str = "mongo.shop.orders";

    /// Fails the first `failures` batch writes, and every write to the
    /// `down` namespace, then delegates.
    struct FlakySink {
        inner: MemoryStore,
        failures: AtomicUsize,
        down: Option<&'static str>,
    }

    impl FlakySink {
        fn failing_first(failures: usize) -> Arc<Self> {
            Arc::new(Self { inner: MemoryStore::new(), failures: AtomicUsize::new(failures), down: None })
        }

        fn namespace_down(namespace: &'static str) -> Arc<Self> {
            Arc::new(Self { inner: MemoryStore::new(), failures: AtomicUsize::new(0), down: Some(namespace) })
        }
    }

    impl StorageSink for FlakySink {
        fn ensure_namespace(&self, name: &str)
            -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>
        {
            self.inner.ensure_namespace(name)
        }

        fn ensure_table(&self, table: &TableName, options: &TableOptions)
            -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>
        {
            self.inner.ensure_table(table, options)
        }

        fn write_batch(&self, table: &TableName, rows: Vec<RowRecord>)
            -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>
        {
            if self.down == Some(table.namespace.as_str()) {
                return Box::pin(async { Err(ClientError::io("region offline")) });
            }
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Box::pin(async { Err(ClientError::io("region server unavailable")) });
            }
            self.inner.write_batch(table, rows)
        }

        fn write_versioned_cell(&self, table: &TableName, key: Bytes, body: Bytes, version: i64)
            -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>
        {
            self.inner.write_versioned_cell(table, key, body, version)
        }
    }

    async fn broker_with_orders(count: i64, max_poll_records: usize) -> Arc<MemoryBroker> {
        let mut config = MemoryBrokerConfig::new(vec![TOPIC.into()]);
        config.max_poll_records = max_poll_records;
        let broker = MemoryBroker::new(&config);
        for i in 0..count {
            let body = format!(r#"{{"message":{{"_id":{{"order":{}}},"rev":{i}}}}}"#, i % 3);
            broker.append(TOPIC, 0, None, Bytes::new(), Bytes::from(body)).await.unwrap();
        }
        Arc::new(broker)
    }

    fn replay_config() -> PipelineConfig {
        PipelineConfig { idle_backoff_ms: 1, exit_when_idle: true, ..PipelineConfig::default() }
    }

    #[tokio::test]
    async fn replays_log_into_store() {
        let broker = broker_with_orders(10, 4).await;
        let store = Arc::new(MemoryStore::new());
        provision_tables(store.as_ref(), &[TOPIC.to_string()], &TableOptions::default())
            .await
            .unwrap();

        let processor = BatchProcessor::new(store.clone(), broker.clone(), Arc::new(JsonDocumentParser));
        let stats = run_bridge(&processor, &replay_config(), CancellationToken::new()).await.unwrap();

        assert_eq!(stats.cycles, 3);
        assert_eq!(stats.messages, 10);
        assert_eq!(stats.rows_written, 10);

        let table = TableName::new("shop", "orders");
        assert_eq!(store.row_count(&table).await, Some(3));
        let versions: Vec<i64> = store
            .versions(&table, br#"{"order":0}"#)
            .await
            .iter()
            .map(|c| c.version)
            .collect();
        assert_eq!(versions, vec![9, 6, 3, 0]);

        let tp = TopicPartition::new(TOPIC, 0);
        assert_eq!(broker.committed_offset(&tp).await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn failed_write_is_redelivered_next_cycle() {
        let broker = broker_with_orders(6, 100).await;
        let sink = FlakySink::failing_first(1);
        provision_tables(sink.as_ref(), &[TOPIC.to_string()], &TableOptions::default())
            .await
            .unwrap();

        let processor = BatchProcessor::new(sink.clone(), broker.clone(), Arc::new(JsonDocumentParser));
        let stats = run_bridge(&processor, &replay_config(), CancellationToken::new()).await.unwrap();

        assert_eq!(stats.partitions_rewound, 1);
        assert_eq!(stats.partitions_committed, 1);
        // The whole batch came back after the rewind.
        assert_eq!(stats.messages, 12);
        assert_eq!(stats.rows_written, 6);

        let tp = TopicPartition::new(TOPIC, 0);
        assert_eq!(broker.committed_offset(&tp).await.unwrap(), Some(6));
        assert_eq!(sink.inner.row_count(&TableName::new("shop", "orders")).await, Some(3));
    }

    #[tokio::test]
    async fn failing_store_is_retried_after_backoff() {
        let broker = broker_with_orders(3, 100).await;
        let sink = FlakySink::failing_first(usize::MAX);
        provision_tables(sink.as_ref(), &[TOPIC.to_string()], &TableOptions::default())
            .await
            .unwrap();
        let processor = BatchProcessor::new(sink, broker.clone(), Arc::new(JsonDocumentParser));

        let token = CancellationToken::new();
        let stopper = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            stopper.cancel();
        });

        let config = PipelineConfig { idle_backoff_ms: 50, ..PipelineConfig::default() };
        let stats = run_bridge(&processor, &config, token).await.unwrap();

        // ~300ms / 50ms of backoff, not a hot loop.
        assert!(stats.cycles >= 1 && stats.cycles <= 10, "cycles = {}", stats.cycles);
        assert_eq!(stats.partitions_rewound, stats.cycles);
        let tp = TopicPartition::new(TOPIC, 0);
        assert_eq!(broker.committed_offset(&tp).await.unwrap(), None);
    }

    #[tokio::test]
    async fn failing_table_does_not_hold_back_other_topics() {
        let topics = vec!["src.a.x".to_string(), "src.b.y".to_string()];
        let config = MemoryBrokerConfig { max_poll_records: 4, ..MemoryBrokerConfig::new(topics.clone()) };
        let broker = Arc::new(MemoryBroker::new(&config));
        for topic in &topics {
            for i in 0..4 {
                let body = format!(r#"{{"message":{{"_id":{i}}}}}"#);
                broker.append(topic, 0, None, Bytes::new(), Bytes::from(body)).await.unwrap();
            }
        }
        let sink = FlakySink::namespace_down("a");
        provision_tables(sink.as_ref(), &topics, &TableOptions::default()).await.unwrap();
        let processor = BatchProcessor::new(sink.clone(), broker.clone(), Arc::new(JsonDocumentParser));

        let token = CancellationToken::new();
        let stopper = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            stopper.cancel();
        });

        let config = PipelineConfig { idle_backoff_ms: 10, ..PipelineConfig::default() };
        let stats = run_bridge(&processor, &config, token).await.unwrap();

        assert!(stats.partitions_committed >= 1);
        assert!(stats.partitions_rewound >= 1);
        let a = TopicPartition::new("src.a.x", 0);
        let b = TopicPartition::new("src.b.y", 0);
        assert_eq!(broker.committed_offset(&b).await.unwrap(), Some(4));
        assert_eq!(broker.committed_offset(&a).await.unwrap(), None);
        assert_eq!(sink.inner.row_count(&TableName::new("b", "y")).await, Some(4));
    }

    #[tokio::test]
    async fn cancelled_token_stops_idle_loop() {
        let broker = broker_with_orders(0, 10).await;
        let processor = BatchProcessor::new(Arc::new(MemoryStore::new()), broker, Arc::new(JsonDocumentParser));
        let token = CancellationToken::new();
        token.cancel();

        let config = PipelineConfig { idle_backoff_ms: 60_000, ..PipelineConfig::default() };
        let stats = run_bridge(&processor, &config, token).await.unwrap();
        assert_eq!(stats, CycleStats::default());
    }

    struct BrokenBroker;

    impl BrokerClient for BrokenBroker {
        fn poll(&self) -> Pin<Box<dyn Future<Output = Result<bridge_api::PollBatch, ClientError>> + Send + '_>> {
            Box::pin(async { Err(ClientError::config("unknown topic")) })
        }

        fn committed_offset(&self, _tp: &TopicPartition)
            -> Pin<Box<dyn Future<Output = Result<Option<i64>, ClientError>> + Send + '_>>
        {
            Box::pin(async { Ok(None) })
        }

        fn commit(&self, _offsets: BTreeMap<TopicPartition, i64>)
            -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>
        {
            Box::pin(async { Ok(()) })
        }

        fn seek(&self, _tp: &TopicPartition, _offset: i64)
            -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>
        {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn non_io_poll_errors_end_the_loop() {
        let processor = BatchProcessor::new(
            Arc::new(MemoryStore::new()),
            Arc::new(BrokenBroker),
            Arc::new(JsonDocumentParser),
        );
        let err = run_bridge(&processor, &replay_config(), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Poll(_)));
    }
}

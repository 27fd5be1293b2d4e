use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::task::JoinHandle;

use bridge_api::{
    next_offset, BrokerClient, DocumentParser, PollBatch, RawMessage, RowRecord,
    SchemaValidator, StorageSink, TableName, TopicPartition,
};
use record_key::{KeyDerivation, KeyDeriver};

use crate::PipelineError;

// ═══════════════════════════════════════════════════════════════
//  Outcomes
// ═══════════════════════════════════════════════════════════════

/// Messages left out of a partition's row batch. They still count as
/// processed for offset advancement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipCounts {
    pub unparseable: u64,
    pub invalid: u64,
    pub no_identifier: u64,
}

impl SkipCounts {
    pub fn total(&self) -> u64 {
        self.unparseable + self.invalid + self.no_identifier
    }
}

/// How one partition finished a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionOutcome {
    /// Write applied, `offset` committed.
    Committed { offset: i64, rows: u64, skipped: SkipCounts },
    /// Write failed, read position moved back to `offset`.
    Rewound { offset: i64, skipped: SkipCounts },
    /// No messages for the partition; nothing was written or committed.
    Empty,
}

/// Counters of one or more poll cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub cycles: u64,
    pub messages: u64,
    pub rows_written: u64,
    pub skipped: SkipCounts,
    pub partitions_committed: u64,
    pub partitions_rewound: u64,
}

impl CycleStats {
    fn record(&mut self, messages: usize, outcome: &PartitionOutcome) {
        self.messages += messages as u64;
        match outcome {
            PartitionOutcome::Committed { rows, skipped, .. } => {
                self.partitions_committed += 1;
                self.rows_written += rows;
                self.add_skips(skipped);
            }
            PartitionOutcome::Rewound { skipped, .. } => {
                self.partitions_rewound += 1;
                self.add_skips(skipped);
            }
            PartitionOutcome::Empty => {}
        }
    }

    fn add_skips(&mut self, skipped: &SkipCounts) {
        self.skipped.unparseable += skipped.unparseable;
        self.skipped.invalid += skipped.invalid;
        self.skipped.no_identifier += skipped.no_identifier;
    }

    pub fn merge(&mut self, other: &CycleStats) {
        self.cycles += other.cycles;
        self.messages += other.messages;
        self.rows_written += other.rows_written;
        self.add_skips(&other.skipped);
        self.partitions_committed += other.partitions_committed;
        self.partitions_rewound += other.partitions_rewound;
    }
}

// ═══════════════════════════════════════════════════════════════
//  BatchProcessor
// ═══════════════════════════════════════════════════════════════

/// Drives one poll batch into the store: one write per partition, then
/// commit on success or rewind to the committed offset on failure.
///
/// Partitions run as independent tasks and are joined before
/// `process_batch` returns. Inside a partition the steps are strictly
/// sequential (build → write → commit/rewind).
#[derive(Clone)]
pub struct BatchProcessor {
    sink: Arc<dyn StorageSink>,
    broker: Arc<dyn BrokerClient>,
    parser: Arc<dyn DocumentParser>,
    validator: Option<Arc<dyn SchemaValidator>>,
    deriver: Arc<dyn KeyDerivation>,
}

impl BatchProcessor {
    pub fn new(
        sink: Arc<dyn StorageSink>,
        broker: Arc<dyn BrokerClient>,
        parser: Arc<dyn DocumentParser>,
    ) -> Self {
        Self {
            sink,
            broker,
            parser,
            validator: None,
            deriver: Arc::new(KeyDeriver::new()),
        }
    }

    /// Replace the canonical `message._id` key derivation.
    pub fn with_deriver(mut self, deriver: Arc<dyn KeyDerivation>) -> Self {
        self.deriver = deriver;
        self
    }

    /// Gate every parsed document through `validator`; rejected documents
    /// are skipped like unparseable ones.
    pub fn with_validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn broker(&self) -> &Arc<dyn BrokerClient> {
        &self.broker
    }

    /// Process every partition of `batch`.
    ///
    /// A failing partition never stops the others: all partitions run to
    /// completion, then the first error (if any) is returned. Sink write
    /// failures are not errors here, they end in a rewind.
    pub async fn process_batch(&self, batch: PollBatch) -> Result<CycleStats, PipelineError> {
        let mut handles: Vec<(TopicPartition, usize, JoinHandle<Result<PartitionOutcome, PipelineError>>)> =
            Vec::with_capacity(batch.partition_count());

        for (tp, messages) in batch.into_partitions() {
            let worker = self.clone();
            let count = messages.len();
            let task_tp = tp.clone();
            handles.push((tp, count, tokio::spawn(async move {
                worker.process_partition(&task_tp, &messages).await
            })));
        }

        let mut stats = CycleStats { cycles: 1, ..CycleStats::default() };
        let mut first_error: Option<PipelineError> = None;

        for (tp, count, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(PipelineError::Worker(e)),
            };
            match result {
                Ok(outcome) => stats.record(count, &outcome),
                Err(e) => {
                    tracing::error!(topic = %tp.topic, partition = tp.partition, error = %e, "partition failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }

    /// Build → write → commit or rewind for one partition.
    pub async fn process_partition(
        &self,
        tp: &TopicPartition,
        messages: &[RawMessage],
    ) -> Result<PartitionOutcome, PipelineError> {
        let (Some(first), Some(highest)) = (
            messages.first().map(|m| m.offset),
            messages.iter().map(|m| m.offset).max(),
        ) else {
            return Ok(PartitionOutcome::Empty);
        };

        let table = TableName::from_topic(&tp.topic)
            .map_err(|e| PipelineError::TableName { topic: tp.topic.clone(), source: e })?;

        let next = next_offset(highest)
            .map_err(|e| PipelineError::Offset { partition: tp.clone(), source: e })?;

        let (rows, skipped) = self.build_rows(tp, messages);
        let row_count = rows.len() as u64;

        match self.sink.write_batch(&table, rows).await {
            Ok(()) => {
                self.broker
                    .commit(BTreeMap::from([(tp.clone(), next)]))
                    .await
                    .map_err(|e| PipelineError::Commit { partition: tp.clone(), source: e })?;
                tracing::debug!(
                    topic = %tp.topic,
                    partition = tp.partition,
                    table = %table,
                    rows = row_count,
                    offset = next,
                    "committed"
                );
                Ok(PartitionOutcome::Committed { offset: next, rows: row_count, skipped })
            }
            Err(write_err) => {
                let committed = self
                    .broker
                    .committed_offset(tp)
                    .await
                    .map_err(|e| PipelineError::CommittedOffset { partition: tp.clone(), source: e })?;
                // Never committed: re-read the failed batch from its start.
                let offset = committed.unwrap_or(first);
                self.broker
                    .seek(tp, offset)
                    .await
                    .map_err(|e| PipelineError::Seek { partition: tp.clone(), source: e })?;
                tracing::warn!(
                    topic = %tp.topic,
                    partition = tp.partition,
                    table = %table,
                    error = %write_err,
                    offset,
                    "write failed, rewound to committed offset"
                );
                Ok(PartitionOutcome::Rewound { offset, skipped })
            }
        }
    }

    /// Row records in arrival order. Unparseable, invalid and
    /// identifier-less messages are skipped.
    fn build_rows(&self, tp: &TopicPartition, messages: &[RawMessage]) -> (Vec<RowRecord>, SkipCounts) {
        let mut rows = Vec::with_capacity(messages.len());
        let mut skipped = SkipCounts::default();

        for message in messages {
            let document = match self.parser.parse(&message.value) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(topic = %tp.topic, partition = tp.partition, offset = message.offset, error = %e, "unparseable message, skipping");
                    skipped.unparseable += 1;
                    continue;
                }
            };

            if let Some(validator) = &self.validator {
                if let Err(e) = validator.validate(&document) {
                    tracing::warn!(topic = %tp.topic, partition = tp.partition, offset = message.offset, error = %e, "invalid message, skipping");
                    skipped.invalid += 1;
                    continue;
                }
            }

            let derived = self.deriver.derive_key_from_message_body(&document);
            let Some(id) = derived.id_text else {
                tracing::debug!(topic = %tp.topic, partition = tp.partition, offset = message.offset, "no identifier, skipping");
                skipped.no_identifier += 1;
                continue;
            };
            tracing::trace!(offset = message.offset, id = %id, "row");

            rows.push(RowRecord {
                key: derived.key,
                body: message.value.clone(),
                version: message.offset,
            });
        }

        (rows, skipped)
    }
}

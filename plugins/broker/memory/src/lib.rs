use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use serde::Deserialize;
use tokio::sync::Mutex;

use bridge_api::{next_offset, BrokerClient, ClientError, PollBatch, RawMessage, TopicPartition};

// ═══════════════════════════════════════════════════════════════
//  MemoryBrokerConfig
// ═══════════════════════════════════════════════════════════════

/// Where a partition without committed offset starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoOffsetReset {
    #[default]
    Earliest,
    Latest,
}

fn default_max_poll_records() -> usize {
    500
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryBrokerConfig {
    /// JSONL message log to preload.
    #[serde(default)]
    pub input: Option<String>,
    /// Subscribed topics; messages of other topics are never delivered.
    pub topics: Vec<String>,
    /// Upper bound of messages per poll, across all partitions.
    #[serde(default = "default_max_poll_records")]
    pub max_poll_records: usize,
    #[serde(default)]
    pub auto_offset_reset: AutoOffsetReset,
}

impl MemoryBrokerConfig {
    pub fn new(topics: Vec<String>) -> Self {
        Self {
            input: None,
            topics,
            max_poll_records: default_max_poll_records(),
            auto_offset_reset: AutoOffsetReset::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  JSONL log entries
// ═══════════════════════════════════════════════════════════════

/// One line of the message log:
/// `{"topic":"db.shop.orders","partition":0,"offset":12,"key":"k","value":{...}}`.
///
/// `partition` defaults to 0, `offset` to the next free offset of the
/// partition. A string `value` is taken verbatim, anything else is
/// re-encoded as JSON.
#[derive(Debug, Deserialize)]
struct LogEntry {
    topic: String,
    #[serde(default)]
    partition: i32,
    offset: Option<i64>,
    #[serde(default)]
    key: Option<String>,
    value: serde_json::Value,
}

impl LogEntry {
    fn value_bytes(&self) -> Result<Bytes, ClientError> {
        Ok(match &self.value {
            serde_json::Value::String(s) => Bytes::from(s.clone()),
            other => Bytes::from(serde_json::to_vec(other)?),
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryBroker
// ═══════════════════════════════════════════════════════════════

#[derive(Default)]
struct BrokerState {
    /// Partition log, ascending offsets.
    logs: BTreeMap<TopicPartition, Vec<RawMessage>>,
    committed: HashMap<TopicPartition, i64>,
    positions: HashMap<TopicPartition, i64>,
    /// Rotates the partition a poll starts with.
    poll_rounds: usize,
}

impl BrokerState {
    fn start_position(&self, tp: &TopicPartition, reset: AutoOffsetReset) -> Result<i64, ClientError> {
        if let Some(&committed) = self.committed.get(tp) {
            return Ok(committed);
        }
        let log = self.logs.get(tp).map(Vec::as_slice).unwrap_or_default();
        Ok(match (reset, log.first(), log.last()) {
            (AutoOffsetReset::Earliest, Some(first), _) => first.offset,
            (AutoOffsetReset::Latest, _, Some(last)) => next_offset(last.offset)?,
            _ => 0,
        })
    }
}

/// In-process partitioned log with consumer-group bookkeeping: committed
/// offsets, read positions, `auto_offset_reset` and bounded polls.
///
/// Commit and seek behave like a Kafka consumer: commit stores the
/// next-to-read offset, seek moves the read position and the next poll
/// re-delivers from there.
pub struct MemoryBroker {
    subscription: BTreeSet<String>,
    max_poll_records: usize,
    auto_offset_reset: AutoOffsetReset,
    state: Mutex<BrokerState>,
}

impl MemoryBroker {
    pub fn new(config: &MemoryBrokerConfig) -> Self {
        Self {
            subscription: config.topics.iter().cloned().collect(),
            max_poll_records: config.max_poll_records.max(1),
            auto_offset_reset: config.auto_offset_reset,
            state: Mutex::new(BrokerState::default()),
        }
    }

    /// Build a broker and preload `config.input` if set.
    pub async fn open(config: &MemoryBrokerConfig) -> Result<Self, ClientError> {
        let broker = Self::new(config);
        if let Some(path) = &config.input {
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ClientError::io(format!("read '{path}': {e}")))?;
            let loaded = broker.load_jsonl(&content).await?;
            tracing::info!(input = %path, messages = loaded, "loaded message log");
        }
        Ok(broker)
    }

    /// Append every non-empty line of a JSONL log. Returns the number of
    /// messages appended.
    pub async fn load_jsonl(&self, content: &str) -> Result<usize, ClientError> {
        let mut count = 0;
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let entry: LogEntry = serde_json::from_str(line)
                .map_err(|e| ClientError::format_err(format!("line {}: {e}", lineno + 1)))?;
            let value = entry.value_bytes()?;
            let key = entry.key.map(Bytes::from).unwrap_or_default();
            self.append(&entry.topic, entry.partition, entry.offset, key, value).await?;
            count += 1;
        }
        Ok(count)
    }

    /// Append one message. `offset = None` assigns the next free offset;
    /// explicit offsets must be strictly increasing within the partition.
    pub async fn append(
        &self,
        topic: &str,
        partition: i32,
        offset: Option<i64>,
        key: Bytes,
        value: Bytes,
    ) -> Result<i64, ClientError> {
        let tp = TopicPartition::new(topic, partition);
        let mut state = self.state.lock().await;
        let log = state.logs.entry(tp.clone()).or_default();
        let next = match log.last() {
            Some(last) => next_offset(last.offset).map_err(|e| ClientError::new(format!("{tp}: {e}")))?,
            None => 0,
        };
        let offset = offset.unwrap_or(next);
        if offset < next {
            return Err(ClientError::format_err(format!(
                "{tp}: offset {offset} is not after the log end {next}"
            )));
        }
        log.push(RawMessage { topic: tp.topic.clone(), partition, offset, key, value });
        Ok(offset)
    }

    /// Current read position of a partition, if it was ever polled or sought.
    pub async fn position(&self, tp: &TopicPartition) -> Option<i64> {
        self.state.lock().await.positions.get(tp).copied()
    }

    /// Messages between the committed offset and the log end, summed over
    /// subscribed partitions.
    pub async fn lag(&self) -> u64 {
        let state = self.state.lock().await;
        state
            .logs
            .iter()
            .filter(|(tp, _)| self.subscription.contains(&tp.topic))
            .map(|(tp, log)| match state.start_position(tp, self.auto_offset_reset) {
                Ok(from) => log.iter().filter(|m| m.offset >= from).count() as u64,
                Err(_) => 0,
            })
            .sum()
    }
}

impl BrokerClient for MemoryBroker {
    fn poll(&self) -> Pin<Box<dyn Future<Output = Result<PollBatch, ClientError>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let mut batch = PollBatch::new();
            let mut budget = self.max_poll_records;

            let mut partitions: Vec<TopicPartition> = state
                .logs
                .keys()
                .filter(|tp| self.subscription.contains(&tp.topic))
                .cloned()
                .collect();
            // Start one partition later each poll so the shared budget
            // reaches every partition.
            if !partitions.is_empty() {
                let len = partitions.len();
                partitions.rotate_left(state.poll_rounds % len);
                state.poll_rounds = state.poll_rounds.wrapping_add(1);
            }

            for tp in partitions {
                if budget == 0 {
                    break;
                }
                let position = match state.positions.get(&tp) {
                    Some(&p) => p,
                    None => state.start_position(&tp, self.auto_offset_reset)?,
                };
                let Some(log) = state.logs.get(&tp) else { continue };
                let start = log.partition_point(|m| m.offset < position);
                let taken: Vec<RawMessage> = log[start..].iter().take(budget).cloned().collect();
                let Some(last) = taken.last().map(|m| m.offset) else {
                    state.positions.insert(tp, position);
                    continue;
                };
                let next = next_offset(last).map_err(|e| ClientError::new(format!("{tp}: {e}")))?;
                budget -= taken.len();
                state.positions.insert(tp, next);
                for message in taken {
                    batch.push(message);
                }
            }
            Ok(batch)
        })
    }

    fn committed_offset(&self, tp: &TopicPartition)
        -> Pin<Box<dyn Future<Output = Result<Option<i64>, ClientError>> + Send + '_>>
    {
        let tp = tp.clone();
        Box::pin(async move { Ok(self.state.lock().await.committed.get(&tp).copied()) })
    }

    fn commit(&self, offsets: BTreeMap<TopicPartition, i64>)
        -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>
    {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            for (tp, offset) in offsets {
                if !self.subscription.contains(&tp.topic) {
                    return Err(ClientError::new(format!("commit for unsubscribed partition {tp}")));
                }
                state.committed.insert(tp, offset);
            }
            Ok(())
        })
    }

    fn seek(&self, tp: &TopicPartition, offset: i64)
        -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>
    {
        let tp = tp.clone();
        Box::pin(async move {
            if !self.subscription.contains(&tp.topic) {
                return Err(ClientError::new(format!("seek on unsubscribed partition {tp}")));
            }
            self.state.lock().await.positions.insert(tp, offset);
            Ok(())
        })
    }
}

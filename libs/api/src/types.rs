use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ClientError;

// ════════════════════════════════════════════════════════════════
//  TopicPartition
// ════════════════════════════════════════════════════════════════

/// Independently advancing log stream: (topic name, partition number).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self { topic: topic.into(), partition }
    }
}

impl std::fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

// ════════════════════════════════════════════════════════════════
//  RawMessage
// ════════════════════════════════════════════════════════════════

/// A message as delivered by the broker. The bridge only reads it.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub topic: String,
    pub partition: i32,
    /// Monotonic, unique within the partition.
    pub offset: i64,
    pub key: Bytes,
    /// Raw document encoding (JSON for the bundled parser).
    pub value: Bytes,
}

impl RawMessage {
    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }
}

// ════════════════════════════════════════════════════════════════
//  PollBatch
// ════════════════════════════════════════════════════════════════

/// One poll worth of messages grouped by topic-partition.
///
/// Messages of a partition keep their arrival (offset) order.
#[derive(Debug, Clone, Default)]
pub struct PollBatch {
    partitions: BTreeMap<TopicPartition, Vec<RawMessage>>,
}

impl PollBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to its partition's list.
    pub fn push(&mut self, message: RawMessage) {
        self.partitions
            .entry(message.topic_partition())
            .or_default()
            .push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.values().all(Vec::is_empty)
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn message_count(&self) -> usize {
        self.partitions.values().map(Vec::len).sum()
    }

    pub fn partitions(&self) -> impl Iterator<Item = (&TopicPartition, &[RawMessage])> {
        self.partitions.iter().map(|(tp, msgs)| (tp, msgs.as_slice()))
    }

    pub fn into_partitions(self) -> impl Iterator<Item = (TopicPartition, Vec<RawMessage>)> {
        self.partitions.into_iter()
    }
}

impl FromIterator<RawMessage> for PollBatch {
    fn from_iter<I: IntoIterator<Item = RawMessage>>(iter: I) -> Self {
        let mut batch = PollBatch::new();
        for message in iter {
            batch.push(message);
        }
        batch
    }
}

// ════════════════════════════════════════════════════════════════
//  RowRecord
// ════════════════════════════════════════════════════════════════

/// One versioned row destined for the wide-column store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRecord {
    /// Canonical form of the message identifier.
    pub key: Bytes,
    /// Original message value.
    pub body: Bytes,
    /// Source offset; later reads recover event order from it.
    pub version: i64,
}

// ════════════════════════════════════════════════════════════════
//  TableName
// ════════════════════════════════════════════════════════════════

/// Fully qualified table identifier, rendered as `namespace:qualifier`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName {
    pub namespace: String,
    pub qualifier: String,
}

impl TableName {
    pub fn new(namespace: impl Into<String>, qualifier: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), qualifier: qualifier.into() }
    }

    /// Map a topic named `<source>.<database>.<collection>` to
    /// `<database>:<collection>`.
    ///
    /// The leading source segment is dropped. Everything after the database
    /// segment is the collection, so `src.db.coll.v2` maps to `db:coll.v2`.
    /// Fewer than three segments, or an empty one, is a configuration error.
    pub fn from_topic(topic: &str) -> Result<Self, ClientError> {
        let mut parts = topic.splitn(3, '.');
        let (Some(source), Some(database), Some(collection)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(ClientError::config(format!(
                "topic '{topic}' does not follow '<source>.<database>.<collection>'"
            )));
        };
        if source.is_empty() || database.is_empty() || collection.split('.').any(str::is_empty) {
            return Err(ClientError::config(format!(
                "topic '{topic}' has an empty name segment"
            )));
        }
        Ok(Self::new(database, collection))
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.qualifier)
    }
}

// ════════════════════════════════════════════════════════════════
//  TableOptions
// ════════════════════════════════════════════════════════════════

/// Column family settings used when provisioning a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOptions {
    pub column_family: String,
    pub column: String,
    pub max_versions: u32,
    pub min_versions: u32,
    /// `None` keeps cells forever.
    pub time_to_live: Option<Duration>,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            column_family: "cf".into(),
            column: "record".into(),
            max_versions: 10,
            min_versions: 1,
            time_to_live: None,
        }
    }
}

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

mod error;
mod types;
mod util;

pub use error::{ClientError, ErrorKind};
pub use types::{PollBatch, RawMessage, RowRecord, TableName, TableOptions, TopicPartition};
pub use util::{next_offset, now_ms, resolve_path};

// ════════════════════════════════════════════════════════════════
//  Document Traits
// ════════════════════════════════════════════════════════════════

/// Turns raw message bytes into a structured document.
///
/// Malformed input fails with an `ErrorKind::Format` error; the bridge skips
/// such messages instead of aborting the partition.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, data: &[u8]) -> Result<serde_json::Value, ClientError>;
}

/// Optional gate applied to every parsed document before key derivation.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, document: &serde_json::Value) -> Result<(), ClientError>;
}

// ════════════════════════════════════════════════════════════════
//  Storage Sink
// ════════════════════════════════════════════════════════════════

/// Versioned wide-column store the bridge mirrors documents into.
///
/// Provisioning (`ensure_namespace`, `ensure_table`) is idempotent and runs
/// once at startup, outside the per-cycle hot path.
pub trait StorageSink: Send + Sync {
    /// Create the namespace if it does not exist yet.
    fn ensure_namespace(&self, name: &str)
        -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>;

    /// Create the table with one column family if it does not exist yet.
    fn ensure_table(&self, table: &TableName, options: &TableOptions)
        -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>;

    /// Write a whole partition's rows as one logical write.
    ///
    /// All-or-nothing from the caller's side: on `Err` the caller treats
    /// every row as not written.
    fn write_batch(&self, table: &TableName, rows: Vec<RowRecord>)
        -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>;

    /// Single-row versioned write, used outside the batch path.
    fn write_versioned_cell(&self, table: &TableName, key: Bytes, body: Bytes, version: i64)
        -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>;
}

// ════════════════════════════════════════════════════════════════
//  Broker Client
// ════════════════════════════════════════════════════════════════

/// Consumer side of the log broker. Holds the per-partition commit state
/// and read positions; the bridge only drives them.
pub trait BrokerClient: Send + Sync {
    /// Fetch the next batch of messages, grouped by topic-partition.
    /// An empty batch means nothing is currently available.
    fn poll(&self) -> Pin<Box<dyn Future<Output = Result<PollBatch, ClientError>> + Send + '_>>;

    /// Last committed offset (next offset to read) of the partition,
    /// `None` if the group never committed it.
    fn committed_offset(&self, tp: &TopicPartition)
        -> Pin<Box<dyn Future<Output = Result<Option<i64>, ClientError>> + Send + '_>>;

    /// Commit the given next-to-read offsets.
    fn commit(&self, offsets: BTreeMap<TopicPartition, i64>)
        -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>;

    /// Move the read position of the partition; the next poll re-delivers
    /// from `offset`.
    fn seek(&self, tp: &TopicPartition, offset: i64)
        -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>;
}

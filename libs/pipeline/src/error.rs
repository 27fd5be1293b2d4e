use bridge_api::{ClientError, TopicPartition};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("table name ({topic}): {source}")]
    TableName { topic: String, source: ClientError },

    #[error("provision ({table}): {source}")]
    Provision { table: String, source: ClientError },

    #[error("commit ({partition}): {source}")]
    Commit { partition: TopicPartition, source: ClientError },

    #[error("committed offset ({partition}): {source}")]
    CommittedOffset { partition: TopicPartition, source: ClientError },

    #[error("seek ({partition}): {source}")]
    Seek { partition: TopicPartition, source: ClientError },

    #[error("offset ({partition}): {source}")]
    Offset { partition: TopicPartition, source: ClientError },

    #[error("poll: {0}")]
    Poll(ClientError),

    #[error("partition worker: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

use bridge_api::{StorageSink, TableName, TableOptions};

use crate::PipelineError;

/// Map every subscribed topic to its table and make sure namespace and
/// table exist. Runs once at startup; calling it again is a no-op.
///
/// Fails on the first topic whose name does not map to a table, before
/// anything is created for the topics after it.
pub async fn provision_tables(
    sink: &dyn StorageSink,
    topics: &[String],
    options: &TableOptions,
) -> Result<Vec<TableName>, PipelineError> {
    let mut tables: Vec<TableName> = Vec::with_capacity(topics.len());

    for topic in topics {
        let table = TableName::from_topic(topic)
            .map_err(|source| PipelineError::TableName { topic: topic.clone(), source })?;
        if tables.contains(&table) {
            continue;
        }

        sink.ensure_namespace(&table.namespace)
            .await
            .map_err(|source| PipelineError::Provision { table: table.to_string(), source })?;
        sink.ensure_table(&table, options)
            .await
            .map_err(|source| PipelineError::Provision { table: table.to_string(), source })?;

        tracing::info!(topic = %topic, table = %table, "table ready");
        tables.push(table);
    }

    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage_memory::MemoryStore;

    #[tokio::test]
    async fn creates_namespace_and_table_per_topic() {
        let store = MemoryStore::new();
        let topics = vec!["mongo.shop.orders".to_string(), "mongo.crm.users".to_string()];

        let tables = provision_tables(&store, &topics, &TableOptions::default()).await.unwrap();

        assert_eq!(tables, vec![TableName::new("shop", "orders"), TableName::new("crm", "users")]);
        assert!(store.has_namespace("shop").await);
        assert!(store.has_namespace("crm").await);
        assert_eq!(store.tables().await.len(), 2);
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let store = MemoryStore::new();
        let topics = vec!["mongo.shop.orders".to_string()];
        provision_tables(&store, &topics, &TableOptions::default()).await.unwrap();
        let tables = provision_tables(&store, &topics, &TableOptions::default()).await.unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(store.tables().await.len(), 1);
    }

    #[tokio::test]
    async fn malformed_topic_is_reported_with_its_name() {
        let store = MemoryStore::new();
        let topics = vec!["orders".to_string()];
        let err = provision_tables(&store, &topics, &TableOptions::default()).await.unwrap_err();
        match err {
            PipelineError::TableName { topic, .. } => assert_eq!(topic, "orders"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.tables().await.is_empty());
    }

    #[tokio::test]
    async fn store_rejection_becomes_provision_error() {
        let store = MemoryStore::new();
        let options = TableOptions { max_versions: 1, min_versions: 3, ..TableOptions::default() };
        let err = provision_tables(&store, &["mongo.shop.orders".to_string()], &options)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Provision { .. }));
    }
}

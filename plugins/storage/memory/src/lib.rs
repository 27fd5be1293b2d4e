use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tokio::sync::RwLock;

use bridge_api::{now_ms, ClientError, RowRecord, StorageSink, TableName, TableOptions};

// ═══════════════════════════════════════════════════════════════
//  Table
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
struct Cell {
    family: String,
    column: String,
    version: i64,
    body: Bytes,
    written_ms: i64,
}

/// One visible cell of a row, addressed as `family:column` at `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCell {
    pub family: String,
    pub column: String,
    pub version: i64,
    pub body: Bytes,
}

struct Table {
    options: TableOptions,
    /// Row key → cells of the single `family:column`, newest version first.
    rows: BTreeMap<Bytes, Vec<Cell>>,
}

impl Table {
    fn new(options: TableOptions) -> Self {
        Self { options, rows: BTreeMap::new() }
    }

    /// Put one cell. A write with an existing version replaces that cell.
    fn put(&mut self, key: Bytes, body: Bytes, version: i64, now: i64) {
        let cell = Cell {
            family: self.options.column_family.clone(),
            column: self.options.column.clone(),
            version,
            body,
            written_ms: now,
        };
        let cells = self.rows.entry(key).or_default();
        match cells.binary_search_by(|c| version.cmp(&c.version)) {
            Ok(i) => cells[i] = cell,
            Err(i) => cells.insert(i, cell),
        }
        prune(cells, &self.options, now);
    }

    /// Cells visible at `now`, newest first.
    fn visible(&self, key: &[u8], now: i64) -> Vec<StoredCell> {
        let Some(cells) = self.rows.get(key) else {
            return Vec::new();
        };
        let mut cells = cells.clone();
        prune(&mut cells, &self.options, now);
        cells
            .into_iter()
            .map(|c| StoredCell { family: c.family, column: c.column, version: c.version, body: c.body })
            .collect()
    }
}

/// Apply the column family's retention: at most `max_versions` cells, and
/// cells older than the TTL go away unless they are among the newest
/// `min_versions`.
fn prune(cells: &mut Vec<Cell>, options: &TableOptions, now: i64) {
    cells.truncate(options.max_versions.max(1) as usize);

    if let Some(ttl) = options.time_to_live {
        let ttl_ms = ttl.as_millis() as i64;
        let keep = options.min_versions as usize;
        let mut i = 0;
        cells.retain(|c| {
            let fresh = now - c.written_ms < ttl_ms;
            let retained = fresh || i < keep;
            i += 1;
            retained
        });
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryStore
// ═══════════════════════════════════════════════════════════════

/// In-process versioned wide-column store: namespaces, tables with a
/// single column family, byte-keyed rows, versioned cells.
///
/// Backs the bridge when no external store is configured and serves as the
/// reference `StorageSink` in tests.
#[derive(Default)]
pub struct MemoryStore {
    namespaces: RwLock<BTreeSet<String>>,
    tables: RwLock<HashMap<TableName, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest visible version of a row.
    pub async fn get(&self, table: &TableName, key: &[u8]) -> Option<StoredCell> {
        self.versions(table, key).await.into_iter().next()
    }

    /// All visible versions of a row, newest first.
    pub async fn versions(&self, table: &TableName, key: &[u8]) -> Vec<StoredCell> {
        let tables = self.tables.read().await;
        match tables.get(table) {
            Some(t) => t.visible(key, now_ms()),
            None => Vec::new(),
        }
    }

    /// Number of rows in a table, `None` if the table does not exist.
    pub async fn row_count(&self, table: &TableName) -> Option<usize> {
        self.tables.read().await.get(table).map(|t| t.rows.len())
    }

    pub async fn tables(&self) -> Vec<TableName> {
        let mut names: Vec<TableName> = self.tables.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn has_namespace(&self, name: &str) -> bool {
        self.namespaces.read().await.contains(name)
    }
}

impl StorageSink for MemoryStore {
    fn ensure_namespace(&self, name: &str)
        -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>
    {
        let name = name.to_string();
        Box::pin(async move {
            let mut namespaces = self.namespaces.write().await;
            tracing::debug!(existing = ?namespaces, "listing namespaces");
            if namespaces.insert(name.clone()) {
                tracing::info!(namespace = %name, "created namespace");
            }
            Ok(())
        })
    }

    fn ensure_table(&self, table: &TableName, options: &TableOptions)
        -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>
    {
        let table = table.clone();
        let options = options.clone();
        Box::pin(async move {
            if options.min_versions > options.max_versions {
                return Err(ClientError::config(format!(
                    "table {table}: min_versions {} exceeds max_versions {}",
                    options.min_versions, options.max_versions
                )));
            }
            if !self.namespaces.read().await.contains(&table.namespace) {
                return Err(ClientError::new(format!("namespace '{}' not found", table.namespace)));
            }

            let mut tables = self.tables.write().await;
            if !tables.contains_key(&table) {
                tracing::info!(
                    table = %table,
                    family = %options.column_family,
                    max_versions = options.max_versions,
                    min_versions = options.min_versions,
                    ttl = ?options.time_to_live,
                    "created table"
                );
                tables.insert(table, Table::new(options));
            }
            Ok(())
        })
    }

    fn write_batch(&self, table: &TableName, rows: Vec<RowRecord>)
        -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>
    {
        let table = table.clone();
        Box::pin(async move {
            // One write lock for the whole batch: readers see all rows or none.
            let mut tables = self.tables.write().await;
            let t = tables
                .get_mut(&table)
                .ok_or_else(|| ClientError::new(format!("table {table} not found")))?;
            let now = now_ms();
            let count = rows.len();
            for row in rows {
                t.put(row.key, row.body, row.version, now);
            }
            tracing::trace!(
                table = %table,
                family = %t.options.column_family,
                column = %t.options.column,
                rows = count,
                "batch applied"
            );
            Ok(())
        })
    }

    fn write_versioned_cell(&self, table: &TableName, key: Bytes, body: Bytes, version: i64)
        -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>
    {
        let table = table.clone();
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let t = tables
                .get_mut(&table)
                .ok_or_else(|| ClientError::new(format!("table {table} not found")))?;
            t.put(key, body, version, now_ms());
            Ok(())
        })
    }
}

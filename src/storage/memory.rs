use super::{CommandKind, StoreCommand, StoreConnection, StoreOutcome, Table, TableSchema};
use crate::core::{DbError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Store provider backed by in-process tables.
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
    /// Delay applied on the non-blocking path before each command
    latency: Option<Duration>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            latency: None,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Register a table; fails if the name is taken
    pub fn create_table(&self, schema: TableSchema) -> Result<()> {
        let mut tables = self.tables.write()?;
        let name = schema.name().to_string();

        if tables.contains_key(&name) {
            return Err(DbError::TableExists(name));
        }

        tables.insert(name, Table::new(schema));
        Ok(())
    }

    pub fn scan_table(&self, table_name: &str) -> Result<Vec<super::Row>> {
        let tables = self.tables.read()?;
        let table = tables
            .get(table_name)
            .ok_or_else(|| DbError::TableNotFound(table_name.to_string()))?;
        Ok(table.scan())
    }

    pub fn row_count(&self, table_name: &str) -> Result<usize> {
        Ok(self.scan_table(table_name)?.len())
    }

    fn apply(&self, command: &StoreCommand) -> Result<StoreOutcome> {
        let mut tables = self.tables.write()?;
        let table = tables
            .get_mut(&command.table)
            .ok_or_else(|| DbError::TableNotFound(command.table.clone()))?;

        let rows = match command.kind {
            CommandKind::Insert => vec![table.insert(&command.values)?],
            CommandKind::Update => table.update(&command.keys, &command.values)?,
            CommandKind::Delete => table.delete(&command.keys)?,
        };

        let mut returned = Vec::with_capacity(command.returning.len());
        if let Some(first) = rows.first() {
            for column in &command.returning {
                returned.push((column.clone(), table.column_value(first, column)?));
            }
        }

        trace!(
            kind = %command.kind,
            table = %command.table,
            rows = rows.len(),
            "applied store command"
        );

        Ok(StoreOutcome {
            rows_affected: rows.len() as i64,
            returned,
        })
    }
}

#[async_trait]
impl StoreConnection for MemoryStore {
    fn execute(&self, command: &StoreCommand) -> Result<StoreOutcome> {
        self.apply(command)
    }

    async fn execute_async(
        &self,
        command: &StoreCommand,
        cancel: &CancellationToken,
    ) -> Result<StoreOutcome> {
        if let Some(latency) = self.latency {
            tokio::select! {
                _ = cancel.cancelled() => return Err(DbError::Cancelled),
                _ = tokio::time::sleep(latency) => {}
            }
        } else if cancel.is_cancelled() {
            return Err(DbError::Cancelled);
        }
        self.apply(command)
    }
}

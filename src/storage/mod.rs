// ============================================================================
// Store Provider Seam
// ============================================================================
//
// Commands talk to the store through `StoreConnection`. A command is handed
// over as a structured `StoreCommand`; turning it into a dialect is the
// provider's business.
//
// ============================================================================

pub mod memory;
pub mod table;

pub use memory::MemoryStore;
pub use table::{Row, Table, TableSchema};

use crate::core::{DbError, Result, Value};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Kind of modification a command performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandKind::Insert => write!(f, "INSERT"),
            CommandKind::Update => write!(f, "UPDATE"),
            CommandKind::Delete => write!(f, "DELETE"),
        }
    }
}

/// One modification, resolved to concrete values
#[derive(Debug, Clone, PartialEq)]
pub struct StoreCommand {
    pub kind: CommandKind,
    pub table: String,
    /// Columns written by an insert or update
    pub values: Vec<(String, Value)>,
    /// Columns identifying the target rows of an update or delete
    pub keys: Vec<(String, Value)>,
    /// Columns whose stored value the store hands back
    pub returning: Vec<String>,
}

impl StoreCommand {
    pub fn new(kind: CommandKind, table: &str) -> Self {
        Self {
            kind,
            table: table.to_string(),
            values: Vec::new(),
            keys: Vec::new(),
            returning: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoreOutcome {
    pub rows_affected: i64,
    /// Values of the `returning` columns, taken from the first affected row
    pub returned: Vec<(String, Value)>,
}

impl StoreOutcome {
    pub fn returned_value(&self, column: &str) -> Option<&Value> {
        self.returned
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }
}

#[async_trait]
pub trait StoreConnection: Send + Sync {
    fn execute(&self, command: &StoreCommand) -> Result<StoreOutcome>;

    /// Non-blocking execution.
    ///
    /// The default runs the blocking path once the token has been checked.
    async fn execute_async(
        &self,
        command: &StoreCommand,
        cancel: &CancellationToken,
    ) -> Result<StoreOutcome> {
        if cancel.is_cancelled() {
            return Err(DbError::Cancelled);
        }
        self.execute(command)
    }
}

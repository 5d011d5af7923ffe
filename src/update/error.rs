use crate::core::DbError;
use crate::state::{EntityStateEntry, StateEntrySnapshot};
use std::sync::Arc;
use thiserror::Error;

/// Message carried by every wrapped execution failure
pub const GENERAL_EXECUTION_MESSAGE: &str =
    "An error occurred while updating the entries. See the inner exception for details.";

/// Failure of an update run, carrying the state entries it implicates.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("{}", GENERAL_EXECUTION_MESSAGE)]
    Execution {
        #[source]
        source: DbError,
        state_entries: Vec<Arc<EntityStateEntry>>,
    },

    #[error(
        "Store update, insert, or delete statement affected an unexpected number of rows ({rows_affected}). Entities may have been modified or deleted since they were loaded."
    )]
    Concurrency {
        rows_affected: i64,
        state_entries: Vec<Arc<EntityStateEntry>>,
    },

    #[error(
        "Unable to determine a valid ordering for dependent operations. Dependencies may exist due to foreign key constraints or server-generated values."
    )]
    DependencyCycle {
        state_entries: Vec<Arc<EntityStateEntry>>,
    },

    #[error("Failed to write a server-generated value back into its entity")]
    Propagation {
        #[source]
        source: DbError,
        state_entries: Vec<Arc<EntityStateEntry>>,
    },

    #[error("The update was cancelled")]
    Cancelled,
}

impl UpdateError {
    /// Entries implicated in the failure, in the order the failing command
    /// reported them
    pub fn state_entries(&self) -> &[Arc<EntityStateEntry>] {
        match self {
            UpdateError::Execution { state_entries, .. }
            | UpdateError::Concurrency { state_entries, .. }
            | UpdateError::DependencyCycle { state_entries }
            | UpdateError::Propagation { state_entries, .. } => state_entries,
            UpdateError::Cancelled => &[],
        }
    }

    /// Provider fault underneath the failure, if there is one
    pub fn store_error(&self) -> Option<&DbError> {
        match self {
            UpdateError::Execution { source, .. } | UpdateError::Propagation { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, UpdateError::Cancelled)
    }

    pub fn snapshots(&self) -> Vec<StateEntrySnapshot> {
        self.state_entries()
            .iter()
            .map(|entry| entry.snapshot())
            .collect()
    }
}

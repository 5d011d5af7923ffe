// ============================================================================
// RustMemDB Update Pipeline
// ============================================================================

pub mod core;
pub mod state;
pub mod storage;
pub mod update;

pub use crate::core::{DbError, GeneratedValue, Result, Value};
pub use state::{EntityKey, EntityState, EntityStateEntry, StateManager};
pub use storage::{CommandKind, MemoryStore, StoreCommand, StoreConnection, StoreOutcome, TableSchema};
pub use update::{
    CommandProducer, GENERAL_EXECUTION_MESSAGE, GeneratedValues, IdentifierId, IdentifierValues,
    ModificationCommand, OrderedCommandProducer, PropagatorFlags, PropagatorResult,
    ResultPlaceholder, UpdateCommand, UpdateConfig, UpdateError, UpdateTranslator,
};

pub use tokio_util::sync::CancellationToken;

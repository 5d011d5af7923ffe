// ============================================================================
// Entity State Entries
// ============================================================================
//
// A state entry is one tracked entity plus its pending change. Entries are
// shared through `Arc`: the state manager owns them, commands and
// placeholders reference them, and update errors report them back to the
// caller. Identity is pointer identity.
//
// ============================================================================

use crate::core::{DbError, GeneratedValue, Result, Value};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Unique key of a tracked entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey(pub Uuid);

impl EntityKey {
    pub fn new() -> Self {
        EntityKey(Uuid::new_v4())
    }
}

impl Default for EntityKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity_{}", self.0)
    }
}

/// Lifecycle state of a tracked entity
///
/// ```text
/// Added ────┐
/// Modified ─┴──accept──> Unchanged
/// Deleted ─────accept──> Detached
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityState {
    Detached,
    Unchanged,
    Added,
    Deleted,
    Modified,
}

impl EntityState {
    /// Whether the entity carries a change the store has not seen yet
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            EntityState::Added | EntityState::Deleted | EntityState::Modified
        )
    }
}

impl std::fmt::Display for EntityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityState::Detached => write!(f, "DETACHED"),
            EntityState::Unchanged => write!(f, "UNCHANGED"),
            EntityState::Added => write!(f, "ADDED"),
            EntityState::Deleted => write!(f, "DELETED"),
            EntityState::Modified => write!(f, "MODIFIED"),
        }
    }
}

#[derive(Debug)]
pub struct EntityStateEntry {
    key: EntityKey,
    entity_set: Option<String>,
    state: RwLock<EntityState>,
    /// Current member values, indexed by ordinal
    current_values: RwLock<Vec<GeneratedValue>>,
}

impl EntityStateEntry {
    pub fn new(entity_set: Option<&str>, state: EntityState, values: Vec<Value>) -> Self {
        Self {
            key: EntityKey::new(),
            entity_set: entity_set.map(str::to_string),
            state: RwLock::new(state),
            current_values: RwLock::new(values.into_iter().map(Arc::new).collect()),
        }
    }

    pub fn key(&self) -> EntityKey {
        self.key
    }

    pub fn entity_set(&self) -> Option<&str> {
        self.entity_set.as_deref()
    }

    pub fn state(&self) -> EntityState {
        *self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn current_value(&self, ordinal: usize) -> Option<GeneratedValue> {
        self.current_values
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(ordinal)
            .cloned()
    }

    pub fn current_values(&self) -> Vec<GeneratedValue> {
        self.current_values
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Overwrite one member with a value returned by the store
    pub fn set_current_value(&self, ordinal: usize, value: GeneratedValue) -> Result<()> {
        let mut values = self.current_values.write()?;
        let len = values.len();
        let slot = values
            .get_mut(ordinal)
            .ok_or(DbError::OrdinalOutOfRange(ordinal, len))?;
        *slot = value;
        Ok(())
    }

    /// Mark the pending change as persisted.
    ///
    /// Returns `true` when the entry had a pending change.
    pub fn accept_changes(&self) -> bool {
        let mut state = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        match *state {
            EntityState::Added | EntityState::Modified => {
                *state = EntityState::Unchanged;
                true
            }
            EntityState::Deleted => {
                *state = EntityState::Detached;
                true
            }
            EntityState::Unchanged | EntityState::Detached => false,
        }
    }

    /// Point-in-time copy for diagnostics
    pub fn snapshot(&self) -> StateEntrySnapshot {
        StateEntrySnapshot {
            key: self.key,
            entity_set: self.entity_set.clone(),
            state: self.state(),
            values: self.current_values().iter().map(|v| (**v).clone()).collect(),
        }
    }
}

/// Serializable view of an entry, used when reporting failed updates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntrySnapshot {
    pub key: EntityKey,
    pub entity_set: Option<String>,
    pub state: EntityState,
    pub values: Vec<Value>,
}

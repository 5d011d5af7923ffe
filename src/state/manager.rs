// ============================================================================
// State Manager
// ============================================================================

use super::{EntityState, EntityStateEntry};
use crate::core::Value;
use std::sync::{Arc, RwLock};

/// Owns the tracked state entries handed to commands and placeholders.
#[derive(Debug, Default)]
pub struct StateManager {
    entries: RwLock<Vec<Arc<EntityStateEntry>>>,
}

impl StateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an entity
    pub fn add_entry(
        &self,
        entity_set: &str,
        state: EntityState,
        values: Vec<Value>,
    ) -> Arc<EntityStateEntry> {
        let entry = Arc::new(EntityStateEntry::new(Some(entity_set), state, values));
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry.clone());
        entry
    }

    pub fn entries(&self) -> Vec<Arc<EntityStateEntry>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn entries_in_state(&self, state: EntityState) -> Vec<Arc<EntityStateEntry>> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.state() == state)
            .collect()
    }

    /// Entries whose change has not reached the store yet
    pub fn pending_entries(&self) -> Vec<Arc<EntityStateEntry>> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.state().is_pending())
            .collect()
    }

    /// Stop tracking entries that were deleted and accepted.
    ///
    /// Returns the number of entries removed.
    pub fn prune_detached(&self) -> usize {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = entries.len();
        entries.retain(|entry| entry.state() != EntityState::Detached);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

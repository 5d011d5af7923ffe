// ============================================================================
// Entity State Tracking
// ============================================================================
//
// Tracked entities and their pending changes. Dirty detection happens
// elsewhere; this module only records state, current values, and the
// transition applied once the store has accepted a change.
//
// ============================================================================

pub mod entry;
pub mod manager;

pub use entry::{EntityKey, EntityState, EntityStateEntry, StateEntrySnapshot};
pub use manager::StateManager;

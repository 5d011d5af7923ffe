use super::ResultPlaceholder;
use crate::core::GeneratedValue;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global identifier counter
static NEXT_IDENTIFIER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity shared by every placeholder that must end up holding the same
/// key value, e.g. a principal's generated key and its dependents' foreign
/// keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentifierId(pub u64);

impl IdentifierId {
    pub fn new() -> Self {
        IdentifierId(NEXT_IDENTIFIER_ID.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for IdentifierId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IdentifierId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ident_{}", self.0)
    }
}

/// Values already produced for identifiers during one update run
pub type IdentifierValues = HashMap<IdentifierId, GeneratedValue>;

/// `(placeholder, value)` pairs a command hands to the translator
pub type GeneratedValues = Vec<(Arc<dyn ResultPlaceholder>, GeneratedValue)>;

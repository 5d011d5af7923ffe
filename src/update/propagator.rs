// ============================================================================
// Result Placeholders
// ============================================================================
//
// A placeholder stands for one scalar destined for an entity member. The
// command reads it to build the store command; once the command succeeds
// the translator writes any server-generated value back through it.
//
// ============================================================================

use super::IdentifierId;
use crate::core::{GeneratedValue, Result, Value};
use crate::state::EntityStateEntry;
use std::fmt::Debug;
use std::ops::BitOr;
use std::sync::{Arc, RwLock};

/// Receiver of a value generated by the store.
pub trait ResultPlaceholder: Send + Sync + Debug {
    /// Store a value returned by the store. Called by the translator only,
    /// after the owning command succeeded.
    fn set_server_gen_value(&self, value: GeneratedValue) -> Result<()>;

    /// Value the command should send for this member
    fn value(&self) -> GeneratedValue;

    fn identifier(&self) -> Option<IdentifierId> {
        None
    }

    fn flags(&self) -> PropagatorFlags {
        PropagatorFlags::NO_FLAGS
    }

    /// Entry whose member this placeholder writes into, if any
    fn state_entry(&self) -> Option<Arc<EntityStateEntry>> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PropagatorFlags(u8);

impl PropagatorFlags {
    pub const NO_FLAGS: PropagatorFlags = PropagatorFlags(0);
    /// Member is part of the entity key
    pub const KEY: PropagatorFlags = PropagatorFlags(1);
    pub const FOREIGN_KEY: PropagatorFlags = PropagatorFlags(1 << 1);
    /// Member value is produced by the store
    pub const SERVER_GEN: PropagatorFlags = PropagatorFlags(1 << 2);

    pub fn contains(&self, other: PropagatorFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for PropagatorFlags {
    type Output = PropagatorFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        PropagatorFlags(self.0 | rhs.0)
    }
}

#[derive(Debug)]
struct MemberBinding {
    entry: Arc<EntityStateEntry>,
    ordinal: usize,
}

#[derive(Debug)]
pub struct PropagatorResult {
    flags: PropagatorFlags,
    identifier: Option<IdentifierId>,
    value: RwLock<GeneratedValue>,
    binding: Option<MemberBinding>,
}

impl PropagatorResult {
    /// Placeholder not bound to any entity member
    pub fn simple_value(flags: PropagatorFlags, value: impl Into<Value>) -> Self {
        Self {
            flags,
            identifier: None,
            value: RwLock::new(Arc::new(value.into())),
            binding: None,
        }
    }

    /// Placeholder for member `ordinal` of `entry`, seeded with its current value
    pub fn member_value(flags: PropagatorFlags, entry: Arc<EntityStateEntry>, ordinal: usize) -> Self {
        let value = entry
            .current_value(ordinal)
            .unwrap_or_else(|| Arc::new(Value::Null));
        Self {
            flags,
            identifier: None,
            value: RwLock::new(value),
            binding: Some(MemberBinding { entry, ordinal }),
        }
    }

    pub fn with_identifier(mut self, identifier: IdentifierId) -> Self {
        self.identifier = Some(identifier);
        self
    }
}

impl ResultPlaceholder for PropagatorResult {
    fn set_server_gen_value(&self, value: GeneratedValue) -> Result<()> {
        if let Some(binding) = &self.binding {
            binding.entry.set_current_value(binding.ordinal, value.clone())?;
        }
        *self.value.write()? = value;
        Ok(())
    }

    fn value(&self) -> GeneratedValue {
        self.value
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn identifier(&self) -> Option<IdentifierId> {
        self.identifier
    }

    fn flags(&self) -> PropagatorFlags {
        self.flags
    }

    fn state_entry(&self) -> Option<Arc<EntityStateEntry>> {
        self.binding.as_ref().map(|binding| binding.entry.clone())
    }
}

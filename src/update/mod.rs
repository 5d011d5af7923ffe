// ============================================================================
// Update Pipeline
// ============================================================================
//
// Turns pending entity changes into executed store commands:
// - Producer: orders the commands of one run by identifier dependencies
// - Command: one insert/update/delete plus the placeholders it reads and fills
// - Translator: executes, propagates generated values, translates failures
//
// ============================================================================

pub mod command;
pub mod config;
pub mod error;
pub mod identifier;
pub mod producer;
pub mod propagator;
pub mod translator;

pub use command::{ModificationCommand, UpdateCommand};
pub use config::UpdateConfig;
pub use error::{GENERAL_EXECUTION_MESSAGE, UpdateError};
pub use identifier::{GeneratedValues, IdentifierId, IdentifierValues};
pub use producer::{CommandProducer, OrderedCommandProducer, order_commands};
pub use propagator::{PropagatorFlags, PropagatorResult, ResultPlaceholder};
pub use translator::UpdateTranslator;

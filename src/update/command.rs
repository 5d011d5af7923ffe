use super::{
    GeneratedValues, IdentifierId, IdentifierValues, PropagatorFlags, ResultPlaceholder,
    UpdateTranslator,
};
use crate::core::{DbError, GeneratedValue, Result};
use crate::state::EntityStateEntry;
use crate::storage::{CommandKind, StoreCommand, StoreConnection, StoreOutcome};

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// One atomic modification the translator executes.
#[async_trait]
pub trait UpdateCommand: Send + Sync {
    fn kind(&self) -> CommandKind;

    /// Execute on the caller's thread.
    ///
    /// Returns the raw affected-row count and appends every value the store
    /// generated to `generated_values`.
    fn execute(
        &self,
        identifier_values: &mut IdentifierValues,
        generated_values: &mut GeneratedValues,
    ) -> Result<i64>;

    /// Non-blocking execution; same contract as [`UpdateCommand::execute`].
    async fn execute_async(
        &self,
        identifier_values: &mut IdentifierValues,
        generated_values: &mut GeneratedValues,
        cancel: &CancellationToken,
    ) -> Result<i64> {
        if cancel.is_cancelled() {
            return Err(DbError::Cancelled);
        }
        self.execute(identifier_values, generated_values)
    }

    /// Entries this command modifies
    fn state_entries(&self, translator: &UpdateTranslator) -> Vec<Arc<EntityStateEntry>>;

    /// Identifiers whose values this command consumes
    fn input_identifiers(&self) -> Vec<IdentifierId> {
        Vec::new()
    }

    /// Identifiers whose values this command produces
    fn output_identifiers(&self) -> Vec<IdentifierId> {
        Vec::new()
    }
}

type ColumnBinding = (String, Arc<dyn ResultPlaceholder>);

/// Insert, update or delete of a single row
pub struct ModificationCommand {
    kind: CommandKind,
    table: String,
    store: Arc<dyn StoreConnection>,
    values: Vec<ColumnBinding>,
    keys: Vec<ColumnBinding>,
    outputs: Vec<ColumnBinding>,
    state_entries: Vec<Arc<EntityStateEntry>>,
}

impl ModificationCommand {
    pub fn new(kind: CommandKind, store: Arc<dyn StoreConnection>, table: &str) -> Self {
        Self {
            kind,
            table: table.to_string(),
            store,
            values: Vec::new(),
            keys: Vec::new(),
            outputs: Vec::new(),
            state_entries: Vec::new(),
        }
    }

    pub fn insert(store: Arc<dyn StoreConnection>, table: &str) -> Self {
        Self::new(CommandKind::Insert, store, table)
    }

    pub fn update(store: Arc<dyn StoreConnection>, table: &str) -> Self {
        Self::new(CommandKind::Update, store, table)
    }

    pub fn delete(store: Arc<dyn StoreConnection>, table: &str) -> Self {
        Self::new(CommandKind::Delete, store, table)
    }

    /// Write `column` from `placeholder`
    pub fn set(mut self, column: &str, placeholder: Arc<dyn ResultPlaceholder>) -> Self {
        self.values.push((column.to_string(), placeholder));
        self
    }

    /// Identify the target row by `column`
    pub fn key(mut self, column: &str, placeholder: Arc<dyn ResultPlaceholder>) -> Self {
        self.keys.push((column.to_string(), placeholder));
        self
    }

    /// Read `column` back from the store into `placeholder`
    pub fn output(mut self, column: &str, placeholder: Arc<dyn ResultPlaceholder>) -> Self {
        self.outputs.push((column.to_string(), placeholder));
        self
    }

    pub fn entry(mut self, entry: Arc<EntityStateEntry>) -> Self {
        self.state_entries.push(entry);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Resolve placeholders into a store command.
    ///
    /// Inputs whose identifier already has a generated value take that value,
    /// and the pair is queued so the dependent member gets it too. Updates and
    /// deletes must name their row by key, and outputs must be server-generated.
    fn build_store_command(
        &self,
        identifier_values: &IdentifierValues,
        generated_values: &mut GeneratedValues,
    ) -> Result<StoreCommand> {
        if self.kind != CommandKind::Insert && self.keys.is_empty() {
            return Err(DbError::ExecutionError(format!(
                "{} on '{}' has no key columns",
                self.kind, self.table
            )));
        }
        if let Some((column, _)) = self
            .outputs
            .iter()
            .find(|(_, placeholder)| !placeholder.flags().contains(PropagatorFlags::SERVER_GEN))
        {
            return Err(DbError::ExecutionError(format!(
                "Output column '{}' of '{}' is not server-generated",
                column, self.table
            )));
        }

        let mut command = StoreCommand::new(self.kind, &self.table);
        let mut resolve = |placeholder: &Arc<dyn ResultPlaceholder>| {
            let substituted = placeholder
                .identifier()
                .and_then(|id| identifier_values.get(&id).cloned());
            match substituted {
                Some(value) => {
                    generated_values.push((placeholder.clone(), value.clone()));
                    (*value).clone()
                }
                None => (*placeholder.value()).clone(),
            }
        };

        for (column, placeholder) in &self.values {
            command.values.push((column.clone(), resolve(placeholder)));
        }
        for (column, placeholder) in &self.keys {
            command.keys.push((column.clone(), resolve(placeholder)));
        }
        command.returning = self.outputs.iter().map(|(column, _)| column.clone()).collect();
        Ok(command)
    }

    fn record_outputs(
        &self,
        outcome: StoreOutcome,
        identifier_values: &mut IdentifierValues,
        generated_values: &mut GeneratedValues,
    ) -> Result<i64> {
        for (column, placeholder) in &self.outputs {
            let value: GeneratedValue = outcome
                .returned_value(column)
                .cloned()
                .map(Arc::new)
                .ok_or_else(|| {
                    DbError::ExecutionError(format!(
                        "Store returned no value for output column '{}' of '{}'",
                        column, self.table
                    ))
                })?;
            if let Some(id) = placeholder.identifier() {
                identifier_values.insert(id, value.clone());
            }
            generated_values.push((placeholder.clone(), value));
        }
        Ok(outcome.rows_affected)
    }
}

#[async_trait]
impl UpdateCommand for ModificationCommand {
    fn kind(&self) -> CommandKind {
        self.kind
    }

    fn execute(
        &self,
        identifier_values: &mut IdentifierValues,
        generated_values: &mut GeneratedValues,
    ) -> Result<i64> {
        let command = self.build_store_command(identifier_values, generated_values)?;
        trace!(kind = %self.kind, table = %self.table, "executing modification");
        let outcome = self.store.execute(&command)?;
        self.record_outputs(outcome, identifier_values, generated_values)
    }

    async fn execute_async(
        &self,
        identifier_values: &mut IdentifierValues,
        generated_values: &mut GeneratedValues,
        cancel: &CancellationToken,
    ) -> Result<i64> {
        let command = self.build_store_command(identifier_values, generated_values)?;
        trace!(kind = %self.kind, table = %self.table, "executing modification (async)");
        let outcome = self.store.execute_async(&command, cancel).await?;
        self.record_outputs(outcome, identifier_values, generated_values)
    }

    fn state_entries(&self, _translator: &UpdateTranslator) -> Vec<Arc<EntityStateEntry>> {
        self.state_entries.clone()
    }

    fn input_identifiers(&self) -> Vec<IdentifierId> {
        let produced = self.output_identifiers();
        let mut inputs: Vec<IdentifierId> = self
            .values
            .iter()
            .chain(self.keys.iter())
            .filter_map(|(_, placeholder)| placeholder.identifier())
            .filter(|id| !produced.contains(id))
            .collect();
        inputs.sort();
        inputs.dedup();
        inputs
    }

    fn output_identifiers(&self) -> Vec<IdentifierId> {
        self.outputs
            .iter()
            .filter_map(|(_, placeholder)| placeholder.identifier())
            .collect()
    }
}

// ============================================================================
// Update Translator
// ============================================================================
//
// Runs the commands of one update: executes them in the order the producer
// hands them out, validates row counts, writes server-generated values back
// through their placeholders after each command, and translates any failure
// into an `UpdateError` carrying the implicated state entries.
//
// Commands executed before a failing one are not rolled back here.
//
// ============================================================================

use super::{
    CommandProducer, GeneratedValues, IdentifierValues, UpdateCommand, UpdateConfig, UpdateError,
};
use crate::core::DbError;
use crate::state::EntityStateEntry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

pub struct UpdateTranslator {
    producer: Arc<dyn CommandProducer>,
    config: UpdateConfig,
}

impl UpdateTranslator {
    pub fn new(producer: Arc<dyn CommandProducer>) -> Self {
        Self::with_config(producer, UpdateConfig::default())
    }

    pub fn with_config(producer: Arc<dyn CommandProducer>, config: UpdateConfig) -> Self {
        Self { producer, config }
    }

    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Execute every command on the caller's thread.
    ///
    /// Returns the number of state entries whose changes were accepted.
    pub fn update(&self) -> Result<u64, UpdateError> {
        let span = info_span!("update", mode = "blocking");
        let _enter = span.enter();

        let commands = self.producer.produce_commands(self)?;
        debug!(commands = commands.len(), "executing update commands");

        let mut identifier_values = IdentifierValues::new();
        let mut generated_values = GeneratedValues::new();
        let mut accepted = AcceptedEntries::default();

        for command in &commands {
            let rows_affected = command
                .execute(&mut identifier_values, &mut generated_values)
                .map_err(|err| self.translate_failure(command.as_ref(), err))?;
            self.complete_command(command.as_ref(), rows_affected, &mut generated_values, &mut accepted)?;
        }

        Ok(self.finish(accepted))
    }

    /// Execute every command through the non-blocking path, one at a time.
    ///
    /// `cancel` is checked before each command and handed to it; a fired
    /// token ends the run with [`UpdateError::Cancelled`].
    pub async fn update_async(&self, cancel: &CancellationToken) -> Result<u64, UpdateError> {
        let span = info_span!("update", mode = "async");
        self.run_async(cancel).instrument(span).await
    }

    async fn run_async(&self, cancel: &CancellationToken) -> Result<u64, UpdateError> {
        let commands = self.producer.produce_commands(self)?;
        debug!(commands = commands.len(), "executing update commands");

        let mut identifier_values = IdentifierValues::new();
        let mut generated_values = GeneratedValues::new();
        let mut accepted = AcceptedEntries::default();

        for command in &commands {
            if cancel.is_cancelled() {
                warn!("update cancelled before {} command", command.kind());
                return Err(UpdateError::Cancelled);
            }

            let execution = command.execute_async(&mut identifier_values, &mut generated_values, cancel);
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(DbError::Cancelled),
                result = async {
                    match self.config.command_timeout {
                        Some(limit) => tokio::time::timeout(limit, execution)
                            .await
                            .unwrap_or(Err(DbError::Timeout(limit))),
                        None => execution.await,
                    }
                } => result,
            };

            let rows_affected = result.map_err(|err| self.translate_failure(command.as_ref(), err))?;
            self.complete_command(command.as_ref(), rows_affected, &mut generated_values, &mut accepted)?;
        }

        Ok(self.finish(accepted))
    }

    fn translate_failure(&self, command: &dyn UpdateCommand, err: DbError) -> UpdateError {
        if matches!(err, DbError::Cancelled) {
            warn!("update cancelled during {} command", command.kind());
            return UpdateError::Cancelled;
        }
        warn!(error = %err, "{} command failed", command.kind());
        UpdateError::Execution {
            source: err,
            state_entries: command.state_entries(self),
        }
    }

    fn complete_command(
        &self,
        command: &dyn UpdateCommand,
        rows_affected: i64,
        generated_values: &mut GeneratedValues,
        accepted: &mut AcceptedEntries,
    ) -> Result<(), UpdateError> {
        if self.config.validate_rows_affected && rows_affected == 0 {
            return Err(UpdateError::Concurrency {
                rows_affected,
                state_entries: command.state_entries(self),
            });
        }

        let propagated = generated_values.len();
        for (placeholder, value) in generated_values.drain(..) {
            placeholder
                .set_server_gen_value(value)
                .map_err(|source| UpdateError::Propagation {
                    source,
                    state_entries: placeholder.state_entry().into_iter().collect(),
                })?;
        }

        debug!(
            kind = %command.kind(),
            rows_affected,
            propagated,
            "command completed"
        );

        for entry in command.state_entries(self) {
            accepted.record(entry);
        }
        Ok(())
    }

    fn finish(&self, accepted: AcceptedEntries) -> u64 {
        let count = if self.config.accept_changes {
            accepted.accept_all()
        } else {
            accepted.len()
        };
        debug!(entries = count, "update finished");
        count as u64
    }
}

/// Distinct pending entries touched by the commands executed so far
#[derive(Default)]
struct AcceptedEntries {
    entries: Vec<Arc<EntityStateEntry>>,
}

impl AcceptedEntries {
    fn record(&mut self, entry: Arc<EntityStateEntry>) {
        if entry.state().is_pending() && !self.entries.iter().any(|seen| Arc::ptr_eq(seen, &entry)) {
            self.entries.push(entry);
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn accept_all(self) -> usize {
        self.entries
            .into_iter()
            .filter(|entry| entry.accept_changes())
            .count()
    }
}

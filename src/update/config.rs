use crate::core::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Update translator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Upper bound for one command on the non-blocking path
    pub command_timeout: Option<Duration>,

    /// Treat a command that affects no rows as a concurrency conflict
    pub validate_rows_affected: bool,

    /// Move accepted entries to their post-update state after a successful run
    pub accept_changes: bool,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            command_timeout: None,
            validate_rows_affected: true,
            accept_changes: true,
        }
    }
}

impl UpdateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set command timeout
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    pub fn validate_rows_affected(mut self, validate: bool) -> Self {
        self.validate_rows_affected = validate;
        self
    }

    pub fn accept_changes(mut self, accept: bool) -> Self {
        self.accept_changes = accept;
        self
    }

    /// Parse from JSON; absent fields keep their defaults
    ///
    /// ```
    /// # use rustmemodb_update::UpdateConfig;
    /// let config = UpdateConfig::from_json(r#"{ "accept_changes": false }"#).unwrap();
    /// assert!(!config.accept_changes);
    /// assert!(config.validate_rows_affected);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DbError;

    #[test]
    fn test_builder() {
        let config = UpdateConfig::new()
            .command_timeout(Duration::from_secs(5))
            .validate_rows_affected(false);

        assert_eq!(config.command_timeout, Some(Duration::from_secs(5)));
        assert!(!config.validate_rows_affected);
        assert!(config.accept_changes);
    }

    #[test]
    fn test_from_json_with_timeout() {
        let config =
            UpdateConfig::from_json(r#"{ "command_timeout": { "secs": 2, "nanos": 0 } }"#).unwrap();
        assert_eq!(config.command_timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_from_json_invalid() {
        let err = UpdateConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, DbError::InvalidConfig(_)));
    }
}

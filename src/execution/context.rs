//! Execution Context
//!
//! Session configuration and the statement-level state shared with
//! expression evaluation.

use crate::common::error::{PrismDBError, PrismDBResult};
use crate::types::Value;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared handle to an execution context. Function implementations hold one
/// for the lifetime of the query that built them.
pub type ContextRef = Arc<ExecutionContext>;

/// Session settings that influence expression semantics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Integer overflow raises an error instead of wrapping with a warning
    pub fail_on_overflow: bool,
    /// String comparison ignores case
    pub case_insensitive_collation: bool,
    /// Failed string-to-number conversions produce a warning and zero
    pub truncate_as_warning: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fail_on_overflow: true,
            case_insensitive_collation: false,
            truncate_as_warning: false,
        }
    }
}

impl SessionConfig {
    /// Apply a `SET name = value` style setting
    pub fn set(&mut self, key: &str, value: &str) -> PrismDBResult<()> {
        let flag = parse_flag(value)?;
        match key.to_lowercase().as_str() {
            "fail_on_overflow" => self.fail_on_overflow = flag,
            "case_insensitive_collation" => self.case_insensitive_collation = flag,
            "truncate_as_warning" => self.truncate_as_warning = flag,
            other => {
                return Err(PrismDBError::Configuration(format!(
                    "Unknown setting '{}'",
                    other
                )))
            }
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> PrismDBResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Ok(true),
        "false" | "off" | "0" | "no" => Ok(false),
        other => Err(PrismDBError::Configuration(format!(
            "Expected a boolean setting, got '{}'",
            other
        ))),
    }
}

/// Per-statement evaluation state. Read-only during evaluation apart from
/// the warning list.
#[derive(Debug, Default)]
pub struct StatementContext {
    pub fail_on_overflow: bool,
    pub case_insensitive_collation: bool,
    pub truncate_as_warning: bool,
    warnings: Mutex<Vec<String>>,
}

impl StatementContext {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            fail_on_overflow: config.fail_on_overflow,
            case_insensitive_collation: config.case_insensitive_collation,
            truncate_as_warning: config.truncate_as_warning,
            warnings: Mutex::new(Vec::new()),
        }
    }

    pub fn append_warning(&self, warning: impl Into<String>) {
        let warning = warning.into();
        tracing::warn!(%warning, "statement warning");
        self.warnings.lock().push(warning);
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().clone()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.lock().len()
    }
}

/// Execution context for query execution
#[derive(Debug)]
pub struct ExecutionContext {
    config: SessionConfig,
    statement: StatementContext,
    /// Row being inserted, read by `values(col)` in ON DUPLICATE KEY UPDATE
    insert_values: RwLock<Option<Vec<Value>>>,
}

impl ExecutionContext {
    /// Create a new execution context
    pub fn new(config: SessionConfig) -> Self {
        let statement = StatementContext::from_config(&config);
        Self {
            config,
            statement,
            insert_values: RwLock::new(None),
        }
    }

    /// Create a shared context with default settings
    pub fn shared() -> ContextRef {
        Arc::new(Self::new(SessionConfig::default()))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn statement(&self) -> &StatementContext {
        &self.statement
    }

    /// Publish the row currently being inserted
    pub fn set_insert_values(&self, row: Option<Vec<Value>>) {
        *self.insert_values.write() = row;
    }

    /// Run `f` over the row being inserted; `None` outside an insert
    pub fn with_insert_values<R>(&self, f: impl FnOnce(Option<&[Value]>) -> R) -> R {
        let guard = self.insert_values.read();
        f(guard.as_deref())
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_settings() {
        let mut config = SessionConfig::default();
        config.set("FAIL_ON_OVERFLOW", "off").unwrap();
        config.set("case_insensitive_collation", "1").unwrap();
        assert!(!config.fail_on_overflow);
        assert!(config.case_insensitive_collation);
        assert!(matches!(
            config.set("time_zone", "true"),
            Err(PrismDBError::Configuration(_))
        ));
        assert!(config.set("fail_on_overflow", "maybe").is_err());
    }

    #[test]
    fn test_config_from_json() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"case_insensitive_collation": true}"#).unwrap();
        assert!(config.case_insensitive_collation);
        assert!(config.fail_on_overflow);
    }

    #[test]
    fn test_statement_warnings() {
        let ctx = ExecutionContext::new(SessionConfig::default());
        ctx.statement().append_warning("division by zero");
        assert_eq!(ctx.statement().warning_count(), 1);
        assert_eq!(ctx.statement().warnings(), vec!["division by zero"]);
    }

    #[test]
    fn test_insert_values() {
        let ctx = ExecutionContext::shared();
        assert_eq!(ctx.with_insert_values(|row| row.map(<[Value]>::len)), None);
        ctx.set_insert_values(Some(vec![Value::Int(4)]));
        assert_eq!(
            ctx.with_insert_values(|row| row.and_then(|r| r.first().cloned())),
            Some(Value::Int(4))
        );
        ctx.set_insert_values(None);
        assert!(ctx.with_insert_values(|row| row.is_none()));
    }
}

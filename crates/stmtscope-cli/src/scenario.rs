//! Replay scenario files.
//!
//! A scenario scripts a connection and a statement, then lists the steps to
//! run against the instrumented statement:
//!
//! ```toml
//! name = "nightly batch"
//!
//! [connection]
//! url = "postgres://db/app"
//! auto_commit = false
//!
//! [statement.updates]
//! "UPDATE t SET x=1" = 3
//!
//! [[steps]]
//! op = "update"
//! sql = "UPDATE t SET x=1"
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use stmtscope::prelude::*;
use stmtscope_core::scripted::{ScriptedConnection, ScriptedResultSet, ScriptedStatement};

/// A parsed scenario.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    /// Display name.
    pub name: Option<String>,
    /// The scripted connection.
    pub connection: ConnectionSpec,
    /// The scripted statement.
    pub statement: StatementSpec,
    /// Operations to run, in order.
    pub steps: Vec<Step>,
}

/// Connection the statement belongs to.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionSpec {
    pub url: String,
    pub user: Option<String>,
    pub auto_commit: bool,
    pub data_source: Option<String>,
}

impl Default for ConnectionSpec {
    fn default() -> Self {
        Self {
            url: "scripted://localhost".to_string(),
            user: None,
            auto_commit: true,
            data_source: None,
        }
    }
}

/// Canned answers of the statement.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatementSpec {
    pub poolable: bool,
    pub updates: BTreeMap<String, i32>,
    pub queries: Vec<QuerySpec>,
    pub generated_keys: Option<TableSpec>,
    pub failures: Vec<FailureSpec>,
}

/// Rows returned for one query.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuerySpec {
    pub sql: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

/// Column labels and rows.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableSpec {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl TableSpec {
    fn to_result_set(&self) -> ScriptedResultSet {
        ScriptedResultSet::new(self.columns.iter().cloned(), self.rows.iter().cloned())
    }
}

/// An error injected for SQL text or an operation key.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FailureSpec {
    /// SQL text, or one of `cancel`, `execute_batch`, `get_result_set`,
    /// `get_generated_keys`.
    pub key: String,
    pub message: String,
    #[serde(default)]
    pub sql_state: Option<String>,
    #[serde(default)]
    pub vendor_code: i32,
}

impl FailureSpec {
    fn to_error(&self) -> SqlError {
        SqlError::Database {
            sql_state: self.sql_state.clone(),
            vendor_code: self.vendor_code,
            message: self.message.clone(),
        }
    }
}

/// One operation on the instrumented statement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Query { sql: String },
    Update { sql: String },
    Execute { sql: String },
    AddBatch { sql: String },
    ClearBatch,
    ExecuteBatch,
    Cancel,
    GeneratedKeys,
    ResultSet,
    Close,
}

impl Step {
    /// The `op` tag.
    pub fn op(&self) -> &'static str {
        match self {
            Step::Query { .. } => "query",
            Step::Update { .. } => "update",
            Step::Execute { .. } => "execute",
            Step::AddBatch { .. } => "add_batch",
            Step::ClearBatch => "clear_batch",
            Step::ExecuteBatch => "execute_batch",
            Step::Cancel => "cancel",
            Step::GeneratedKeys => "generated_keys",
            Step::ResultSet => "result_set",
            Step::Close => "close",
        }
    }

    /// SQL carried by the step, if any.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Step::Query { sql }
            | Step::Update { sql }
            | Step::Execute { sql }
            | Step::AddBatch { sql } => Some(sql),
            _ => None,
        }
    }
}

impl Scenario {
    /// Read and parse a scenario file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid scenario {}", path.display()))
    }

    /// Parse scenario TOML.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// What the connection event reports.
    pub fn connect_info(&self) -> ConnectInfo {
        let mut info = ConnectInfo::new(self.connection.url.clone());
        if let Some(user) = &self.connection.user {
            info = info.with_user(user.clone());
        }
        if let Some(data_source) = &self.connection.data_source {
            info = info.with_data_source(ResourceId::next(), data_source.clone());
        }
        info
    }

    /// The scripted connection.
    pub fn build_connection(&self) -> Arc<ScriptedConnection> {
        ScriptedConnection::new()
            .with_auto_commit(self.connection.auto_commit)
            .into_shared()
    }

    /// The scripted statement, opened on `connection`.
    pub fn build_statement(&self, connection: Arc<ScriptedConnection>) -> ScriptedStatement {
        let spec = &self.statement;
        let mut statement = ScriptedStatement::new()
            .with_connection(connection)
            .with_poolable(spec.poolable);
        for (sql, count) in &spec.updates {
            statement = statement.with_update(sql.clone(), *count);
        }
        for query in &spec.queries {
            let rows =
                ScriptedResultSet::new(query.columns.iter().cloned(), query.rows.iter().cloned());
            statement = statement.with_query(query.sql.clone(), rows);
        }
        if let Some(keys) = &spec.generated_keys {
            statement = statement.with_generated_keys(keys.to_result_set());
        }
        for failure in &spec.failures {
            statement = statement.with_failure(failure.key.clone(), failure.to_error());
        }
        statement
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNTS: &str = include_str!("../scenarios/accounts.toml");

    #[test]
    fn test_parse_bundled_scenario() {
        let scenario = Scenario::parse(ACCOUNTS).unwrap();

        assert_eq!(scenario.name.as_deref(), Some("accounts"));
        assert!(!scenario.connection.auto_commit);
        assert_eq!(scenario.statement.queries.len(), 1);
        assert_eq!(scenario.statement.queries[0].rows.len(), 2);
        assert_eq!(scenario.steps.first().map(Step::op), Some("query"));
        assert!(scenario.steps.contains(&Step::Cancel));
    }

    #[test]
    fn test_defaults() {
        let scenario = Scenario::parse("[[steps]]\nop = \"execute_batch\"").unwrap();

        assert_eq!(scenario.connection.url, "scripted://localhost");
        assert!(scenario.connection.auto_commit);
        assert_eq!(scenario.steps, [Step::ExecuteBatch]);
    }

    #[test]
    fn test_statement_follows_script() {
        let scenario = Scenario::parse(
            r#"
            [statement.updates]
            "UPDATE t SET x=1" = 3

            [[statement.failures]]
            key = "DROP TABLE t"
            message = "permission denied"
            sql_state = "42501"
            "#,
        )
        .unwrap();

        let mut statement = scenario.build_statement(scenario.build_connection());
        assert_eq!(statement.execute_update("UPDATE t SET x=1").unwrap(), 3);
        let error = statement.execute("DROP TABLE t").unwrap_err();
        assert_eq!(error.sql_state(), Some("42501"));
    }

    #[test]
    fn test_unknown_op_is_rejected() {
        assert!(Scenario::parse("[[steps]]\nop = \"vacuum\"").is_err());
    }

    #[test]
    fn test_step_sql() {
        let step = Step::AddBatch {
            sql: "INSERT INTO t VALUES (1)".to_string(),
        };
        assert_eq!(step.op(), "add_batch");
        assert_eq!(step.sql(), Some("INSERT INTO t VALUES (1)"));
        assert_eq!(Step::Close.sql(), None);
    }
}

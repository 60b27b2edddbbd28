//! Configuration for statement proxies.

use thiserror::Error;

/// Errors in a [`ProxyConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// SQL truncation length of zero.
    #[error("max_sql_length must be greater than zero")]
    ZeroSqlLength,

    /// A placeholder label was empty.
    #[error("{0} must not be empty")]
    EmptyLabel(&'static str),
}

/// How a proxy describes operations in its events.
///
/// The defaults reproduce the caller's SQL text verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Appended after every batch fragment.
    ///
    /// Defaults to `";"`.
    pub batch_separator: String,

    /// Event SQL for retrieving the current result set.
    pub result_set_label: String,

    /// Event SQL for retrieving generated keys.
    pub generated_keys_label: String,

    /// Truncate captured SQL to this many characters.
    pub max_sql_length: Option<usize>,

    /// Record caller SQL at all. When disabled, statement events carry an
    /// empty `sql` except for the retrieval labels.
    pub capture_sql: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            batch_separator: ";".to_string(),
            result_set_label: "getResultSet".to_string(),
            generated_keys_label: "getGeneratedKeys".to_string(),
            max_sql_length: None,
            capture_sql: true,
        }
    }
}

impl ProxyConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the batch separator.
    pub fn with_batch_separator(mut self, separator: impl Into<String>) -> Self {
        self.batch_separator = separator.into();
        self
    }

    /// Set the result-set retrieval label.
    pub fn with_result_set_label(mut self, label: impl Into<String>) -> Self {
        self.result_set_label = label.into();
        self
    }

    /// Set the generated-keys retrieval label.
    pub fn with_generated_keys_label(mut self, label: impl Into<String>) -> Self {
        self.generated_keys_label = label.into();
        self
    }

    /// Truncate captured SQL.
    pub fn with_max_sql_length(mut self, chars: usize) -> Self {
        self.max_sql_length = Some(chars);
        self
    }

    /// Enable or disable SQL capture.
    pub fn with_capture_sql(mut self, enabled: bool) -> Self {
        self.capture_sql = enabled;
        self
    }

    /// Check the configuration for unusable values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sql_length == Some(0) {
            return Err(ConfigError::ZeroSqlLength);
        }
        if self.result_set_label.is_empty() {
            return Err(ConfigError::EmptyLabel("result_set_label"));
        }
        if self.generated_keys_label.is_empty() {
            return Err(ConfigError::EmptyLabel("generated_keys_label"));
        }
        Ok(())
    }

    /// The text recorded for caller-supplied SQL.
    pub fn describe_sql(&self, sql: &str) -> String {
        if !self.capture_sql {
            return String::new();
        }
        match self.max_sql_length {
            Some(max) => match sql.char_indices().nth(max) {
                Some((cut, _)) => sql[..cut].to_string(),
                None => sql.to_string(),
            },
            None => sql.to_string(),
        }
    }
}

//! Value and option types shared by the capability traits.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{SqlError, SqlResult};

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier assigned to a wrapped resource when it is wrapped.
///
/// Identifiers come from a monotonically increasing counter, so two live
/// resources never share one. They are not persisted and carry no meaning
/// across process restarts; they only correlate events emitted for the
/// same resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Placeholder carried by records that have not been populated yet.
    pub const UNASSIGNED: ResourceId = ResourceId(0);

    /// Allocate the next identifier.
    pub fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }

    /// Whether this is the unassigned placeholder.
    pub fn is_unassigned(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ResourceId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Update count reported when the current result is a cursor or there are
/// no more results.
pub const NO_UPDATE_COUNT: i32 = -1;

/// Batch entry succeeded but the driver does not know the row count.
pub const SUCCESS_NO_INFO: i32 = -2;

/// Batch entry failed.
pub const EXECUTE_FAILED: i32 = -3;

/// Whether generated keys should be made available after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoGeneratedKeys {
    /// Make generated keys retrievable.
    Return,
    /// Do not retain generated keys.
    NoReturn,
}

/// What to do with the current cursor when moving to the next result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurrentResult {
    /// Close the current cursor.
    Close,
    /// Keep the current cursor open.
    Keep,
    /// Close every cursor previously kept open.
    CloseAll,
}

/// Direction hint for processing rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchDirection {
    /// First to last.
    #[default]
    Forward,
    /// Last to first.
    Reverse,
    /// Unknown order.
    Unknown,
}

/// Scrollability of produced cursors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSetType {
    /// Cursor may only move forward.
    #[default]
    ForwardOnly,
    /// Scrollable, not sensitive to concurrent changes.
    ScrollInsensitive,
    /// Scrollable and sensitive to concurrent changes.
    ScrollSensitive,
}

/// Whether produced cursors can be updated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concurrency {
    /// Read-only cursor.
    #[default]
    ReadOnly,
    /// Updatable cursor.
    Updatable,
}

/// Cursor behavior on transaction commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Holdability {
    /// Cursors stay open across commit.
    HoldCursorsOverCommit,
    /// Cursors close at commit.
    #[default]
    CloseCursorsAtCommit,
}

/// A warning reported by a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlWarning {
    /// Warning text.
    pub message: String,
    /// SQLSTATE code, if reported.
    pub sql_state: Option<String>,
    /// Vendor-specific code.
    pub vendor_code: i32,
}

impl SqlWarning {
    /// Create a warning with no SQLSTATE.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sql_state: None,
            vendor_code: 0,
        }
    }
}

impl fmt::Display for SqlWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sql_state {
            Some(state) => write!(f, "[{}] {}", state, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// A single column value read from a cursor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Any integer type.
    Int(i64),
    /// Any floating point type.
    Float(f64),
    /// Character data.
    Text(String),
    /// Binary data.
    Bytes(Vec<u8>),
}

impl Value {
    /// Whether this value is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the variant, for conversion errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
        }
    }

    /// Read as text. Numbers and booleans are rendered.
    pub fn to_text(&self) -> SqlResult<Option<String>> {
        Ok(match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Bytes(_) => return Err(self.conversion_error("text")),
        })
    }

    /// Read as an integer.
    pub fn to_i64(&self) -> SqlResult<Option<i64>> {
        match self {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(i64::from(*b))),
            Value::Int(i) => Ok(Some(*i)),
            Value::Text(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| self.conversion_error("int")),
            Value::Float(_) | Value::Bytes(_) => Err(self.conversion_error("int")),
        }
    }

    /// Read as a float.
    pub fn to_f64(&self) -> SqlResult<Option<f64>> {
        match self {
            Value::Null => Ok(None),
            Value::Int(i) => Ok(Some(*i as f64)),
            Value::Float(f) => Ok(Some(*f)),
            Value::Text(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| self.conversion_error("float")),
            Value::Bool(_) | Value::Bytes(_) => Err(self.conversion_error("float")),
        }
    }

    /// Read as a boolean. Integers are true when non-zero.
    pub fn to_bool(&self) -> SqlResult<Option<bool>> {
        match self {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(*b)),
            Value::Int(i) => Ok(Some(*i != 0)),
            Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(Some(true)),
                "false" | "f" | "0" => Ok(Some(false)),
                _ => Err(self.conversion_error("bool")),
            },
            Value::Float(_) | Value::Bytes(_) => Err(self.conversion_error("bool")),
        }
    }

    /// Read as bytes. Text is returned as its UTF-8 encoding.
    pub fn to_bytes(&self) -> SqlResult<Option<Vec<u8>>> {
        match self {
            Value::Null => Ok(None),
            Value::Bytes(b) => Ok(Some(b.clone())),
            Value::Text(s) => Ok(Some(s.as_bytes().to_vec())),
            _ => Err(self.conversion_error("bytes")),
        }
    }

    fn conversion_error(&self, target: &str) -> SqlError {
        SqlError::InvalidArgument(format!("cannot read {} value as {}", self.type_name(), target))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_ids_are_distinct() {
        let a = ResourceId::next();
        let b = ResourceId::next();
        assert_ne!(a, b);
        assert!(b > a);
        assert!(!a.is_unassigned());
    }

    #[test]
    fn test_unassigned_is_default() {
        assert_eq!(ResourceId::default(), ResourceId::UNASSIGNED);
        assert!(ResourceId::UNASSIGNED.is_unassigned());
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::Int(7).to_text().unwrap(), Some("7".to_string()));
        assert_eq!(Value::from("42").to_i64().unwrap(), Some(42));
        assert_eq!(Value::Int(0).to_bool().unwrap(), Some(false));
        assert_eq!(Value::Null.to_f64().unwrap(), None);
        assert!(Value::Float(1.5).to_i64().is_err());
        assert!(Value::Bytes(vec![1]).to_text().is_err());
    }

    #[test]
    fn test_warning_display() {
        let mut warning = SqlWarning::new("truncated");
        assert_eq!(warning.to_string(), "truncated");
        warning.sql_state = Some("01004".to_string());
        assert_eq!(warning.to_string(), "[01004] truncated");
    }
}

//! stmtscope Core
//!
//! This crate defines the capability contract that stmtscope instruments:
//!
//! - [`Statement`]: a database command resource, the full surface a
//!   wrapper must forward
//! - [`Connection`]: the connection state statement telemetry snapshots
//! - [`ResultSet`]: the cursor returned by query execution
//! - [`SqlError`]: errors raised by any of the above
//! - [`ResourceId`]: identifiers assigned to wrapped resources
//!
//! Drivers implement these traits; `stmtscope-proxy` implements them again
//! as decorators. The [`scripted`] module provides in-memory
//! implementations with canned answers.
//!
//! # Example
//!
//! ```ignore
//! use stmtscope_core::prelude::*;
//!
//! fn row_count(stmt: &mut dyn Statement) -> SqlResult<i64> {
//!     let mut rs = stmt.execute_query("SELECT count(*) FROM t")?;
//!     rs.next()?;
//!     Ok(rs.get_i64(0)?.unwrap_or(0))
//! }
//! ```

pub mod connection;
pub mod error;
pub mod result_set;
pub mod scripted;
pub mod statement;
pub mod types;

// Re-export main types at crate root
pub use connection::{Connection, SharedConnection};
pub use error::{SqlError, SqlResult};
pub use result_set::{BoxedResultSet, ResultSet};
pub use statement::{BoxedStatement, Statement, StatementExt};
pub use types::{
    AutoGeneratedKeys, Concurrency, CurrentResult, EXECUTE_FAILED, FetchDirection, Holdability,
    NO_UPDATE_COUNT, ResourceId, ResultSetType, SUCCESS_NO_INFO, SqlWarning, Value,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::connection::{Connection, SharedConnection};
    pub use crate::error::{SqlError, SqlResult};
    pub use crate::result_set::{BoxedResultSet, ResultSet};
    pub use crate::statement::{Statement, StatementExt};
    pub use crate::types::{AutoGeneratedKeys, ResourceId, Value};
}

//! stmtscope Proxies
//!
//! Decorators that add telemetry to a driver's statements without changing
//! what the driver returns:
//!
//! - [`StatementProxy`]: wraps a [`Statement`](stmtscope_core::Statement)
//!   and emits one event per execution
//! - [`ResultSetProxy`]: wraps every cursor the statement hands back
//! - [`ProxyConfig`]: how operations are described in events
//!
//! # Example
//!
//! ```ignore
//! use stmtscope_proxy::{ProxyConfig, StatementProxy};
//!
//! let mut stmt = StatementProxy::builder(driver_statement)
//!     .factory(factory)
//!     .config(ProxyConfig::new().with_max_sql_length(4096))
//!     .build();
//!
//! stmt.add_batch("INSERT INTO t VALUES (1)")?;
//! stmt.add_batch("INSERT INTO t VALUES (2)")?;
//! stmt.execute_batch()?;
//! ```

#[macro_use]
mod forward;

pub mod batch;
pub mod config;
pub mod result_set;
pub mod statement;

pub use batch::BatchAccumulator;
pub use config::{ConfigError, ProxyConfig};
pub use result_set::ResultSetProxy;
pub use statement::{StatementProxy, StatementProxyBuilder};

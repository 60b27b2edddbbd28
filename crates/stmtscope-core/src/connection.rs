//! The slice of connection behavior telemetry needs.

use std::sync::Arc;

use crate::error::SqlResult;
use crate::types::ResourceId;

/// A connection that owns statements.
///
/// Only the state that statement telemetry snapshots is part of this
/// contract. Transaction and pooling control stay with the driver.
pub trait Connection: Send + Sync {
    /// Identifier assigned when this connection was opened through an
    /// instrumented path, if any.
    fn connection_id(&self) -> Option<ResourceId> {
        None
    }

    /// Whether each command commits on completion.
    fn get_auto_commit(&self) -> SqlResult<bool>;

    /// Whether the connection has been closed.
    fn is_closed(&self) -> SqlResult<bool>;

    /// Current catalog name.
    fn get_catalog(&self) -> SqlResult<Option<String>> {
        Ok(None)
    }

    /// Current schema name.
    fn get_schema(&self) -> SqlResult<Option<String>> {
        Ok(None)
    }

    /// Runtime type name reported in telemetry.
    fn class_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A shared connection reference.
pub type SharedConnection = Arc<dyn Connection>;

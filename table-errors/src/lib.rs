//! Error taxonomy for the table subsystem.
//!
//! Every failure a backend can produce collapses into exactly one of three
//! kinds: a transient [`TableError::ConnectionUnavailable`], which the
//! facade recovers from locally and never hands to the caller; a
//! [`TableError::Fatal`], which aborts the current event chunk; or a
//! [`TableError::Compile`], which can only occur while compiling a predicate
//! or update set, never on the hot path.

/// A type-erased source error, the way backend adapters report their own
/// failure types without this crate needing to know about them.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by every operation on the table facade.
#[derive(thiserror::Error, Debug)]
pub enum TableError {
    /// The backend is transiently unreachable. The facade always intercepts
    /// this variant itself; it should never reach application code.
    #[error("table `{table_id}` could not reach its backend: {source}")]
    ConnectionUnavailable {
        table_id: String,
        #[source]
        source: BoxError,
    },

    /// Any backend failure that isn't connectivity-related. Propagated to
    /// the caller, which aborts the current event chunk.
    #[error("table `{table_id}`: {source}")]
    Fatal {
        table_id: String,
        #[source]
        source: BoxError,
    },

    /// A `compileUpdateSet`/`compileCondition` failure. Only raised at query
    /// compile time.
    #[error("table `{table_id}` failed to compile: {message}")]
    Compile { table_id: String, message: String },

    /// An invariant the code assumed would hold did not.
    #[error("internal invariant violated: {0}")]
    Internal(String),

    /// A feature or combination of arguments this backend/table does not
    /// implement.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl TableError {
    /// True for the one variant the lifecycle state machine treats as
    /// transient and recoverable.
    pub fn is_connection_unavailable(&self) -> bool {
        matches!(self, TableError::ConnectionUnavailable { .. })
    }

    pub fn table_id(&self) -> Option<&str> {
        match self {
            TableError::ConnectionUnavailable { table_id, .. }
            | TableError::Fatal { table_id, .. }
            | TableError::Compile { table_id, .. } => Some(table_id),
            TableError::Internal(_) | TableError::Unsupported(_) => None,
        }
    }
}

pub type TableResult<T> = Result<T, TableError>;

/// Wraps `table_id` and `source` into a [`TableError::Fatal`]. Used at the
/// point a raw backend error crosses into the facade and has already been
/// determined not to be a connection-unavailable error.
pub fn table_err(table_id: impl Into<String>, source: impl Into<BoxError>) -> TableError {
    TableError::Fatal {
        table_id: table_id.into(),
        source: source.into(),
    }
}

/// Classifies a backend error as connection-unavailable or not, the way
/// `UpstreamDatabase` implementations classify their own error type via
/// `IsFatalError`.
pub trait IsConnectionUnavailable {
    fn is_connection_unavailable(&self) -> bool;
}

/// Short-circuits the current function with a [`TableError::Internal`].
///
/// Mirrors the `internal!()` macro observed at backend-adapter call sites:
/// it expands to a `return`, so it unifies with whatever type the enclosing
/// match arm or function needs, not just `Result`.
#[macro_export]
macro_rules! internal {
    ($($arg:tt)*) => {
        return Err($crate::TableError::Internal(format!($($arg)*)))
    };
}

/// Short-circuits the current function with a [`TableError::Unsupported`].
#[macro_export]
macro_rules! unsupported {
    ($($arg:tt)*) => {
        return Err($crate::TableError::Unsupported(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn table_err_is_fatal_not_connection_unavailable() {
        let err = table_err("t1", Boom);
        assert!(!err.is_connection_unavailable());
        assert_eq!(err.table_id(), Some("t1"));
    }

    #[test]
    fn connection_unavailable_is_classified_correctly() {
        let err = TableError::ConnectionUnavailable {
            table_id: "t1".into(),
            source: Box::new(Boom),
        };
        assert!(err.is_connection_unavailable());
        assert_eq!(err.table_id(), Some("t1"));
    }
}

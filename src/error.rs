//! Error and Result types.

use std::error::Error as StdError;

/// A type-erased error as produced by a database driver or an interaction.
pub type BoxDynError = Box<dyn StdError + Send + Sync + 'static>;

/// A specialized `Result` type for dbrunner.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Represents all the ways a method can fail within dbrunner.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Error returned by the underlying database driver.
    ///
    /// The driver error is kept as-is and can be recovered with
    /// [`Error::as_database_error`] or by downcasting the [`source`](StdError::source).
    #[error("error returned from database: {0}")]
    Database(#[source] BoxDynError),

    /// Error raised by a caller-supplied interaction.
    #[error("interaction failed: {0}")]
    Interaction(#[source] BoxDynError),

    /// [`Pool::remove`](crate::pool::Pool::remove) was called with a resource the
    /// pool does not know about (never added, or already removed).
    #[error("resource is not known to the pool")]
    UnknownResource,

    /// [`Pool::done`](crate::pool::Pool::done) was called with a resource that
    /// is not currently checked out.
    #[error("resource is not checked out")]
    NotCheckedOut,

    /// The pool was dropped while this request was waiting on it.
    #[error("attempted to wait on a pool that has been dropped")]
    PoolClosed,

    /// A runner was asked to start an interaction on a connection that already has a
    /// transaction open, left there by someone else sharing the connection or by a
    /// rollback that failed.
    #[error("a transaction is already open on this connection")]
    TransactionInProgress,

    /// A record was asked about a property its model does not declare.
    #[error("no property named {0:?}")]
    UnknownProperty(String),

    /// Invalid connection URI or pool options.
    #[error("error with configuration: {0}")]
    Configuration(String),
}

impl Error {
    /// Wrap a driver error.
    pub fn database(err: impl Into<BoxDynError>) -> Self {
        Error::Database(err.into())
    }

    /// Wrap an application error raised from inside an interaction.
    pub fn interaction(err: impl Into<BoxDynError>) -> Self {
        Error::Interaction(err.into())
    }

    /// Returns the driver error if this is a [`Error::Database`] of type `E`.
    pub fn as_database_error<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            Error::Database(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(Box::new(err))
    }
}

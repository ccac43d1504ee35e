use rusqlite::ErrorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type shared by every store adapter and the coordinator.
#[derive(Debug, Error)]
pub enum FederationError {
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("query error: {0}")]
    QueryError(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transaction error: {0}")]
    TransactionError(String),
    #[error("timeout: {0}")]
    Timeout(String),
}

/// Stable, serializable classification of a [`FederationError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ConnectionError,
    QueryError,
    NotFoundError,
    TransactionError,
    TimeoutError,
}

impl FederationError {
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        FederationError::ConnectionError(msg.into())
    }

    pub fn query<T: Into<String>>(msg: T) -> Self {
        FederationError::QueryError(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        FederationError::NotFound(msg.into())
    }

    pub fn transaction<T: Into<String>>(msg: T) -> Self {
        FederationError::TransactionError(msg.into())
    }

    pub fn timeout<T: Into<String>>(msg: T) -> Self {
        FederationError::Timeout(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FederationError::ConnectionError(_) => ErrorKind::ConnectionError,
            FederationError::QueryError(_) => ErrorKind::QueryError,
            FederationError::NotFound(_) => ErrorKind::NotFoundError,
            FederationError::TransactionError(_) => ErrorKind::TransactionError,
            FederationError::Timeout(_) => ErrorKind::TimeoutError,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FederationError::NotFound(_))
    }

    /// Classifies a SQLite failure raised on a read path.
    pub(crate) fn from_read(err: rusqlite::Error) -> Self {
        classify(err).unwrap_or_else(|err| FederationError::query(err.to_string()))
    }

    /// Classifies a SQLite failure raised inside a mutation.
    pub(crate) fn from_write(err: rusqlite::Error) -> Self {
        classify(err).unwrap_or_else(|err| FederationError::transaction(err.to_string()))
    }

    /// Re-labels a read-path failure that surfaced inside a transaction.
    pub(crate) fn into_transactional(self) -> Self {
        match self {
            FederationError::QueryError(msg) => FederationError::TransactionError(msg),
            other => other,
        }
    }
}

/// Maps the failure classes that do not depend on the calling path.
fn classify(err: rusqlite::Error) -> Result<FederationError, rusqlite::Error> {
    let code = match &err {
        rusqlite::Error::SqliteFailure(inner, _) => inner.code,
        _ => return Err(err),
    };
    match code {
        ErrorCode::OperationInterrupted => Ok(FederationError::timeout(format!(
            "statement exceeded its deadline: {err}"
        ))),
        ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => Ok(FederationError::timeout(
            format!("store lock not acquired in time: {err}"),
        )),
        ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::PermissionDenied => {
            Ok(FederationError::connection(err.to_string()))
        }
        _ => Err(err),
    }
}

pub type FederationResult<T> = Result<T, FederationError>;

/// Drains a `query_map` iterator, classifying the first failing row.
pub(crate) fn collect_rows<T, I>(rows: I) -> FederationResult<Vec<T>>
where
    I: Iterator<Item = rusqlite::Result<T>>,
{
    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(FederationError::from_read)?);
    }
    Ok(result)
}

//! Error types for mydml

use std::fmt;
use thiserror::Error;

/// Result type alias for mydml operations
pub type DmlResult<T> = Result<T, DmlError>;

/// Behavioral category of a [`DmlError`].
///
/// Callers branch on the kind instead of matching message text. Wrapping an
/// error with context never changes its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Required input missing (no table, no SET entries, no terminal statement).
    Empty,
    /// Malformed input: placeholder/argument mismatch, invalid UTF-8, bad operand count.
    NotValid,
    /// Unknown column name or unknown key.
    NotFound,
    /// Unhandled mode, unsupported statement shape or argument kind.
    NotSupported,
    /// Repetition-marker count differs from the repetition counts given.
    Mismatch,
    /// Operation on a closed connection, transaction or pool.
    AlreadyClosed,
    /// Numeric parameter outside its allowed range.
    OutOfRange,
    /// Error reported by the database driver.
    Driver,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Empty => "empty",
            ErrorKind::NotValid => "not valid",
            ErrorKind::NotFound => "not found",
            ErrorKind::NotSupported => "not supported",
            ErrorKind::Mismatch => "mismatch",
            ErrorKind::AlreadyClosed => "already closed",
            ErrorKind::OutOfRange => "out of range",
            ErrorKind::Driver => "driver",
        };
        f.write_str(name)
    }
}

/// Error types for statement building and execution
#[derive(Debug, Error)]
pub enum DmlError {
    #[error("Empty: {0}")]
    Empty(String),

    #[error("Not valid: {0}")]
    NotValid(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Mismatch: {0}")]
    Mismatch(String),

    #[error("Already closed: {0}")]
    AlreadyClosed(String),

    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// Driver error
    #[cfg(feature = "mysql")]
    #[error("Driver error: {0}")]
    Driver(#[from] sqlx::Error),

    /// Driver error reported by a non-sqlx client (mocks, custom drivers)
    #[error("Driver error: {0}")]
    Client(String),

    /// An error annotated with the table and statement it happened on
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<DmlError>,
    },
}

impl DmlError {
    pub fn empty(message: impl Into<String>) -> Self {
        Self::Empty(message.into())
    }

    pub fn not_valid(message: impl Into<String>) -> Self {
        Self::NotValid(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported(message.into())
    }

    pub fn mismatch(message: impl Into<String>) -> Self {
        Self::Mismatch(message.into())
    }

    pub fn already_closed(message: impl Into<String>) -> Self {
        Self::AlreadyClosed(message.into())
    }

    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::OutOfRange(message.into())
    }

    pub fn client(message: impl Into<String>) -> Self {
        Self::Client(message.into())
    }

    /// Wrap this error with context; the kind is preserved.
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The behavioral kind, looking through any context wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Empty(_) => ErrorKind::Empty,
            Self::NotValid(_) => ErrorKind::NotValid,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NotSupported(_) => ErrorKind::NotSupported,
            Self::Mismatch(_) => ErrorKind::Mismatch,
            Self::AlreadyClosed(_) => ErrorKind::AlreadyClosed,
            Self::OutOfRange(_) => ErrorKind::OutOfRange,
            #[cfg(feature = "mysql")]
            Self::Driver(err) => match err {
                sqlx::Error::RowNotFound => ErrorKind::NotFound,
                sqlx::Error::PoolClosed => ErrorKind::AlreadyClosed,
                _ => ErrorKind::Driver,
            },
            Self::Client(_) => ErrorKind::Driver,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// Check if this is an empty-input error
    pub fn is_empty(&self) -> bool {
        self.kind() == ErrorKind::Empty
    }

    /// Check if this is a not-valid error
    pub fn is_not_valid(&self) -> bool {
        self.kind() == ErrorKind::NotValid
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_not_supported(&self) -> bool {
        self.kind() == ErrorKind::NotSupported
    }

    pub fn is_mismatch(&self) -> bool {
        self.kind() == ErrorKind::Mismatch
    }

    pub fn is_already_closed(&self) -> bool {
        self.kind() == ErrorKind::AlreadyClosed
    }

    pub fn is_out_of_range(&self) -> bool {
        self.kind() == ErrorKind::OutOfRange
    }

    /// Rebuild an error of the same kind from its rendered message.
    ///
    /// Builders keep construction errors until the statement is rendered; the
    /// copy handed out on every render is produced here.
    pub(crate) fn replicate(&self) -> Self {
        match self {
            Self::Empty(m) => return Self::Empty(m.clone()),
            Self::NotValid(m) => return Self::NotValid(m.clone()),
            Self::NotFound(m) => return Self::NotFound(m.clone()),
            Self::NotSupported(m) => return Self::NotSupported(m.clone()),
            Self::Mismatch(m) => return Self::Mismatch(m.clone()),
            Self::AlreadyClosed(m) => return Self::AlreadyClosed(m.clone()),
            Self::OutOfRange(m) => return Self::OutOfRange(m.clone()),
            Self::Client(m) => return Self::Client(m.clone()),
            _ => {}
        }
        let message = self.to_string();
        match self.kind() {
            ErrorKind::Empty => Self::Empty(message),
            ErrorKind::NotValid => Self::NotValid(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::NotSupported => Self::NotSupported(message),
            ErrorKind::Mismatch => Self::Mismatch(message),
            ErrorKind::AlreadyClosed => Self::AlreadyClosed(message),
            ErrorKind::OutOfRange => Self::OutOfRange(message),
            ErrorKind::Driver => Self::Client(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_preserves_kind() {
        let err = DmlError::not_valid("2 placeholders, 3 arguments")
            .context("table `core_config_data`")
            .context("statement 7f1c");
        assert_eq!(err.kind(), ErrorKind::NotValid);
        assert!(err.is_not_valid());
        assert_eq!(
            err.to_string(),
            "statement 7f1c: table `core_config_data`: Not valid: 2 placeholders, 3 arguments"
        );
    }

    #[test]
    fn replicate_keeps_kind() {
        let err = DmlError::empty("missing table").context("select");
        let copy = err.replicate();
        assert!(copy.is_empty());
        assert!(copy.to_string().contains("missing table"));
    }

    #[cfg(feature = "mysql")]
    #[test]
    fn driver_kinds_map_to_categories() {
        assert!(DmlError::from(sqlx::Error::RowNotFound).is_not_found());
        assert!(DmlError::from(sqlx::Error::PoolClosed).is_already_closed());
    }
}

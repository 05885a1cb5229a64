//! Error types for mvstm
//!
//! This module defines the error taxonomy used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! ## Error Categories
//!
//! - **Retry**: internal signal, the current transaction attempt must be
//!   discarded and restarted (`RetryNeeded`)
//! - **Usage**: a ref operation was called in a context that forbids it
//!   (`NotInTransaction`, `WriteAfterCommute`, `WorldMismatch`)
//! - **Application**: a failure raised by the transaction body (`Other`)
//!
//! ### Retry handling
//!
//! `RetryNeeded` flows through transaction bodies via `?` but is always
//! intercepted by the run loop, which starts a fresh attempt. It never
//! escapes `run`. All other variants propagate out of `run` unchanged.
//!
//! ### Usage
//!
//! ```ignore
//! match result {
//!     Err(e) if e.is_retry() => {
//!         // restart the attempt with a fresh read point
//!     }
//!     Err(Error::WriteAfterCommute) => {
//!         // the body mixed write and commute on one ref; fatal
//!     }
//!     Err(e) => return Err(e),
//!     Ok(value) => { /* success */ }
//! }
//! ```

use thiserror::Error;

/// Result type alias for mvstm operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the transactional runtime
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The current transaction attempt must be discarded and retried
    ///
    /// Raised by a transactional read whose snapshot has aged out of a
    /// ref's history window, and by commit validation when a written or
    /// ensured ref moved past the transaction's read point. Handled by
    /// the run loop; never observed by callers of `run`.
    #[error("transaction conflict: attempt must be retried")]
    RetryNeeded,

    /// A mutating ref operation was attempted with no active transaction
    #[error("{op} requires an active transaction")]
    NotInTransaction {
        /// The operation that was attempted
        op: &'static str,
    },

    /// `write` or `alter` was attempted on a ref already commuted in this
    /// transaction
    ///
    /// Fatal to the transaction: it propagates to the caller of `run`
    /// and nothing is published.
    #[error("cannot write a ref that was commuted in this transaction")]
    WriteAfterCommute,

    /// A ref was used transactionally inside a transaction of a different
    /// world
    ///
    /// A ref's history is ordered by the write points of the world that
    /// created it; it cannot be validated or published against another
    /// world's counter.
    #[error("ref belongs to a different transactional world")]
    WorldMismatch,

    /// Failure raised by the transaction body
    ///
    /// Propagates out of `run` without publishing anything.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build an application failure from any displayable message
    ///
    /// Convenience for transaction bodies that need to abort:
    /// `return Err(Error::other("insufficient funds"))`.
    pub fn other(msg: impl std::fmt::Display) -> Self {
        Error::Other(msg.to_string())
    }

    /// Check if this error is the internal retry signal
    ///
    /// Used by the run loop - only retry errors restart the attempt.
    pub fn is_retry(&self) -> bool {
        matches!(self, Error::RetryNeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_is_retry() {
        assert!(Error::RetryNeeded.is_retry());
        assert!(!Error::WriteAfterCommute.is_retry());
        assert!(!Error::NotInTransaction { op: "write" }.is_retry());
    }

    #[test]
    fn test_display_includes_operation() {
        let e = Error::NotInTransaction { op: "commute" };
        assert_eq!(e.to_string(), "commute requires an active transaction");
    }

    #[test]
    fn test_other_preserves_message() {
        let e = Error::other("insufficient funds");
        assert_eq!(e.to_string(), "insufficient funds");
        assert!(!e.is_retry());
    }
}

//! Error types for the task queue library.

use thiserror::Error;

/// Result type alias for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors that can occur while talking to the queue backend.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Redis command failed (connection, timeout, protocol error)
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A stream entry did not have the expected shape
    #[error("Invalid queue entry: {0}")]
    InvalidEntry(String),
}

impl QueueError {
    /// Check if error is transient (the same call may succeed later)
    pub fn is_transient(&self) -> bool {
        match self {
            QueueError::Redis(err) => {
                err.is_io_error()
                    || err.is_timeout()
                    || err.is_connection_dropped()
                    || err.is_connection_refusal()
                    || err.kind() == redis::ErrorKind::TryAgain
            }
            QueueError::InvalidEntry(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_are_transient() {
        let err = QueueError::from(redis::RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        )));
        assert!(err.is_transient());
    }

    #[test]
    fn test_entry_errors_are_permanent() {
        assert!(!QueueError::InvalidEntry("missing field".into()).is_transient());
    }
}

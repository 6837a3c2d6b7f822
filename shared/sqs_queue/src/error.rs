use std::fmt;

use aws_sdk_sqs::error::{DisplayErrorContext, SdkError};
use thiserror::Error;

/// Result type alias for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Error types for queue operations
#[derive(Error, Debug)]
pub enum QueueError {
    /// The queue URL could not be resolved from the queue name
    #[error("Failed to resolve URL for queue '{queue_name}': {reason}")]
    Resolution {
        /// Name that was looked up
        queue_name: String,
        /// Why the lookup failed
        reason: String,
    },

    /// Error serializing message to JSON
    #[error("Failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error deserializing a message body from JSON
    #[error("Failed to deserialize message body: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// A remote call to the queue service failed
    #[error("Failed to {operation} on SQS: {message}")]
    Transport {
        /// Remote operation that failed
        operation: &'static str,
        /// HTTP status returned by the service, if it answered at all
        status: Option<u16>,
        /// Error detail
        message: String,
    },

    /// A batch call succeeded but some entries were rejected
    #[error(transparent)]
    PartialFailure(#[from] PartialFailure),

    /// Batch exceeds the per-request entry cap
    #[error("Batch of {size} entries exceeds the maximum of {max}")]
    BatchTooLarge {
        /// Number of entries in the batch
        size: usize,
        /// Maximum entries per request
        max: usize,
    },

    /// Missing or invalid configuration value
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl QueueError {
    /// Builds a transport error from an AWS SDK error
    pub(crate) fn transport<E>(operation: &'static str, err: &SdkError<E>) -> Self
    where
        E: std::error::Error + 'static,
    {
        let status = match err {
            SdkError::ServiceError(service_err) => Some(service_err.raw().status().as_u16()),
            _ => None,
        };

        Self::Transport {
            operation,
            status,
            message: DisplayErrorContext(err).to_string(),
        }
    }

    /// Checks if this error represents an upstream (5xx) error
    #[must_use]
    pub const fn is_upstream_error(&self) -> bool {
        match self {
            Self::Transport {
                status: Some(status),
                ..
            } => *status >= 500,
            _ => false,
        }
    }
}

/// A single entry rejected by a batch call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntryFailure {
    /// Id of the entry within the batch request
    pub id: String,
    /// Error code reported by the service
    pub code: String,
    /// Error message reported by the service
    pub message: String,
    /// Whether the service blames the caller for the failure
    pub sender_fault: bool,
}

/// Per-entry failures of a batch that was accepted at transport level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialFailure {
    /// Number of entries attempted
    pub total: usize,
    /// Entries the service rejected
    pub failures: Vec<BatchEntryFailure>,
}

impl PartialFailure {
    /// Number of rejected entries
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

impl fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} messages failed to publish: ",
            self.failed(),
            self.total
        )?;

        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(
                f,
                "{} [Code:{},EntryId:{}]",
                failure.message, failure.code, failure.id
            )?;
        }

        Ok(())
    }
}

impl std::error::Error for PartialFailure {}

/// Capacity of the consumer event channel; slow subscribers lose the oldest events
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Counters describing one polling round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundSummary {
    /// Receive requests issued
    pub receive_requests: usize,
    /// Receive requests that failed and contributed no messages
    pub receive_failures: usize,
    /// Messages received
    pub received: usize,
    /// Whether a handler was invoked
    pub handler_invoked: bool,
    /// Whether the handler returned an error
    pub handler_failed: bool,
    /// Delete batch requests issued
    pub delete_requests: usize,
    /// Messages that could not be deleted
    pub delete_failures: usize,
}

impl RoundSummary {
    /// Whether every receive request of the round failed
    #[must_use]
    pub const fn all_receives_failed(&self) -> bool {
        self.receive_requests > 0 && self.receive_failures == self.receive_requests
    }
}

/// Something the consumer recovered from, or the end of a round
///
/// The same failures are logged; the channel lets callers react to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerEvent {
    /// A receive request failed
    ReceiveFailed {
        /// Error detail
        error: String,
        /// Whether the service itself failed (5xx) rather than the request
        upstream: bool,
    },
    /// The batch handler returned an error or panicked
    HandlerFailed {
        /// Error detail
        error: String,
    },
    /// The service rejected the deletion of one message
    DeleteEntryFailed {
        /// Message id of the entry
        id: String,
        /// Error code reported by the service
        code: String,
        /// Error message reported by the service
        message: String,
    },
    /// A whole delete batch request failed
    DeleteRequestFailed {
        /// Entries in the failed request
        entries: usize,
        /// Error detail
        error: String,
    },
    /// A polling round finished
    RoundCompleted(RoundSummary),
}

use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::error::{BatchEntryFailure, QueueError, QueueResult};

/// Maximum number of messages SQS accepts per receive, send or delete request
pub const MAX_MESSAGES_PER_REQUEST: usize = 10;

/// Message attribute carrying the application message type
pub const MESSAGE_TYPE_ATTRIBUTE: &str = "Message-Type";

/// Message attribute carrying the body content type
pub const CONTENT_TYPE_ATTRIBUTE: &str = "Content-Type";

/// A message received from the queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundMessage {
    /// Message ID
    pub message_id: String,
    /// Receipt handle for deleting the message
    pub receipt_handle: String,
    /// Raw message body
    pub body: String,
    /// User defined message attributes (string and number values)
    pub attributes: HashMap<String, String>,
    /// System attributes such as `ApproximateReceiveCount`
    pub system_attributes: HashMap<String, String>,
}

impl InboundMessage {
    /// Decodes the JSON body into `T`
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Deserialization` if the body is not valid JSON for `T`
    pub fn parse_body<T: DeserializeOwned>(&self) -> QueueResult<T> {
        serde_json::from_str(&self.body).map_err(QueueError::Deserialization)
    }

    /// Returns the attribute value set under `name`, if any
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Builds the entry needed to delete this message
    #[must_use]
    pub fn delete_entry(&self) -> DeleteEntry {
        DeleteEntry {
            id: self.message_id.clone(),
            receipt_handle: self.receipt_handle.clone(),
        }
    }
}

/// A message ready to be sent to the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEntry {
    /// Correlation id, unique within one batch request
    pub id: String,
    /// Message body
    pub body: String,
    /// Value of the `Message-Type` attribute
    pub message_type: String,
    /// Value of the `Content-Type` attribute
    pub content_type: String,
    /// Message group id, FIFO queues only
    pub group_id: Option<String>,
    /// Deduplication id, FIFO queues only
    pub deduplication_id: Option<String>,
}

/// Entry of a delete batch request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteEntry {
    /// Correlation id, the message id of the received message
    pub id: String,
    /// Receipt handle of the received message
    pub receipt_handle: String,
}

/// Parameters of a single receive request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveRequest {
    /// Maximum number of messages to return, at most [`MAX_MESSAGES_PER_REQUEST`]
    pub max_messages: i32,
    /// Long polling wait time in seconds
    pub wait_time_seconds: i32,
    /// Visibility timeout applied to the returned messages in seconds
    pub visibility_timeout: i32,
}

/// An entry accepted by a batch call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntrySuccess {
    /// Id of the entry within the batch request
    pub id: String,
    /// Message id assigned by the service (send calls only)
    pub message_id: Option<String>,
}

/// Per-entry result of a batch send or delete call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Entries the service accepted
    pub successful: Vec<BatchEntrySuccess>,
    /// Entries the service rejected
    pub failed: Vec<BatchEntryFailure>,
}

impl BatchOutcome {
    /// Number of entries covered by this outcome
    #[must_use]
    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len()
    }
}

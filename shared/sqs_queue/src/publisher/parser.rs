use serde::Serialize;
use uuid::Uuid;

use crate::error::QueueResult;

/// Encoded message plus the metadata sent alongside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageParams {
    /// Value of the `Message-Type` attribute
    pub message_type: String,
    /// Message group id, used for FIFO queues
    pub message_group_id: String,
    /// Deduplication id, used for FIFO queues
    pub deduplication_id: String,
    /// Value of the `Content-Type` attribute
    pub content_type: String,
    /// Encoded message body
    pub body: String,
}

/// Encodes application messages into [`MessageParams`]
pub trait MessageParser: Send + Sync {
    /// Encodes one message
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Serialization` if the message cannot be encoded
    fn parse<T: Serialize + ?Sized>(&self, message: &T) -> QueueResult<MessageParams>;
}

/// JSON parser with fixed metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultMessageParser {
    /// Message type attached to every message
    pub message_type: String,
    /// Group id attached to every message
    pub message_group_id: String,
    /// Content type attached to every message
    pub content_type: String,
}

impl Default for DefaultMessageParser {
    fn default() -> Self {
        Self {
            message_type: "-".to_string(),
            message_group_id: "default".to_string(),
            content_type: "application/json".to_string(),
        }
    }
}

impl MessageParser for DefaultMessageParser {
    fn parse<T: Serialize + ?Sized>(&self, message: &T) -> QueueResult<MessageParams> {
        let body = serde_json::to_string(message)?;

        // SQS deduplicates within a fixed five minute window, too short to rely
        // on. A group id still needs a deduplication id, so make it unique.
        let deduplication_id = Uuid::new_v4().to_string();

        Ok(MessageParams {
            message_type: self.message_type.clone(),
            message_group_id: self.message_group_id.clone(),
            deduplication_id,
            content_type: self.content_type.clone(),
            body,
        })
    }
}

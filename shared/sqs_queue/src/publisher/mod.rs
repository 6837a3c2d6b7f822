//! Message publishing
//!
//! The publisher encodes application messages with a [`MessageParser`] and
//! sends them to one queue, either one at a time or as a single batch request.

mod parser;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

pub use parser::{DefaultMessageParser, MessageParams, MessageParser};

use crate::{
    config::PublisherConfig,
    error::{PartialFailure, QueueError, QueueResult},
    service::{resolve_queue_url, QueueService},
    types::{OutboundEntry, MAX_MESSAGES_PER_REQUEST},
};

/// Publishes messages to a single queue
pub struct Publisher<P = DefaultMessageParser> {
    queue_url: String,
    is_fifo: bool,
    parser: P,
    client: Arc<dyn QueueService>,
}

impl Publisher {
    /// Creates a publisher using the [`DefaultMessageParser`]
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Resolution` if the queue URL cannot be resolved
    pub async fn new(config: PublisherConfig, client: Arc<dyn QueueService>) -> QueueResult<Self> {
        let queue_url = resolve_queue_url(client.as_ref(), &config.queue_name).await?;

        Ok(Self {
            queue_url,
            is_fifo: config.is_fifo,
            parser: DefaultMessageParser::default(),
            client,
        })
    }
}

impl<P: MessageParser> Publisher<P> {
    /// Replaces the message parser
    #[must_use]
    pub fn with_parser<Q: MessageParser>(self, parser: Q) -> Publisher<Q> {
        Publisher {
            queue_url: self.queue_url,
            is_fifo: self.is_fifo,
            parser,
            client: self.client,
        }
    }

    /// URL of the queue this publisher sends to
    #[must_use]
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    /// Whether FIFO group and deduplication ids are attached
    #[must_use]
    pub const fn is_fifo(&self) -> bool {
        self.is_fifo
    }

    /// Publishes one message
    ///
    /// # Returns
    ///
    /// The message ID assigned by the queue
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Serialization` if the message cannot be encoded,
    /// or `QueueError::Transport` if the send fails
    #[instrument(skip_all, fields(queue_url = %self.queue_url))]
    pub async fn publish<T: Serialize + ?Sized + Sync>(&self, message: &T) -> QueueResult<String> {
        let entry = self.create_entry(message)?;

        let message_id = self.client.send_message(&self.queue_url, entry).await?;
        debug!(%message_id, "Published message");

        Ok(message_id)
    }

    /// Publishes messages in a single batch request
    ///
    /// Every message is encoded before anything is sent; one encoding failure
    /// aborts the whole call. The batch only counts as published if the
    /// service accepted every entry.
    ///
    /// # Returns
    ///
    /// The message IDs assigned by the queue
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Serialization` if a message cannot be encoded,
    /// `QueueError::BatchTooLarge` if there are more than
    /// [`MAX_MESSAGES_PER_REQUEST`] messages, `QueueError::Transport` if the
    /// request fails, or `QueueError::PartialFailure` listing the rejected
    /// entries
    #[instrument(skip_all, fields(queue_url = %self.queue_url, count = messages.len()))]
    pub async fn publish_batch<T: Serialize + Sync>(
        &self,
        messages: &[T],
    ) -> QueueResult<Vec<String>> {
        if messages.len() > MAX_MESSAGES_PER_REQUEST {
            return Err(QueueError::BatchTooLarge {
                size: messages.len(),
                max: MAX_MESSAGES_PER_REQUEST,
            });
        }

        let entries = messages
            .iter()
            .map(|message| self.create_entry(message))
            .collect::<QueueResult<Vec<_>>>()?;

        if entries.is_empty() {
            return Ok(Vec::new());
        }
        let total = entries.len();

        let outcome = self
            .client
            .send_message_batch(&self.queue_url, entries)
            .await?;

        let message_ids: Vec<String> = outcome
            .successful
            .iter()
            .filter_map(|entry| entry.message_id.clone())
            .collect();
        for message_id in &message_ids {
            debug!(%message_id, "Published message");
        }

        if !outcome.failed.is_empty() {
            let failure = PartialFailure {
                total,
                failures: outcome.failed,
            };
            warn!(
                failed = failure.failed(),
                total = failure.total,
                "Batch publish partially failed"
            );
            return Err(failure.into());
        }

        Ok(message_ids)
    }

    fn create_entry<T: Serialize + ?Sized>(&self, message: &T) -> QueueResult<OutboundEntry> {
        let params = self.parser.parse(message)?;

        Ok(OutboundEntry {
            // Only correlates the entry with its result
            id: Uuid::new_v4().to_string(),
            body: params.body,
            message_type: params.message_type,
            content_type: params.content_type,
            group_id: self.fifo_only(params.message_group_id),
            deduplication_id: self.fifo_only(params.deduplication_id),
        })
    }

    fn fifo_only(&self, value: String) -> Option<String> {
        self.is_fifo.then_some(value)
    }
}

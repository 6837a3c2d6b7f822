//! Queue service capability
//!
//! [`QueueService`] is the minimum surface the publisher and the consumer need
//! from the remote queue. [`SqsQueueService`] implements it on top of the AWS
//! SDK; tests provide their own implementations.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use aws_sdk_sqs::{
    types::{
        BatchResultErrorEntry, DeleteMessageBatchRequestEntry, Message, MessageAttributeValue,
        MessageSystemAttributeName, SendMessageBatchRequestEntry,
    },
    Client as SqsClient,
};
use tracing::{debug, warn};

use crate::{
    error::{BatchEntryFailure, QueueError, QueueResult},
    types::{
        BatchEntrySuccess, BatchOutcome, DeleteEntry, InboundMessage, OutboundEntry,
        ReceiveRequest, CONTENT_TYPE_ATTRIBUTE, MESSAGE_TYPE_ATTRIBUTE,
    },
};

/// Remote operations required from the queue service
#[async_trait]
pub trait QueueService: Send + Sync {
    /// Looks up the URL of the queue called `queue_name`
    ///
    /// Returns `Ok(None)` if the service answered without a URL.
    async fn get_queue_url(&self, queue_name: &str) -> QueueResult<Option<String>>;

    /// Receives up to `request.max_messages` messages
    async fn receive_messages(
        &self,
        queue_url: &str,
        request: ReceiveRequest,
    ) -> QueueResult<Vec<InboundMessage>>;

    /// Deletes a batch of received messages
    async fn delete_message_batch(
        &self,
        queue_url: &str,
        entries: Vec<DeleteEntry>,
    ) -> QueueResult<BatchOutcome>;

    /// Sends one message and returns its message id
    async fn send_message(&self, queue_url: &str, entry: OutboundEntry) -> QueueResult<String>;

    /// Sends a batch of messages
    async fn send_message_batch(
        &self,
        queue_url: &str,
        entries: Vec<OutboundEntry>,
    ) -> QueueResult<BatchOutcome>;
}

/// Resolves the URL of `queue_name`
///
/// # Errors
///
/// Returns `QueueError::Resolution` if the lookup fails or returns no URL
pub async fn resolve_queue_url(
    service: &dyn QueueService,
    queue_name: &str,
) -> QueueResult<String> {
    match service.get_queue_url(queue_name).await {
        Ok(Some(queue_url)) if !queue_url.is_empty() => {
            debug!(queue_name, %queue_url, "Resolved SQS queue URL");
            Ok(queue_url)
        }
        Ok(_) => Err(QueueError::Resolution {
            queue_name: queue_name.to_string(),
            reason: "no queue URL returned".to_string(),
        }),
        Err(e) => Err(QueueError::Resolution {
            queue_name: queue_name.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// [`QueueService`] backed by AWS SQS
#[derive(Debug, Clone)]
pub struct SqsQueueService {
    sqs_client: Arc<SqsClient>,
}

impl SqsQueueService {
    /// Creates a new SQS backed queue service
    ///
    /// # Arguments
    ///
    /// * `sqs_client` - Pre-configured SQS client
    #[must_use]
    pub const fn new(sqs_client: Arc<SqsClient>) -> Self {
        Self { sqs_client }
    }
}

#[async_trait]
impl QueueService for SqsQueueService {
    async fn get_queue_url(&self, queue_name: &str) -> QueueResult<Option<String>> {
        let result = self
            .sqs_client
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await
            .map_err(|e| QueueError::transport("get queue URL", &e))?;

        Ok(result.queue_url().map(ToString::to_string))
    }

    async fn receive_messages(
        &self,
        queue_url: &str,
        request: ReceiveRequest,
    ) -> QueueResult<Vec<InboundMessage>> {
        let result = self
            .sqs_client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(request.max_messages)
            .visibility_timeout(request.visibility_timeout)
            .wait_time_seconds(request.wait_time_seconds)
            .message_attribute_names("All")
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .send()
            .await
            .map_err(|e| QueueError::transport("receive messages", &e))?;

        Ok(result.messages().iter().filter_map(to_inbound).collect())
    }

    async fn delete_message_batch(
        &self,
        queue_url: &str,
        entries: Vec<DeleteEntry>,
    ) -> QueueResult<BatchOutcome> {
        let entries = entries
            .into_iter()
            .map(|entry| {
                DeleteMessageBatchRequestEntry::builder()
                    .id(entry.id)
                    .receipt_handle(entry.receipt_handle)
                    .build()
                    .map_err(|e| QueueError::Transport {
                        operation: "delete message batch",
                        status: None,
                        message: e.to_string(),
                    })
            })
            .collect::<QueueResult<Vec<_>>>()?;

        let result = self
            .sqs_client
            .delete_message_batch()
            .queue_url(queue_url)
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(|e| QueueError::transport("delete message batch", &e))?;

        Ok(BatchOutcome {
            successful: result
                .successful()
                .iter()
                .map(|entry| BatchEntrySuccess {
                    id: entry.id().to_string(),
                    message_id: None,
                })
                .collect(),
            failed: result.failed().iter().map(to_failure).collect(),
        })
    }

    async fn send_message(&self, queue_url: &str, entry: OutboundEntry) -> QueueResult<String> {
        let attributes = message_attributes(&entry, "send message")?;

        let result = self
            .sqs_client
            .send_message()
            .queue_url(queue_url)
            .message_body(entry.body)
            .set_message_group_id(entry.group_id)
            .set_message_deduplication_id(entry.deduplication_id)
            .set_message_attributes(Some(attributes))
            .send()
            .await
            .map_err(|e| QueueError::transport("send message", &e))?;

        Ok(result
            .message_id()
            .map(std::string::ToString::to_string)
            .unwrap_or_default())
    }

    async fn send_message_batch(
        &self,
        queue_url: &str,
        entries: Vec<OutboundEntry>,
    ) -> QueueResult<BatchOutcome> {
        let entries = entries
            .into_iter()
            .map(|entry| {
                let attributes = message_attributes(&entry, "send message batch")?;
                SendMessageBatchRequestEntry::builder()
                    .id(entry.id)
                    .message_body(entry.body)
                    .set_message_group_id(entry.group_id)
                    .set_message_deduplication_id(entry.deduplication_id)
                    .set_message_attributes(Some(attributes))
                    .build()
                    .map_err(|e| QueueError::Transport {
                        operation: "send message batch",
                        status: None,
                        message: e.to_string(),
                    })
            })
            .collect::<QueueResult<Vec<_>>>()?;

        let result = self
            .sqs_client
            .send_message_batch()
            .queue_url(queue_url)
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(|e| QueueError::transport("send message batch", &e))?;

        Ok(BatchOutcome {
            successful: result
                .successful()
                .iter()
                .map(|entry| BatchEntrySuccess {
                    id: entry.id().to_string(),
                    message_id: Some(entry.message_id().to_string()),
                })
                .collect(),
            failed: result.failed().iter().map(to_failure).collect(),
        })
    }
}

/// Converts an SQS message, skipping messages that cannot be deleted later
fn to_inbound(msg: &Message) -> Option<InboundMessage> {
    let (Some(message_id), Some(receipt_handle)) = (msg.message_id(), msg.receipt_handle()) else {
        warn!(
            message_id = msg.message_id().unwrap_or_default(),
            "Skipping SQS message without id or receipt handle"
        );
        return None;
    };

    let attributes = msg
        .message_attributes()
        .map(|attributes| {
            attributes
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .string_value()
                        .map(|value| (name.clone(), value.to_string()))
                })
                .collect()
        })
        .unwrap_or_default();

    let system_attributes = msg
        .attributes()
        .map(|attributes| {
            attributes
                .iter()
                .map(|(name, value)| (name.as_str().to_string(), value.clone()))
                .collect()
        })
        .unwrap_or_default();

    Some(InboundMessage {
        message_id: message_id.to_string(),
        receipt_handle: receipt_handle.to_string(),
        body: msg.body().unwrap_or_default().to_string(),
        attributes,
        system_attributes,
    })
}

fn to_failure(entry: &BatchResultErrorEntry) -> BatchEntryFailure {
    BatchEntryFailure {
        id: entry.id().to_string(),
        code: entry.code().to_string(),
        message: entry.message().unwrap_or_default().to_string(),
        sender_fault: entry.sender_fault(),
    }
}

fn message_attributes(
    entry: &OutboundEntry,
    operation: &'static str,
) -> QueueResult<HashMap<String, MessageAttributeValue>> {
    [
        (MESSAGE_TYPE_ATTRIBUTE, &entry.message_type),
        (CONTENT_TYPE_ATTRIBUTE, &entry.content_type),
    ]
    .into_iter()
    .map(|(name, value)| {
        MessageAttributeValue::builder()
            .data_type("String")
            .string_value(value)
            .build()
            .map(|value| (name.to_string(), value))
            .map_err(|e| QueueError::Transport {
                operation,
                status: None,
                message: e.to_string(),
            })
    })
    .collect()
}

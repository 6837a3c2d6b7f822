//! Polling consumer
//!
//! Each round pulls messages with several receive requests in parallel, hands
//! the whole batch to the handler, then deletes every received message in
//! batches of at most [`MAX_MESSAGES_PER_REQUEST`]. Deletion does not depend on
//! the handler outcome; messages that fail to delete become visible again once
//! their visibility timeout expires.

mod events;

use std::{panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use tokio::{
    sync::{broadcast, Semaphore},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

pub use events::{ConsumerEvent, RoundSummary, EVENT_CHANNEL_CAPACITY};

use crate::{
    config::ConsumerConfig,
    error::QueueResult,
    handler::BatchHandler,
    service::{resolve_queue_url, QueueService},
    types::{BatchOutcome, DeleteEntry, InboundMessage, ReceiveRequest, MAX_MESSAGES_PER_REQUEST},
};

/// Polls a queue until cancelled
pub struct PollingConsumer {
    queue_url: String,
    config: ConsumerConfig,
    handler: Option<Arc<dyn BatchHandler>>,
    client: Arc<dyn QueueService>,
    events: broadcast::Sender<ConsumerEvent>,
}

impl PollingConsumer {
    /// Creates a new consumer for the queue named in `config`
    ///
    /// Without a handler, received messages are deleted unprocessed.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Resolution` if the queue URL cannot be resolved
    pub async fn new(
        config: ConsumerConfig,
        client: Arc<dyn QueueService>,
        handler: Option<Arc<dyn BatchHandler>>,
    ) -> QueueResult<Self> {
        let queue_url = resolve_queue_url(client.as_ref(), &config.queue_name).await?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            queue_url,
            config,
            handler,
            client,
            events,
        })
    }

    /// URL of the consumed queue
    #[must_use]
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    /// Subscribes to the events emitted from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ConsumerEvent> {
        self.events.subscribe()
    }

    /// Runs polling rounds until `shutdown` is cancelled
    ///
    /// Cancellation is checked between rounds; a round that has started always
    /// finishes its receive, handle and delete steps.
    pub async fn start(&self, shutdown: CancellationToken) {
        info!(queue_url = %self.queue_url, "Starting polling consumer");

        while !shutdown.is_cancelled() {
            let summary = self.run_round().await;

            if summary.all_receives_failed() && !self.config.wait_on_error.is_zero() {
                warn!(
                    wait_on_error = ?self.config.wait_on_error,
                    "All receive requests failed, backing off"
                );
                tokio::select! {
                    () = tokio::time::sleep(self.config.wait_on_error) => {}
                    () = shutdown.cancelled() => {}
                }
            }
        }

        info!(queue_url = %self.queue_url, "Polling consumer stopped");
    }

    /// Runs a single receive, handle and delete round
    #[instrument(skip_all, fields(queue_url = %self.queue_url))]
    pub async fn run_round(&self) -> RoundSummary {
        let requests = self.receive_requests();
        let mut summary = RoundSummary {
            receive_requests: requests.len(),
            ..RoundSummary::default()
        };

        let (messages, receive_failures) = self.pull_messages(requests).await;
        summary.receive_failures = receive_failures;
        summary.received = messages.len();

        if !messages.is_empty() {
            info!(received = messages.len(), "Received messages");

            if let Some(handler) = &self.handler {
                summary.handler_invoked = true;
                summary.handler_failed = !self.consume_messages(handler.as_ref(), &messages).await;
            }

            let (delete_requests, delete_failures) = self.drop_messages(&messages).await;
            summary.delete_requests = delete_requests;
            summary.delete_failures = delete_failures;
        }

        self.emit(ConsumerEvent::RoundCompleted(summary));
        summary
    }

    /// One receive request per [`MAX_MESSAGES_PER_REQUEST`] wanted messages
    fn receive_requests(&self) -> Vec<ReceiveRequest> {
        let request = ReceiveRequest {
            max_messages: i32::try_from(MAX_MESSAGES_PER_REQUEST).unwrap_or(i32::MAX),
            wait_time_seconds: self.config.wait_time_seconds,
            visibility_timeout: self.config.visibility_timeout,
        };

        vec![request; self.config.receive_request_count()]
    }

    fn admission_gate(&self) -> Arc<Semaphore> {
        Arc::new(Semaphore::new(self.config.max_parallel_requests.max(1)))
    }

    /// Issues the receive requests in parallel and merges their messages
    async fn pull_messages(&self, requests: Vec<ReceiveRequest>) -> (Vec<InboundMessage>, usize) {
        let semaphore = self.admission_gate();
        let mut workers = JoinSet::new();

        for request in requests {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let client = Arc::clone(&self.client);
            let queue_url = self.queue_url.clone();

            workers.spawn(async move {
                let result = client.receive_messages(&queue_url, request).await;
                drop(permit);
                result
            });
        }

        let mut messages = Vec::new();
        let mut failures = 0;
        while let Some(joined) = workers.join_next().await {
            let (error, upstream) = match joined {
                Ok(Ok(received)) => {
                    messages.extend(received);
                    continue;
                }
                Ok(Err(e)) => (e.to_string(), e.is_upstream_error()),
                Err(e) => (format!("receive worker panicked: {e}"), false),
            };

            failures += 1;
            if upstream {
                warn!(error = %error, "Queue service failed to receive messages");
            } else {
                error!(error = %error, "Failed to receive messages");
            }
            self.emit(ConsumerEvent::ReceiveFailed { error, upstream });
        }

        debug!(count = messages.len(), "Pulled messages");
        (messages, failures)
    }

    /// Hands the batch to the handler; returns whether it succeeded
    async fn consume_messages(&self, handler: &dyn BatchHandler, messages: &[InboundMessage]) -> bool {
        let error = match AssertUnwindSafe(handler.handle(messages))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => return true,
            Ok(Err(e)) => e.to_string(),
            Err(_) => "batch handler panicked".to_string(),
        };

        error!(error = %error, count = messages.len(), "Failed to handle messages");
        self.emit(ConsumerEvent::HandlerFailed { error });
        false
    }

    /// Deletes the messages in parallel batches; returns the number of
    /// requests issued and of messages left undeleted
    async fn drop_messages(&self, messages: &[InboundMessage]) -> (usize, usize) {
        let semaphore = self.admission_gate();
        let mut workers = JoinSet::new();

        for chunk in messages.chunks(MAX_MESSAGES_PER_REQUEST) {
            let entries: Vec<DeleteEntry> = chunk.iter().map(InboundMessage::delete_entry).collect();
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let client = Arc::clone(&self.client);
            let queue_url = self.queue_url.clone();

            workers.spawn(async move {
                let count = entries.len();
                let result = client.delete_message_batch(&queue_url, entries).await;
                drop(permit);
                (count, result)
            });
        }

        let requests = workers.len();
        let mut reported = 0;
        let mut failures = 0;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((count, result)) => {
                    reported += count;
                    failures += self.log_delete_result(count, result);
                }
                Err(e) => error!(error = %e, "Delete worker panicked"),
            }
        }

        // Entries of workers that never reported back
        let lost = messages.len() - reported;
        if lost > 0 {
            self.emit(ConsumerEvent::DeleteRequestFailed {
                entries: lost,
                error: "delete worker did not complete".to_string(),
            });
            failures += lost;
        }

        (requests, failures)
    }

    /// Logs the outcome of one delete request; returns how many messages
    /// were not deleted
    fn log_delete_result(&self, count: usize, result: QueueResult<BatchOutcome>) -> usize {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, entries = count, "Failed to delete message batch");
                self.emit(ConsumerEvent::DeleteRequestFailed {
                    entries: count,
                    error: e.to_string(),
                });
                return count;
            }
        };

        for success in &outcome.successful {
            debug!(message_id = %success.id, "Deleted message from queue");
        }

        for failure in &outcome.failed {
            error!(
                entry_id = %failure.id,
                code = %failure.code,
                error_message = %failure.message,
                "Failed to delete message"
            );
            self.emit(ConsumerEvent::DeleteEntryFailed {
                id: failure.id.clone(),
                code: failure.code.clone(),
                message: failure.message.clone(),
            });
        }

        outcome.failed.len()
    }

    fn emit(&self, event: ConsumerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl std::fmt::Debug for PollingConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingConsumer")
            .field("queue_url", &self.queue_url)
            .field("config", &self.config)
            .field("has_handler", &self.handler.is_some())
            .finish_non_exhaustive()
    }
}

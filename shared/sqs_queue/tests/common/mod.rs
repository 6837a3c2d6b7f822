//! Queue test setup utilities

#![allow(dead_code)]

use std::{
    collections::{HashSet, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use sqs_queue::{
    BatchEntryFailure, BatchEntrySuccess, BatchHandler, BatchOutcome, DeleteEntry, HandlerError,
    InboundMessage, OutboundEntry, QueueError, QueueResult, QueueService, ReceiveRequest,
};
use tokio_util::sync::CancellationToken;

pub const QUEUE_URL: &str = "http://localhost:4566/000000000000/orders";

/// Setup tracing for tests
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
}

/// Builds `count` messages with ids `{prefix}-{n}`
pub fn messages(prefix: &str, count: usize) -> Vec<InboundMessage> {
    (0..count)
        .map(|n| InboundMessage {
            message_id: format!("{prefix}-{n}"),
            receipt_handle: format!("receipt-{prefix}-{n}"),
            body: format!(r#"{{"n":{n}}}"#),
            ..Default::default()
        })
        .collect()
}

fn transport_error(operation: &'static str) -> QueueError {
    QueueError::Transport {
        operation,
        status: Some(500),
        message: "InternalError".to_string(),
    }
}

#[derive(Default)]
struct MockState {
    receive_responses: VecDeque<QueueResult<Vec<InboundMessage>>>,
    receive_requests: Vec<ReceiveRequest>,
    deleted: Vec<String>,
    delete_batch_sizes: Vec<usize>,
    sent: Vec<OutboundEntry>,
    rejected: Vec<OutboundEntry>,
    send_batches: usize,
}

/// In-memory [`QueueService`] with scripted receive results
#[derive(Default)]
pub struct MockQueueService {
    queue_url: Option<String>,
    queue_url_error: bool,
    receive_delay: Duration,
    cancel_when_drained: Option<CancellationToken>,
    cancel_on_receive: Option<CancellationToken>,
    delete_failures: HashSet<String>,
    delete_transport_error: bool,
    send_transport_error: bool,
    send_batch_failures: HashSet<usize>,
    state: Mutex<MockState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockQueueService {
    pub fn new() -> Self {
        Self {
            queue_url: Some(QUEUE_URL.to_string()),
            ..Default::default()
        }
    }

    /// Answers `get_queue_url` without a URL
    pub fn without_queue_url() -> Self {
        Self::default()
    }

    /// Fails `get_queue_url` at transport level
    pub fn with_queue_url_error() -> Self {
        Self {
            queue_url_error: true,
            ..Self::new()
        }
    }

    /// Queues the results of the next receive calls, one per call
    pub fn with_receive_batches(self, batches: Vec<Vec<InboundMessage>>) -> Self {
        self.state
            .lock()
            .unwrap()
            .receive_responses
            .extend(batches.into_iter().map(Ok));
        self
    }

    /// Queues a failing receive call
    pub fn with_receive_error(self) -> Self {
        self.state
            .lock()
            .unwrap()
            .receive_responses
            .push_back(Err(transport_error("receive messages")));
        self
    }

    /// Queues a receive call the service refuses (403)
    pub fn with_receive_rejected(self) -> Self {
        self.state
            .lock()
            .unwrap()
            .receive_responses
            .push_back(Err(QueueError::Transport {
                operation: "receive messages",
                status: Some(403),
                message: "AccessDenied".to_string(),
            }));
        self
    }

    /// Makes every receive call take `delay`
    pub fn with_receive_delay(mut self, delay: Duration) -> Self {
        self.receive_delay = delay;
        self
    }

    /// Cancels `token` once a receive call finds no scripted result left
    pub fn cancel_when_drained(mut self, token: CancellationToken) -> Self {
        self.cancel_when_drained = Some(token);
        self
    }

    /// Cancels `token` on the first receive call
    pub fn cancel_on_receive(mut self, token: CancellationToken) -> Self {
        self.cancel_on_receive = Some(token);
        self
    }

    /// Rejects the deletion of these message ids
    pub fn with_delete_failures(mut self, ids: &[&str]) -> Self {
        self.delete_failures = ids.iter().map(ToString::to_string).collect();
        self
    }

    /// Fails every delete call at transport level
    pub fn with_delete_transport_error(mut self) -> Self {
        self.delete_transport_error = true;
        self
    }

    /// Fails every send call at transport level
    pub fn with_send_transport_error(mut self) -> Self {
        self.send_transport_error = true;
        self
    }

    /// Rejects the entries at these positions of a send batch
    pub fn with_send_batch_failures(mut self, positions: &[usize]) -> Self {
        self.send_batch_failures = positions.iter().copied().collect();
        self
    }

    pub fn receive_requests(&self) -> Vec<ReceiveRequest> {
        self.state.lock().unwrap().receive_requests.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn delete_batch_sizes(&self) -> Vec<usize> {
        let mut sizes = self.state.lock().unwrap().delete_batch_sizes.clone();
        sizes.sort_unstable();
        sizes
    }

    pub fn sent(&self) -> Vec<OutboundEntry> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn rejected(&self) -> Vec<OutboundEntry> {
        self.state.lock().unwrap().rejected.clone()
    }

    pub fn send_batches(&self) -> usize {
        self.state.lock().unwrap().send_batches
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueService for MockQueueService {
    async fn get_queue_url(&self, _queue_name: &str) -> QueueResult<Option<String>> {
        if self.queue_url_error {
            return Err(transport_error("get queue URL"));
        }
        Ok(self.queue_url.clone())
    }

    async fn receive_messages(
        &self,
        _queue_url: &str,
        request: ReceiveRequest,
    ) -> QueueResult<Vec<InboundMessage>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.receive_delay.is_zero() {
            tokio::time::sleep(self.receive_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(token) = &self.cancel_on_receive {
            token.cancel();
        }

        let mut state = self.state.lock().unwrap();
        state.receive_requests.push(request);

        match state.receive_responses.pop_front() {
            Some(response) => response,
            None => {
                if let Some(token) = &self.cancel_when_drained {
                    token.cancel();
                }
                Ok(Vec::new())
            }
        }
    }

    async fn delete_message_batch(
        &self,
        _queue_url: &str,
        entries: Vec<DeleteEntry>,
    ) -> QueueResult<BatchOutcome> {
        let mut state = self.state.lock().unwrap();
        state.delete_batch_sizes.push(entries.len());
        state
            .deleted
            .extend(entries.iter().map(|entry| entry.id.clone()));

        if self.delete_transport_error {
            return Err(transport_error("delete message batch"));
        }

        let (failed, successful): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|entry| self.delete_failures.contains(&entry.id));

        Ok(BatchOutcome {
            successful: successful
                .into_iter()
                .map(|entry| BatchEntrySuccess {
                    id: entry.id,
                    message_id: None,
                })
                .collect(),
            failed: failed
                .into_iter()
                .map(|entry| BatchEntryFailure {
                    id: entry.id,
                    code: "ReceiptHandleIsInvalid".to_string(),
                    message: "The receipt handle has expired".to_string(),
                    sender_fault: true,
                })
                .collect(),
        })
    }

    async fn send_message(&self, _queue_url: &str, entry: OutboundEntry) -> QueueResult<String> {
        if self.send_transport_error {
            return Err(transport_error("send message"));
        }

        let mut state = self.state.lock().unwrap();
        state.sent.push(entry);
        Ok(format!("message-{}", state.sent.len()))
    }

    async fn send_message_batch(
        &self,
        _queue_url: &str,
        entries: Vec<OutboundEntry>,
    ) -> QueueResult<BatchOutcome> {
        if self.send_transport_error {
            return Err(transport_error("send message batch"));
        }

        let mut state = self.state.lock().unwrap();
        state.send_batches += 1;

        let mut outcome = BatchOutcome::default();
        for (position, entry) in entries.into_iter().enumerate() {
            if self.send_batch_failures.contains(&position) {
                state.rejected.push(entry.clone());
                outcome.failed.push(BatchEntryFailure {
                    id: entry.id,
                    code: "InvalidParameterValue".to_string(),
                    message: "Message body is invalid".to_string(),
                    sender_fault: true,
                });
            } else {
                state.sent.push(entry.clone());
                outcome.successful.push(BatchEntrySuccess {
                    id: entry.id,
                    message_id: Some(format!("message-{}", state.sent.len())),
                });
            }
        }

        Ok(outcome)
    }
}

/// Batch handler that records what it receives
#[derive(Default)]
pub struct RecordingBatchHandler {
    received: Mutex<Vec<InboundMessage>>,
    invocations: AtomicUsize,
    fail: bool,
    panic: bool,
}

impl RecordingBatchHandler {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn panicking() -> Self {
        Self {
            panic: true,
            ..Default::default()
        }
    }

    pub fn received_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .received
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.message_id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchHandler for RecordingBatchHandler {
    async fn handle(&self, messages: &[InboundMessage]) -> Result<(), HandlerError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.received
            .lock()
            .unwrap()
            .extend(messages.iter().cloned());

        assert!(!self.panic, "handler blew up");
        if self.fail {
            return Err("foo bar baz".into());
        }
        Ok(())
    }
}

//! SQS publishing and polling for queue-backed services
//!
//! This crate provides a publisher that turns application messages into queue
//! entries (singly or batched), and a polling consumer that pulls messages in
//! parallel, hands them to a handler and deletes them from the queue.

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

/// Environment backed configuration
pub mod config;
/// Polling consumer
pub mod consumer;
/// Error types for queue operations
pub mod error;
/// Batch and per-message handlers
pub mod handler;
/// Message publishing
pub mod publisher;
/// Queue service capability and its SQS implementation
pub mod service;
/// Common types for queue operations
pub mod types;

pub use config::{ClientConfig, ConsumerConfig, PublisherConfig, MAX_MESSAGES_PER_ROUND};
pub use consumer::{ConsumerEvent, PollingConsumer, RoundSummary};
pub use error::{BatchEntryFailure, PartialFailure, QueueError, QueueResult};
pub use handler::{BatchHandler, FanOutHandler, HandlerError, MessageHandler};
pub use publisher::{DefaultMessageParser, MessageParams, MessageParser, Publisher};
pub use service::{resolve_queue_url, QueueService, SqsQueueService};
pub use types::{
    BatchEntrySuccess, BatchOutcome, DeleteEntry, InboundMessage, OutboundEntry, ReceiveRequest,
    MAX_MESSAGES_PER_REQUEST,
};

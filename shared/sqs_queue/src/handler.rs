use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::{future::join_all, FutureExt};
use tracing::error;

use crate::types::InboundMessage;

/// Error returned by message handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Handles all messages received in one polling round with a single call
#[async_trait]
pub trait BatchHandler: Send + Sync {
    /// Processes a batch of received messages
    ///
    /// The consumer deletes the batch whatever this returns; an error is only
    /// logged.
    async fn handle(&self, messages: &[InboundMessage]) -> Result<(), HandlerError>;
}

/// Handles one received message
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Processes a single received message
    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError>;
}

/// Runs a [`MessageHandler`] concurrently over every message of a batch
///
/// Per-message failures, panics included, are logged where they happen and
/// never returned, so the batch always succeeds once every invocation has
/// finished.
pub struct FanOutHandler<H> {
    handler: H,
}

impl<H: MessageHandler> FanOutHandler<H> {
    /// Wraps a per-message handler as a batch handler
    #[must_use]
    pub const fn wrap(handler: H) -> Self {
        Self { handler }
    }

    /// Returns the wrapped handler
    #[must_use]
    pub const fn inner(&self) -> &H {
        &self.handler
    }
}

#[async_trait]
impl<H: MessageHandler> BatchHandler for FanOutHandler<H> {
    async fn handle(&self, messages: &[InboundMessage]) -> Result<(), HandlerError> {
        let invocations = messages.iter().map(|message| async move {
            // A panic must not drop the sibling invocations
            let error = match AssertUnwindSafe(self.handler.handle(message))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => return,
                Ok(Err(e)) => e.to_string(),
                Err(_) => "message handler panicked".to_string(),
            };

            error!(
                message_id = %message.message_id,
                error = %error,
                "Failed to handle message"
            );
        });

        join_all(invocations).await;

        Ok(())
    }
}

use async_trait::async_trait;
use sqs_queue::{HandlerError, InboundMessage, MessageHandler};
use tracing::info;

/// System attribute counting how often a message was received
const RECEIVE_COUNT_ATTRIBUTE: &str = "ApproximateReceiveCount";

/// Logs every received message and accepts it
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

#[async_trait]
impl MessageHandler for LoggingHandler {
    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError> {
        info!(
            message_id = %message.message_id,
            message_type = message.attribute("Message-Type").unwrap_or("-"),
            receive_count = message
                .system_attributes
                .get(RECEIVE_COUNT_ATTRIBUTE)
                .map_or("1", String::as_str),
            body_len = message.body.len(),
            "Received message"
        );
        Ok(())
    }
}

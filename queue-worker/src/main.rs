use std::sync::Arc;

use sqs_queue::{
    BatchHandler, ClientConfig, ConsumerConfig, FanOutHandler, PollingConsumer, QueueService,
    SqsQueueService,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use queue_worker::{
    handler::LoggingHandler,
    logging::{init_tracing, LogFormat},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(LogFormat::from_env());

    let client_config = ClientConfig::from_env();
    let consumer_config = ConsumerConfig::from_env()?;
    info!(
        queue_name = %consumer_config.queue_name,
        region = %client_config.region,
        "Starting queue worker"
    );

    let sqs_client = Arc::new(client_config.sqs_client().await);
    let service: Arc<dyn QueueService> = Arc::new(SqsQueueService::new(sqs_client));
    let handler: Arc<dyn BatchHandler> = Arc::new(FanOutHandler::wrap(LoggingHandler));

    let consumer = match PollingConsumer::new(consumer_config, service, Some(handler)).await {
        Ok(consumer) => consumer,
        Err(e) => {
            error!(error = %e, "Failed to create consumer");
            return Err(e.into());
        }
    };

    let shutdown = CancellationToken::new();

    // Spawn signal handler
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating graceful shutdown...");
                signal_shutdown.cancel();
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
        }
    });

    consumer.start(shutdown).await;

    info!("Queue worker stopped");
    Ok(())
}

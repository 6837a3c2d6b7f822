use std::{env, str::FromStr, time::Duration};

use aws_config::{retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion, Region};
use aws_sdk_sqs::{config::Credentials, Client as SqsClient};

use crate::{
    error::{QueueError, QueueResult},
    types::MAX_MESSAGES_PER_REQUEST,
};

/// Default number of remote calls in flight during one polling or deletion burst
pub const DEFAULT_PARALLEL_REQUESTS: usize = 10;

/// Upper bound on `max_number_of_messages`, keeping a round to 100 receive requests
pub const MAX_MESSAGES_PER_ROUND: i32 = 1_000;

const DEFAULT_REGION: &str = "eu-central-1";

/// Connection settings for the SQS client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Endpoint override, e.g. a `LocalStack` URL
    pub endpoint: Option<String>,
    /// Static access key, used together with `secret_key`
    pub access_key: Option<String>,
    /// Static secret key, used together with `access_key`
    pub secret_key: Option<String>,
    /// AWS region
    pub region: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            access_key: None,
            secret_key: None,
            region: DEFAULT_REGION.to_string(),
        }
    }
}

impl ClientConfig {
    /// Reads the client configuration from `AWS_SQS_URL`, `AWS_ACCESS_KEY`,
    /// `AWS_SECRET_KEY` and `AWS_REGION`
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            endpoint: optional_var("AWS_SQS_URL"),
            access_key: optional_var("AWS_ACCESS_KEY"),
            secret_key: optional_var("AWS_SECRET_KEY"),
            region: optional_var("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
        }
    }

    /// Builds an SQS client with retry and timeout settings
    pub async fn sqs_client(&self) -> SqsClient {
        let retry_config = RetryConfig::standard()
            .with_max_attempts(3)
            .with_initial_backoff(Duration::from_millis(50));

        let timeout_config = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(30))
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .retry_config(retry_config)
            .timeout_config(timeout_config);

        if let Some(endpoint_url) = &self.endpoint {
            loader = loader.endpoint_url(endpoint_url);
        }

        if let (Some(access_key), Some(secret_key)) = (&self.access_key, &self.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "static",
            ));
        }

        SqsClient::new(&loader.load().await)
    }
}

/// Configuration of a [`crate::PollingConsumer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Name of the queue to consume
    pub queue_name: String,
    /// Messages wanted per polling round, rounded up to a multiple of
    /// [`MAX_MESSAGES_PER_REQUEST`] and capped at [`MAX_MESSAGES_PER_ROUND`]
    pub max_number_of_messages: i32,
    /// Long polling wait time in seconds
    pub wait_time_seconds: i32,
    /// Visibility timeout of received messages in seconds
    pub visibility_timeout: i32,
    /// Pause after a round in which every receive request failed
    pub wait_on_error: Duration,
    /// Remote calls in flight during one polling or deletion burst
    pub max_parallel_requests: usize,
}

impl ConsumerConfig {
    /// Creates a configuration for `queue_name` with default settings
    #[must_use]
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            max_number_of_messages: 10,
            wait_time_seconds: 5,
            visibility_timeout: 60,
            wait_on_error: Duration::from_secs(5),
            max_parallel_requests: DEFAULT_PARALLEL_REQUESTS,
        }
    }

    /// Reads the consumer configuration from the environment
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Configuration` if `AWS_SQS_QUEUE_NAME` is not set,
    /// a numeric variable cannot be parsed, or
    /// `AWS_SQS_QUEUE_MAX_MESSAGES_PER_BATCH` exceeds [`MAX_MESSAGES_PER_ROUND`]
    pub fn from_env() -> QueueResult<Self> {
        let defaults = Self::new(required_var("AWS_SQS_QUEUE_NAME")?);

        let max_number_of_messages = parsed_var(
            "AWS_SQS_QUEUE_MAX_MESSAGES_PER_BATCH",
            defaults.max_number_of_messages,
        )?;
        if max_number_of_messages > MAX_MESSAGES_PER_ROUND {
            return Err(QueueError::Configuration(format!(
                "AWS_SQS_QUEUE_MAX_MESSAGES_PER_BATCH must be at most {MAX_MESSAGES_PER_ROUND}, got {max_number_of_messages}"
            )));
        }

        Ok(Self {
            max_number_of_messages,
            wait_time_seconds: parsed_var("AWS_SQS_QUEUE_WAIT_TIME", defaults.wait_time_seconds)?,
            visibility_timeout: parsed_var(
                "AWS_SQS_QUEUE_VISIBILITY_TIMEOUT",
                defaults.visibility_timeout,
            )?,
            wait_on_error: Duration::from_secs(parsed_var(
                "AWS_SQS_QUEUE_WAIT_ON_ERROR_SECONDS",
                defaults.wait_on_error.as_secs(),
            )?),
            max_parallel_requests: parsed_var(
                "AWS_SQS_QUEUE_PARALLEL_REQUESTS",
                defaults.max_parallel_requests,
            )?,
            ..defaults
        })
    }

    /// Number of receive requests issued per polling round
    #[must_use]
    pub fn receive_request_count(&self) -> usize {
        let wanted = usize::try_from(self.max_number_of_messages.min(MAX_MESSAGES_PER_ROUND))
            .unwrap_or_default()
            .max(1);
        wanted.div_ceil(MAX_MESSAGES_PER_REQUEST)
    }
}

/// Configuration of a [`crate::Publisher`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherConfig {
    /// Name of the queue to publish to
    pub queue_name: String,
    /// Whether the queue is a FIFO queue
    pub is_fifo: bool,
}

impl PublisherConfig {
    /// Reads the publisher configuration from `AWS_SQS_QUEUE_NAME` and `AWS_SQS_FIFO_QUEUE`
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Configuration` if `AWS_SQS_QUEUE_NAME` is not set
    /// or `AWS_SQS_FIFO_QUEUE` is not a boolean
    pub fn from_env() -> QueueResult<Self> {
        Ok(Self {
            queue_name: required_var("AWS_SQS_QUEUE_NAME")?,
            is_fifo: parsed_var("AWS_SQS_FIFO_QUEUE", false)?,
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required_var(name: &str) -> QueueResult<String> {
    optional_var(name)
        .ok_or_else(|| QueueError::Configuration(format!("{name} environment variable is not set")))
}

fn parsed_var<T: FromStr>(name: &str, default: T) -> QueueResult<T> {
    optional_var(name).map_or(Ok(default), |value| {
        value.to_lowercase().parse().map_err(|_| {
            QueueError::Configuration(format!("{name} has an invalid value: {value}"))
        })
    })
}

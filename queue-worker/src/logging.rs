use std::env;

use tracing_subscriber::{fmt, EnvFilter};

/// Output format of the log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable lines, for local development
    Text,
    /// One JSON object per line, for log collectors
    Json,
}

impl LogFormat {
    /// Reads `LOG_FORMAT`; anything but `json` selects text output
    #[must_use]
    pub fn from_env() -> Self {
        Self::parse(env::var("LOG_FORMAT").ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Installs the global tracing subscriber, filtered by `RUST_LOG`
pub fn init_tracing(format: LogFormat) {
    match format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(EnvFilter::from_default_env())
                .init();
        }
        LogFormat::Text => {
            fmt().with_env_filter(EnvFilter::from_default_env()).init();
        }
    }
}

//! Structured logging setup.
//!
//! Follows the conventional `tracing`/`tracing-subscriber` based logging
//! module: a `LoggingConfig` record parsed straight out of the user
//! configuration document's `logging { level, format }` keys (`spec.md` §6)
//! drives a single process-wide subscriber.

use serde::Deserialize;
use std::fmt::Debug;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::PrettyFields;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("could not initialize the global tracing subscriber: `{0}`")]
    TryInit(String),
}

#[derive(Debug, Deserialize, PartialEq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Debug, Deserialize, PartialEq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, PartialEq, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Installs the global subscriber. Must be called exactly once per
    /// process, as early as possible (before the Supervisor or API server
    /// start, so their startup is itself logged).
    pub fn try_init(&self) -> Result<(), LoggingError> {
        let level: Level = self.level.into();
        let filter = EnvFilter::builder()
            .with_default_directive(level.into())
            .with_env_var("NRDOT_LOG")
            .from_env_lossy();

        let result = match self.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .try_init(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_timer(ChronoLocal::new("%Y-%m-%dT%H:%M:%S%.3f".to_string()))
                .fmt_fields(PrettyFields::new())
                .try_init(),
        };

        result.map_err(|err| LoggingError::TryInit(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_level_is_info() {
        assert_eq!(LoggingConfig::default().level, LogLevel::Info);
    }

    #[test]
    fn deserializes_from_yaml() {
        let config: LoggingConfig = serde_yaml::from_str("level: debug\nformat: json\n").unwrap();
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);
    }
}

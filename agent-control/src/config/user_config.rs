//! The operator-authored configuration document (`spec.md` §3, `UserConfig`;
//! §6 for the recognized key set).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ServiceIdentity {
    pub name: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_interval")]
    pub interval_seconds: u64,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    /// host:port entries to scrape in addition to the built-in host/process
    /// receivers.
    #[serde(default)]
    pub prometheus_targets: Vec<String>,
    #[serde(default)]
    pub process_monitoring: bool,
}

fn default_true() -> bool {
    true
}

fn default_metrics_interval() -> u64 {
    60
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_metrics_interval(),
            include: Vec::new(),
            exclude: Vec::new(),
            prometheus_targets: Vec::new(),
            process_monitoring: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TracesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,
}

fn default_sample_rate() -> f64 {
    1.0
}

impl Default for TracesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: default_sample_rate(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LogSource {
    pub path: PathBuf,
    #[serde(default)]
    pub parser: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LogsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub sources: Vec<LogSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    #[serde(default)]
    pub redact_secrets: bool,
    #[serde(default)]
    pub blocked_attributes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct EnrichmentConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProcessingConfig {
    #[serde(default)]
    pub cardinality_limit: Option<u64>,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    #[default]
    Gzip,
    None,
    Zstd,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_initial_interval")]
    pub initial_interval: String,
    #[serde(default = "default_max_interval")]
    pub max_interval: String,
    #[serde(default = "default_max_elapsed_time")]
    pub max_elapsed_time: String,
}

fn default_initial_interval() -> String {
    "5s".to_string()
}
fn default_max_interval() -> String {
    "30s".to_string()
}
fn default_max_elapsed_time() -> String {
    "300s".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    pub endpoint: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default = "default_export_timeout")]
    pub timeout: String,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_export_timeout() -> String {
    "30s".to_string()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_interval: default_initial_interval(),
            max_interval: default_max_interval(),
            max_elapsed_time: default_max_elapsed_time(),
        }
    }
}

/// The full user-authored document (`spec.md` §6). Parsing is strict:
/// unknown top-level (and nested) keys are rejected via
/// `#[serde(deny_unknown_fields)]` on every nested record, implementing the
/// "closed schema" requirement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    pub service: ServiceIdentity,
    #[serde(default)]
    pub license_key: String,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub traces: TracesConfig,
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    pub export: ExportConfig,
    #[serde(default)]
    pub logging: crate::logging::LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r#"
service:
  name: my-service
license_key: abc123
export:
  endpoint: https://otlp.nr-data.net:4317
"#
    }

    #[test]
    fn parses_minimal_document() {
        let config: UserConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        assert_eq!(config.service.name, "my-service");
        assert_eq!(config.license_key, "abc123");
        assert!(config.metrics.enabled);
        assert_eq!(config.traces.sample_rate, 1.0);
    }

    #[test]
    fn rejects_unknown_top_level_key() {
        let yaml = format!("{}\nbogus_key: true\n", minimal_yaml());
        let result: Result<UserConfig, _> = serde_yaml::from_str(&yaml);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_unknown_nested_key() {
        let yaml = r#"
service:
  name: my-service
  bogus: 1
license_key: abc123
export:
  endpoint: https://otlp.nr-data.net:4317
"#;
        let result: Result<UserConfig, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn serialize_then_parse_round_trips() {
        let config: UserConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        let serialized = serde_yaml::to_string(&config).unwrap();
        let reparsed: UserConfig = serde_yaml::from_str(&serialized).unwrap();
        assert_eq!(config, reparsed);
    }
}

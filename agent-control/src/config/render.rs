//! The Render operation (`spec.md` §4.1): turns a validated [`UserConfig`]
//! into the collector configuration document the Supervisor writes to disk
//! and hands to the child process.

use super::error::ConfigError;
use super::fingerprint::Generation;
use super::rendered::RenderedConfig;
use super::templates;
use super::user_config::UserConfig;
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Renders `config` at `generation`. Rendering is pure and total over any
/// already-validated `UserConfig`: it cannot itself fail, since every
/// partial only consumes fields the Validate operation has already checked
/// for well-formedness. `Result` is kept in the signature so a future
/// partial that performs fallible work (e.g. resolving a secret reference)
/// does not need to change this function's callers.
pub fn render(config: &UserConfig, generation: Generation) -> Result<RenderedConfig, ConfigError> {
    let mut document: BTreeMap<String, Value> = BTreeMap::new();

    document.insert(
        "receivers".to_string(),
        to_value(templates::receivers(config))?,
    );
    document.insert(
        "processors".to_string(),
        to_value(templates::processors(config))?,
    );
    document.insert(
        "exporters".to_string(),
        to_value(templates::exporters(config))?,
    );

    let mut service: BTreeMap<String, Value> = BTreeMap::new();
    service.insert("pipelines".to_string(), to_value(templates::pipelines(config))?);
    document.insert("service".to_string(), to_value(service)?);

    let yaml = serde_yaml::to_string(&document)
        .map_err(|err| ConfigError::Render(err.to_string()))?;

    Ok(RenderedConfig::new(generation, yaml).with_source(std::sync::Arc::new(config.clone())))
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, ConfigError> {
    serde_yaml::to_value(value).map_err(|err| ConfigError::Render(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::user_config::{Compression, ExportConfig, ServiceIdentity};

    fn config() -> UserConfig {
        UserConfig {
            service: ServiceIdentity {
                name: "checkout".to_string(),
                environment: "production".to_string(),
                version: None,
                tags: Default::default(),
            },
            license_key: "license-123".to_string(),
            dry_run: false,
            metrics: Default::default(),
            traces: Default::default(),
            logs: Default::default(),
            security: Default::default(),
            processing: Default::default(),
            export: ExportConfig {
                endpoint: "https://otlp.nr-data.net:4317".to_string(),
                region: None,
                compression: Compression::Gzip,
                timeout: "30s".to_string(),
                retry: Default::default(),
            },
            logging: Default::default(),
        }
    }

    #[test]
    fn render_is_deterministic_across_repeated_calls() {
        let first = render(&config(), Generation::initial()).unwrap();
        let second = render(&config(), Generation::initial().next()).unwrap();
        assert!(first.same_content_as(&second));
        assert_ne!(first.generation, second.generation);
    }

    #[test]
    fn render_produces_valid_yaml_with_top_level_sections() {
        let rendered = render(&config(), Generation::initial()).unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&rendered.yaml).unwrap();
        assert!(parsed.get("receivers").is_some());
        assert!(parsed.get("processors").is_some());
        assert!(parsed.get("exporters").is_some());
        assert!(parsed.get("service").is_some());
    }
}

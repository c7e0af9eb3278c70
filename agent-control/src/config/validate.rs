//! The Validate operation (`spec.md` §4.1): semantic checks beyond what the
//! closed-schema parse already rejects. Collects every failure rather than
//! stopping at the first, so an operator can fix a document in one pass.

use super::error::ValidationError;
use super::user_config::UserConfig;

pub fn validate(config: &UserConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::new("service.name", "must not be empty"));
    }

    if !config.dry_run && config.license_key.trim().is_empty() {
        errors.push(ValidationError::new(
            "license_key",
            "must not be empty unless dry_run is set",
        ));
    }

    if let Some(version) = &config.service.version {
        if semver::Version::parse(version).is_err() {
            errors.push(ValidationError::new(
                "service.version",
                format!("`{version}` is not a valid semantic version"),
            ));
        }
    }

    if !(0.0..=1.0).contains(&config.traces.sample_rate) {
        errors.push(ValidationError::new(
            "traces.sample_rate",
            format!(
                "must be between 0.0 and 1.0, got {}",
                config.traces.sample_rate
            ),
        ));
    }

    if url::Url::parse(&config.export.endpoint).is_err() {
        errors.push(ValidationError::new(
            "export.endpoint",
            format!("`{}` is not a valid URL", config.export.endpoint),
        ));
    }

    check_duration(&mut errors, "export.timeout", &config.export.timeout);
    check_duration(
        &mut errors,
        "export.retry.initial_interval",
        &config.export.retry.initial_interval,
    );
    check_duration(
        &mut errors,
        "export.retry.max_interval",
        &config.export.retry.max_interval,
    );
    check_duration(
        &mut errors,
        "export.retry.max_elapsed_time",
        &config.export.retry.max_elapsed_time,
    );

    if let Some(limit) = config.processing.cardinality_limit {
        if limit == 0 {
            errors.push(ValidationError::new(
                "processing.cardinality_limit",
                "must be greater than zero",
            ));
        }
    }

    for (i, source) in config.logs.sources.iter().enumerate() {
        if !source.path.is_absolute() {
            errors.push(ValidationError::new(
                format!("logs.sources[{i}].path"),
                format!("`{}` must be an absolute path", source.path.display()),
            ));
        }
    }

    if config.metrics.enabled && config.metrics.interval_seconds == 0 {
        errors.push(ValidationError::new(
            "metrics.interval_seconds",
            "must be greater than zero",
        ));
    }

    for target in &config.metrics.prometheus_targets {
        if target.split(':').count() != 2 {
            errors.push(ValidationError::new(
                "metrics.prometheus_targets",
                format!("`{target}` must be a `host:port` pair"),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_duration(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if duration_str::parse(value).is_err() {
        errors.push(ValidationError::new(
            field,
            format!("`{value}` is not a valid duration"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::user_config::{Compression, ExportConfig, ServiceIdentity};

    fn valid_config() -> UserConfig {
        UserConfig {
            service: ServiceIdentity {
                name: "checkout".to_string(),
                environment: "production".to_string(),
                version: Some("1.2.3".to_string()),
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
    fn accepts_a_well_formed_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn rejects_empty_service_name() {
        let mut config = valid_config();
        config.service.name = String::new();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "service.name"));
    }

    #[test]
    fn rejects_missing_license_key_unless_dry_run() {
        let mut config = valid_config();
        config.license_key = String::new();
        assert!(validate(&config).is_err());

        config.dry_run = true;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn rejects_out_of_range_sample_rate() {
        let mut config = valid_config();
        config.traces.sample_rate = 1.5;
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "traces.sample_rate"));
    }

    #[test]
    fn rejects_malformed_duration() {
        let mut config = valid_config();
        config.export.timeout = "not-a-duration".to_string();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "export.timeout"));
    }

    #[test]
    fn rejects_relative_log_source_path() {
        let mut config = valid_config();
        config.logs.enabled = true;
        config.logs.sources.push(crate::config::user_config::LogSource {
            path: "relative/path.log".into(),
            parser: None,
            attributes: Default::default(),
        });
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "logs.sources[0].path"));
    }

    #[test]
    fn collects_every_failure_in_one_pass() {
        let mut config = valid_config();
        config.service.name = String::new();
        config.license_key = String::new();
        config.traces.sample_rate = -1.0;
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}

//! Named template partials (`spec.md` §4.1): each partial turns one section
//! of the [`UserConfig`](super::user_config::UserConfig) into a fragment of
//! the collector's own configuration document. `render` merges the
//! fragments into one canonically-ordered tree.
//!
//! Every partial returns a `BTreeMap` rather than a `serde_yaml::Mapping` so
//! that key order in the rendered YAML is deterministic and independent of
//! the order fields were declared in the user document — required for
//! [`Fingerprint`](super::fingerprint::Fingerprint) stability.

use super::user_config::{Compression, UserConfig};
use serde_yaml::Value;
use std::collections::BTreeMap;

fn value_map(entries: Vec<(&str, Value)>) -> Value {
    let map: BTreeMap<String, Value> = entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    serde_yaml::to_value(map).expect("BTreeMap<String, Value> always serializes")
}

/// The `receivers:` section: always includes the host metrics receiver,
/// conditionally adds a process-monitoring receiver, one `prometheus`
/// scrape receiver per configured target, and a `filelog` receiver per log
/// source.
pub fn receivers(config: &UserConfig) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();

    if config.metrics.enabled {
        out.insert(
            "hostmetrics".to_string(),
            value_map(vec![(
                "collection_interval",
                Value::String(format!("{}s", config.metrics.interval_seconds)),
            )]),
        );

        if config.metrics.process_monitoring {
            out.insert(
                "hostmetrics/process".to_string(),
                value_map(vec![
                    (
                        "collection_interval",
                        Value::String(format!("{}s", config.metrics.interval_seconds)),
                    ),
                    ("scrapers", value_map(vec![("process", Value::Mapping(Default::default()))])),
                ]),
            );
        }

        for (i, target) in config.metrics.prometheus_targets.iter().enumerate() {
            out.insert(
                format!("prometheus/target_{i}"),
                value_map(vec![(
                    "config",
                    value_map(vec![(
                        "scrape_configs",
                        Value::Sequence(vec![value_map(vec![
                            ("job_name", Value::String(format!("target_{i}"))),
                            (
                                "static_configs",
                                Value::Sequence(vec![value_map(vec![(
                                    "targets",
                                    Value::Sequence(vec![Value::String(target.clone())]),
                                )])]),
                            ),
                        ])]),
                    )]),
                )]),
            );
        }
    }

    if config.logs.enabled {
        for (i, source) in config.logs.sources.iter().enumerate() {
            let mut entries = vec![(
                "include",
                Value::Sequence(vec![Value::String(
                    source.path.to_string_lossy().into_owned(),
                )]),
            )];
            if let Some(parser) = &source.parser {
                entries.push(("operators", parser_operators(parser)));
            }
            out.insert(format!("filelog/source_{i}"), value_map(entries));
        }
    }

    if config.traces.enabled {
        out.insert("otlp".to_string(), value_map(vec![]));
    }

    out
}

fn parser_operators(parser: &str) -> Value {
    Value::Sequence(vec![value_map(vec![
        ("type", Value::String("regex_parser".to_string())),
        ("parse_from", Value::String("body".to_string())),
        ("regex", Value::String(parser.to_string())),
    ])])
}

/// The `processors:` section: attribute enrichment, cardinality limiting,
/// secret redaction and a resource-detection processor always present to
/// attach [`ServiceIdentity`](crate::config::ServiceIdentity).
pub fn processors(config: &UserConfig) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();

    let mut resource_attrs = vec![value_map(vec![
        ("key", Value::String("service.name".to_string())),
        ("value", Value::String(config.service.name.clone())),
        ("action", Value::String("upsert".to_string())),
    ])];
    if !config.service.environment.is_empty() {
        resource_attrs.push(value_map(vec![
            ("key", Value::String("deployment.environment".to_string())),
            ("value", Value::String(config.service.environment.clone())),
            ("action", Value::String("upsert".to_string())),
        ]));
    }
    for (k, v) in &config.service.tags {
        resource_attrs.push(value_map(vec![
            ("key", Value::String(k.clone())),
            ("value", Value::String(v.clone())),
            ("action", Value::String("upsert".to_string())),
        ]));
    }
    out.insert(
        "resource".to_string(),
        value_map(vec![("attributes", Value::Sequence(resource_attrs))]),
    );

    if let Some(limit) = config.processing.cardinality_limit {
        out.insert(
            "filter/cardinality".to_string(),
            value_map(vec![("metrics", value_map(vec![("max_series", Value::Number(limit.into()))]))]),
        );
    }

    if config.processing.enrichment.enabled && !config.processing.enrichment.attributes.is_empty() {
        let attrs = config
            .processing
            .enrichment
            .attributes
            .iter()
            .map(|(k, v)| {
                value_map(vec![
                    ("key", Value::String(k.clone())),
                    ("value", Value::String(v.clone())),
                    ("action", Value::String("insert".to_string())),
                ])
            })
            .collect();
        out.insert(
            "attributes/enrichment".to_string(),
            value_map(vec![("actions", Value::Sequence(attrs))]),
        );
    }

    if config.security.redact_secrets && !config.security.blocked_attributes.is_empty() {
        let actions = config
            .security
            .blocked_attributes
            .iter()
            .map(|attr| {
                value_map(vec![
                    ("key", Value::String(attr.clone())),
                    ("action", Value::String("delete".to_string())),
                ])
            })
            .collect();
        out.insert(
            "attributes/redact".to_string(),
            value_map(vec![("actions", Value::Sequence(actions))]),
        );
    }

    out.insert("batch".to_string(), value_map(vec![]));

    out
}

/// The `exporters:` section: a single OTLP exporter targeting the
/// configured endpoint, honoring compression, timeout and retry settings.
pub fn exporters(config: &UserConfig) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();

    let compression = match config.export.compression {
        Compression::Gzip => "gzip",
        Compression::None => "none",
        Compression::Zstd => "zstd",
    };

    let mut entries = vec![
        ("endpoint", Value::String(config.export.endpoint.clone())),
        ("compression", Value::String(compression.to_string())),
        ("timeout", Value::String(config.export.timeout.clone())),
    ];

    let mut headers = BTreeMap::new();
    if !config.license_key.is_empty() {
        headers.insert(
            "api-key".to_string(),
            Value::String(config.license_key.clone()),
        );
    }
    if !headers.is_empty() {
        entries.push((
            "headers",
            serde_yaml::to_value(headers).expect("string map always serializes"),
        ));
    }

    if config.export.retry.enabled {
        entries.push((
            "retry_on_failure",
            value_map(vec![
                ("enabled", Value::Bool(true)),
                (
                    "initial_interval",
                    Value::String(config.export.retry.initial_interval.clone()),
                ),
                (
                    "max_interval",
                    Value::String(config.export.retry.max_interval.clone()),
                ),
                (
                    "max_elapsed_time",
                    Value::String(config.export.retry.max_elapsed_time.clone()),
                ),
            ]),
        ));
    } else {
        entries.push((
            "retry_on_failure",
            value_map(vec![("enabled", Value::Bool(false))]),
        ));
    }

    out.insert("otlp".to_string(), value_map(entries));
    out
}

/// The `service:` section's `pipelines:` subtree, wiring the receivers and
/// processors declared above into metrics/traces/logs pipelines, omitting
/// any signal the user disabled.
pub fn pipelines(config: &UserConfig) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();

    let mut processor_names = vec!["resource".to_string()];
    if config.processing.cardinality_limit.is_some() {
        processor_names.push("filter/cardinality".to_string());
    }
    if config.processing.enrichment.enabled && !config.processing.enrichment.attributes.is_empty() {
        processor_names.push("attributes/enrichment".to_string());
    }
    if config.security.redact_secrets && !config.security.blocked_attributes.is_empty() {
        processor_names.push("attributes/redact".to_string());
    }
    processor_names.push("batch".to_string());

    let processor_values: Vec<Value> = processor_names.iter().cloned().map(Value::String).collect();

    if config.metrics.enabled {
        let mut receiver_names = vec!["hostmetrics".to_string()];
        if config.metrics.process_monitoring {
            receiver_names.push("hostmetrics/process".to_string());
        }
        for i in 0..config.metrics.prometheus_targets.len() {
            receiver_names.push(format!("prometheus/target_{i}"));
        }
        out.insert(
            "metrics".to_string(),
            value_map(vec![
                (
                    "receivers",
                    Value::Sequence(receiver_names.into_iter().map(Value::String).collect()),
                ),
                ("processors", Value::Sequence(processor_values.clone())),
                (
                    "exporters",
                    Value::Sequence(vec![Value::String("otlp".to_string())]),
                ),
            ]),
        );
    }

    if config.traces.enabled {
        out.insert(
            "traces".to_string(),
            value_map(vec![
                (
                    "receivers",
                    Value::Sequence(vec![Value::String("otlp".to_string())]),
                ),
                ("processors", Value::Sequence(processor_values.clone())),
                (
                    "exporters",
                    Value::Sequence(vec![Value::String("otlp".to_string())]),
                ),
            ]),
        );
    }

    if config.logs.enabled && !config.logs.sources.is_empty() {
        let receiver_names: Vec<Value> = (0..config.logs.sources.len())
            .map(|i| Value::String(format!("filelog/source_{i}")))
            .collect();
        out.insert(
            "logs".to_string(),
            value_map(vec![
                ("receivers", Value::Sequence(receiver_names)),
                ("processors", Value::Sequence(processor_values)),
                (
                    "exporters",
                    Value::Sequence(vec![Value::String("otlp".to_string())]),
                ),
            ]),
        );
    }

    out
}

//! The Diff operation (`spec.md` §4.1): a structural comparison of two
//! renders' top-level sections, used for logging and the API's config-diff
//! surface. It is explicitly **not** used to decide whether the Supervisor
//! must reload or restart the collector — fingerprint (in)equality decides
//! that (`spec.md` §4.1, §8).

use super::rendered::RenderedConfig;
use serde::Serialize;

/// Top-level sections added, removed or changed between two renders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl ConfigDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Compares `next` against `previous` (absent on the very first apply, in
/// which case every section of `next` is reported as added).
pub fn diff(previous: Option<&RenderedConfig>, next: &RenderedConfig) -> ConfigDiff {
    let Some(previous) = previous else {
        return ConfigDiff {
            added: top_level_keys(&next.yaml),
            removed: Vec::new(),
            changed: Vec::new(),
        };
    };

    if previous.same_content_as(next) {
        return ConfigDiff::default();
    }

    let prev_doc: serde_yaml::Value = serde_yaml::from_str(&previous.yaml).unwrap_or_default();
    let next_doc: serde_yaml::Value = serde_yaml::from_str(&next.yaml).unwrap_or_default();

    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut changed = Vec::new();

    let (Some(prev_map), Some(next_map)) = (prev_doc.as_mapping(), next_doc.as_mapping()) else {
        return ConfigDiff::default();
    };

    let mut keys: Vec<&serde_yaml::Value> = prev_map.keys().chain(next_map.keys()).collect();
    keys.sort_by_key(|k| k.as_str().unwrap_or_default().to_string());
    keys.dedup();

    for key in keys {
        let Some(name) = key.as_str() else { continue };
        match (prev_map.get(key), next_map.get(key)) {
            (None, Some(_)) => added.push(name.to_string()),
            (Some(_), None) => removed.push(name.to_string()),
            (Some(a), Some(b)) if a != b => changed.push(name.to_string()),
            _ => {}
        }
    }

    ConfigDiff {
        added,
        removed,
        changed,
    }
}

fn top_level_keys(yaml: &str) -> Vec<String> {
    let doc: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap_or_default();
    let Some(map) = doc.as_mapping() else {
        return Vec::new();
    };
    let mut keys: Vec<String> = map
        .keys()
        .filter_map(|k| k.as_str().map(str::to_string))
        .collect();
    keys.sort();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::fingerprint::Generation;

    fn rendered(yaml: &str) -> RenderedConfig {
        RenderedConfig::new(Generation::initial(), yaml.to_string())
    }

    #[test]
    fn no_previous_config_reports_every_section_added() {
        let next = rendered("receivers:\n  otlp: {}\nprocessors:\n  batch: {}\n");
        let result = diff(None, &next);
        assert_eq!(result.added, vec!["processors", "receivers"]);
        assert!(result.removed.is_empty());
        assert!(result.changed.is_empty());
    }

    #[test]
    fn identical_content_is_empty_diff() {
        let previous = rendered("receivers:\n  otlp: {}\n");
        let next = rendered("receivers:\n  otlp: {}\n");
        assert!(diff(Some(&previous), &next).is_empty());
    }

    #[test]
    fn detects_changed_section() {
        let previous = rendered("receivers:\n  otlp: {}\nprocessors:\n  batch: {}\n");
        let next = rendered("receivers:\n  otlp: {}\nprocessors:\n  batch:\n    timeout: 5s\n");
        let result = diff(Some(&previous), &next);
        assert_eq!(result.changed, vec!["processors"]);
        assert!(result.added.is_empty());
        assert!(result.removed.is_empty());
    }

    #[test]
    fn detects_added_and_removed_sections() {
        let previous = rendered("receivers:\n  otlp: {}\n");
        let next = rendered("exporters:\n  otlp: {}\n");
        let result = diff(Some(&previous), &next);
        assert_eq!(result.added, vec!["exporters"]);
        assert_eq!(result.removed, vec!["receivers"]);
    }
}

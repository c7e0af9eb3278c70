use super::fingerprint::{Fingerprint, Generation};
use super::user_config::UserConfig;
use std::sync::Arc;
use std::time::SystemTime;

/// The output of the Render operation (`spec.md` §4.1): the collector
/// configuration document the Supervisor hands to the child process, along
/// with the identity it is tracked by.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedConfig {
    pub generation: Generation,
    pub fingerprint: Fingerprint,
    pub yaml: String,
    pub rendered_at: SystemTime,
    /// The `UserConfig` this render was produced from, kept around so the
    /// API's `GET /v1/config` can serve it back without re-reading the
    /// file (`spec.md` §3, §4.3).
    pub source: Option<Arc<UserConfig>>,
}

impl RenderedConfig {
    pub fn new(generation: Generation, yaml: String) -> Self {
        let fingerprint = Fingerprint::of(yaml.as_bytes());
        Self {
            generation,
            fingerprint,
            yaml,
            rendered_at: SystemTime::now(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: Arc<UserConfig>) -> Self {
        self.source = Some(source);
        self
    }

    /// Whether this render produced byte-identical collector configuration
    /// to `other`, irrespective of generation.
    pub fn same_content_as(&self, other: &RenderedConfig) -> bool {
        self.fingerprint == other.fingerprint
    }
}

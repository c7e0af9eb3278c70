//! The Config Engine (`spec.md` §4.1): loads the operator's YAML document,
//! validates it, renders it into the collector's own configuration format,
//! and decides what changed since the last accepted generation.

pub mod diff;
pub mod error;
pub mod fingerprint;
pub mod render;
pub mod rendered;
pub mod templates;
pub mod user_config;
pub mod validate;

pub use diff::{diff, ConfigDiff};
pub use error::{ConfigError, ValidationError};
pub use fingerprint::{Fingerprint, Generation};
pub use rendered::RenderedConfig;
pub use user_config::UserConfig;

use fs::file::reader::FileReader;
use fs::file::writer::FileWriter;
use fs::file::LocalFile;
use std::path::{Path, PathBuf};

/// Parses and validates a configuration document in one step, the
/// sequence every caller (CLI startup, the API's `POST /v1/config`, SIGHUP
/// reload) needs (`spec.md` §4.1).
pub fn parse_and_validate(yaml: &str) -> Result<UserConfig, ConfigError> {
    let config: UserConfig =
        serde_yaml::from_str(yaml).map_err(|err| ConfigError::Parse(err.to_string()))?;
    validate::validate(&config).map_err(ConfigError::validation)?;
    Ok(config)
}

/// Owns the path to the operator's configuration document and the
/// generation counter, so repeated `load_and_render` calls (one per SIGHUP,
/// one per `POST /v1/config`) produce monotonically increasing
/// generations over the same file.
pub struct ConfigEngine {
    path: PathBuf,
    next_generation: Generation,
}

impl ConfigEngine {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            next_generation: Generation::initial(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hands out the next generation number, for callers (e.g. the API's
    /// `POST /v1/config`) that render a `UserConfig` handed to them
    /// directly rather than read from `self.path`.
    pub fn allocate_generation(&mut self) -> Generation {
        let generation = self.next_generation;
        self.next_generation = self.next_generation.next();
        generation
    }

    /// Reads the configuration file from disk, parses, validates and
    /// renders it, returning the render at a freshly allocated generation.
    pub fn load_and_render(&mut self) -> Result<RenderedConfig, ConfigError> {
        let reader = LocalFile;
        let yaml = reader.read(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        let config = parse_and_validate(&yaml)?;
        let generation = self.allocate_generation();
        render::render(&config, generation)
    }
}

/// Writes a rendered configuration to `path` as the collector reads it.
/// Delegates to [`fs`]'s atomic writer (temp file + rename) so a crash
/// mid-write never leaves the collector with a truncated document.
pub fn write_rendered(writer: &impl FileWriter, path: &Path, rendered: &RenderedConfig) -> Result<(), ConfigError> {
    writer
        .write(path, rendered.yaml.clone())
        .map_err(ConfigError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn load_and_render_allocates_increasing_generations() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "service:\n  name: checkout\nlicense_key: abc\nexport:\n  endpoint: https://otlp.nr-data.net:4317\n"
        )
        .unwrap();

        let mut engine = ConfigEngine::new(file.path());
        let first = engine.load_and_render().unwrap();
        let second = engine.load_and_render().unwrap();

        assert_eq!(first.generation, Generation::initial());
        assert_eq!(second.generation, Generation::initial().next());
        assert!(first.same_content_as(&second));
    }

    #[test]
    fn load_and_render_surfaces_validation_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "service:\n  name: \"\"\nexport:\n  endpoint: https://otlp.nr-data.net:4317\n").unwrap();

        let mut engine = ConfigEngine::new(file.path());
        let result = engine.load_and_render();
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}

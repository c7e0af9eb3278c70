//! Atomic on-disk config swap (`spec.md` §4.2, apply algorithm steps 1-2;
//! §5, "the on-disk collector config file is mutated only by the
//! Supervisor, via write-tempfile + atomic rename"). Built on `fs`'s
//! `FileWriter`/`FileRenamer` traits the way every file is written and renames
//! every file it persists — generalized here to also retain the previous
//! revision as `<path>.prev` for rollback.

use fs::file::renamer::FileRenamer;
use fs::file::writer::FileWriter;
use std::path::{Path, PathBuf};

use super::error::SupervisorError;
use crate::config::RenderedConfig;

fn tmp_path(config_path: &Path) -> PathBuf {
    let mut path = config_path.as_os_str().to_owned();
    path.push(".tmp");
    PathBuf::from(path)
}

pub fn prev_path(config_path: &Path) -> PathBuf {
    let mut path = config_path.as_os_str().to_owned();
    path.push(".prev");
    PathBuf::from(path)
}

/// Writes `rendered` to a temp file beside `config_path`, fsyncs it, and
/// renames it into place. If `config_path` already holds a file, it is
/// preserved as `<config_path>.prev` first.
pub fn swap_in(
    writer: &impl FileWriter,
    renamer: &impl FileRenamer,
    config_path: &Path,
    rendered: &RenderedConfig,
) -> Result<(), SupervisorError> {
    let tmp = tmp_path(config_path);
    writer.write(&tmp, rendered.yaml.clone())?;
    std::fs::File::open(&tmp)?.sync_all()?;

    if config_path.exists() {
        renamer.rename(config_path, &prev_path(config_path))?;
    }
    renamer
        .rename(&tmp, config_path)
        .map_err(SupervisorError::Io)?;
    Ok(())
}

/// Renames `<config_path>.prev` back into place, undoing a failed
/// `swap_in` (`spec.md` §4.2, step 7).
pub fn rollback(renamer: &impl FileRenamer, config_path: &Path) -> Result<(), SupervisorError> {
    renamer
        .rename(&prev_path(config_path), config_path)
        .map_err(SupervisorError::Io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Generation;
    use fs::file::LocalFile;

    fn rendered(yaml: &str) -> RenderedConfig {
        RenderedConfig::new(Generation::initial(), yaml.to_string())
    }

    #[test]
    fn swap_in_writes_and_preserves_previous() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("collector.yaml");
        std::fs::write(&config_path, "receivers: {}\n").unwrap();

        swap_in(
            &LocalFile,
            &LocalFile,
            &config_path,
            &rendered("receivers:\n  otlp: {}\n"),
        )
        .unwrap();

        assert_eq!(
            std::fs::read_to_string(&config_path).unwrap(),
            "receivers:\n  otlp: {}\n"
        );
        assert_eq!(
            std::fs::read_to_string(prev_path(&config_path)).unwrap(),
            "receivers: {}\n"
        );
    }

    #[test]
    fn rollback_restores_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("collector.yaml");
        std::fs::write(&config_path, "receivers: {}\n").unwrap();

        swap_in(
            &LocalFile,
            &LocalFile,
            &config_path,
            &rendered("receivers:\n  otlp: {}\n"),
        )
        .unwrap();
        rollback(&LocalFile, &config_path).unwrap();

        assert_eq!(
            std::fs::read_to_string(&config_path).unwrap(),
            "receivers: {}\n"
        );
    }

    #[test]
    fn swap_in_without_an_existing_file_creates_no_prev() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("collector.yaml");

        swap_in(
            &LocalFile,
            &LocalFile,
            &config_path,
            &rendered("receivers:\n  otlp: {}\n"),
        )
        .unwrap();

        assert!(!prev_path(&config_path).exists());
        assert!(config_path.exists());
    }
}

use super::index::PathIndex;
use super::DiscoveryError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const REQUIREMENTS_FILE: &str = "requirements.txt";

/// Finds the optional `requirements.txt` under a directory tree.
#[derive(Debug, Clone, Default)]
pub struct RequirementsLocator {
    index: PathIndex,
}

impl RequirementsLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Ok(None)` when no requirements file exists. More than one is an
    /// error: the runner never picks between dependency lists.
    pub fn locate(&self, dir: &Path) -> Result<Option<PathBuf>, DiscoveryError> {
        debug!(dir = %dir.display(), "Searching for requirements file");
        let mut found = self.index.find(dir, REQUIREMENTS_FILE);

        match found.len() {
            0 => {
                info!(dir = %dir.display(), "No requirements file, skipping dependency install");
                Ok(None)
            }
            1 => {
                let path = found.remove(0);
                info!(requirements = %path.display(), "Found requirements file");
                Ok(Some(path))
            }
            _ => {
                found.sort();
                Err(DiscoveryError::AmbiguousRequirements { candidates: found })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_none_when_absent() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.py"), "").unwrap();
        assert_eq!(RequirementsLocator::new().locate(dir.path()).unwrap(), None);
    }

    #[test]
    fn test_nested_single_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("env")).unwrap();
        let req = dir.path().join("env/requirements.txt");
        fs::write(&req, "numpy\n").unwrap();

        assert_eq!(
            RequirementsLocator::new().locate(dir.path()).unwrap(),
            Some(req)
        );
    }

    #[test]
    fn test_multiple_files_are_ambiguous() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("requirements.txt"), "").unwrap();
        fs::write(dir.path().join("a/requirements.txt"), "").unwrap();

        match RequirementsLocator::new().locate(dir.path()) {
            Err(DiscoveryError::AmbiguousRequirements { candidates }) => {
                assert_eq!(candidates.len(), 2)
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_similar_names_do_not_count() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("requirements-dev.txt"), "").unwrap();
        fs::write(dir.path().join("requirements.txt.orig"), "").unwrap();
        assert_eq!(RequirementsLocator::new().locate(dir.path()).unwrap(), None);
    }
}

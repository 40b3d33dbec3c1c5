//! Recursive file enumeration under an input directory.
//!
//! The input directory is written by an external process while we scan it, so
//! every failure here (missing root, unreadable entry, bad pattern) degrades to
//! "fewer matches" instead of an error. Callers treat an empty result as
//! "not there yet".

use ignore::{overrides::OverrideBuilder, WalkBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Stateless scanner returning every file under a root whose name matches a glob.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathIndex;

impl PathIndex {
    pub fn new() -> Self {
        Self
    }

    /// Finds all files under `root` whose file name matches `pattern`.
    ///
    /// `pattern` uses gitignore glob syntax without a slash, so `*.py` matches
    /// at any depth and `main.py` matches that exact file name. Ordering follows
    /// the directory walk and must not be relied on.
    pub fn find(&self, root: &Path, pattern: &str) -> Vec<PathBuf> {
        if !root.is_dir() {
            debug!(root = %root.display(), "Scan root does not exist yet");
            return Vec::new();
        }

        let mut overrides = OverrideBuilder::new(root);
        if let Err(err) = overrides.add(pattern) {
            warn!(pattern, error = %err, "Invalid file pattern, nothing will match");
            return Vec::new();
        }
        let overrides = match overrides.build() {
            Ok(o) => o,
            Err(err) => {
                warn!(pattern, error = %err, "Failed to build file pattern matcher");
                return Vec::new();
            }
        };

        // Hidden files and ignore files count as user content.
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(true)
            .overrides(overrides)
            .build();

        let mut matches = Vec::new();
        for result in walker {
            let entry = match result {
                Ok(e) => e,
                Err(err) => {
                    warn!(error = %err, "Failed to read directory entry");
                    continue;
                }
            };

            if entry.path().is_file() {
                matches.push(entry.into_path());
            }
        }

        debug!(
            root = %root.display(),
            pattern,
            matches = matches.len(),
            "Scan completed"
        );
        matches
    }
}

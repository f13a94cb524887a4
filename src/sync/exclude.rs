// ABOUTME: Exclusion rules for the source tree upload.
// ABOUTME: Exact name matching on directory and file names, no globbing.

use serde::Deserialize;
use std::collections::BTreeSet;

/// Names to leave out of the upload.
///
/// A directory whose name is listed is pruned together with everything
/// below it; a file whose name is listed is skipped wherever it appears.
/// Entries are compared against a single path segment, so `worker/tmp`
/// never matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExclusionRules {
    #[serde(default)]
    pub directories: BTreeSet<String>,
    #[serde(default)]
    pub files: BTreeSet<String>,
}

impl ExclusionRules {
    pub fn new<D, F>(directories: D, files: F) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        Self {
            directories: directories.into_iter().map(Into::into).collect(),
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    pub fn excludes_directory(&self, name: &str) -> bool {
        self.directories.contains(name)
    }

    pub fn excludes_file(&self, name: &str) -> bool {
        self.files.contains(name)
    }

    /// Entries containing a separator; they can never match a segment.
    pub fn unmatchable(&self) -> impl Iterator<Item = &str> {
        self.directories
            .iter()
            .chain(self.files.iter())
            .map(String::as_str)
            .filter(|name| name.contains('/') || name.contains('\\'))
    }
}

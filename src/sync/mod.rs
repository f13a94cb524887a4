// ABOUTME: Mirrors the local source tree onto the remote host.
// ABOUTME: Prunes excluded directories before descending and re-uploads every surviving file.

mod exclude;
mod manifest;

pub use exclude::ExclusionRules;
pub use manifest::{EntryKind, FileManifest, ManifestEntry};

use crate::remote::{Remote, join_path};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Errors for synchronization. Every variant is fatal for the step.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("source directory not found: {0}")]
    MissingRoot(PathBuf),

    #[error("failed to walk source tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to upload {path}: {source}")]
    Upload {
        path: String,
        source: crate::ssh::Error,
    },
}

impl SyncError {
    /// The path the failure concerns, for operator messages.
    pub fn path(&self) -> String {
        match self {
            SyncError::MissingRoot(path)
            | SyncError::NonUtf8Path(path)
            | SyncError::Read { path, .. } => path.display().to_string(),
            SyncError::Walk(err) => err
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            SyncError::Upload { path, .. } => path.clone(),
        }
    }
}

/// A local entry that survived exclusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    /// Relative path with `/` separators.
    pub relative: String,
    /// Absolute local path.
    pub path: PathBuf,
    pub kind: EntryKind,
}

/// Uploads a source tree with exclusion rules applied.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    rules: ExclusionRules,
}

impl Synchronizer {
    pub fn new(rules: ExclusionRules) -> Self {
        for name in rules.unmatchable() {
            tracing::warn!(
                "Exclusion '{}' contains a path separator and will never match",
                name
            );
        }
        Self { rules }
    }

    pub fn rules(&self) -> &ExclusionRules {
        &self.rules
    }

    /// Walk the local tree depth-first, directories before their contents,
    /// siblings in name order.
    pub fn scan(&self, local_root: &Path) -> Result<Vec<LocalEntry>, SyncError> {
        if !local_root.is_dir() {
            return Err(SyncError::MissingRoot(local_root.to_path_buf()));
        }

        let mut entries = Vec::new();
        let walker = WalkDir::new(local_root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_pruned(entry));

        for entry in walker {
            let entry = entry?;
            if entry.depth() == 0 {
                continue;
            }

            let Some(kind) = self.classify(&entry) else {
                continue;
            };

            let relative = relative_path(local_root, entry.path())?;
            entries.push(LocalEntry {
                relative,
                path: entry.path().to_path_buf(),
                kind,
            });
        }

        Ok(entries)
    }

    /// Build the manifest a sync would produce, without touching the remote.
    pub fn plan(&self, local_root: &Path) -> Result<FileManifest, SyncError> {
        let mut manifest = FileManifest::new();
        for entry in self.scan(local_root)? {
            match entry.kind {
                EntryKind::Directory => manifest.push_directory(entry.relative),
                EntryKind::File => {
                    let size = std::fs::metadata(&entry.path)
                        .map_err(|source| SyncError::Read {
                            path: entry.path.clone(),
                            source,
                        })?
                        .len();
                    manifest.push_file(entry.relative, size);
                }
            }
        }
        Ok(manifest)
    }

    /// Upload the tree under `remote_root`, overwriting whatever is there.
    ///
    /// There is no change detection: every surviving file is transferred on
    /// every run. The first failed transfer aborts the whole sync.
    pub async fn sync<R: Remote + ?Sized>(
        &self,
        remote: &R,
        local_root: &Path,
        remote_root: &str,
    ) -> Result<FileManifest, SyncError> {
        let entries = self.scan(local_root)?;

        remote
            .ensure_directory(remote_root)
            .await
            .map_err(|source| SyncError::Upload {
                path: remote_root.to_string(),
                source,
            })?;

        let mut manifest = FileManifest::new();
        for entry in entries {
            let remote_path = join_path(remote_root, &entry.relative);
            match entry.kind {
                EntryKind::Directory => {
                    remote
                        .ensure_directory(&remote_path)
                        .await
                        .map_err(|source| SyncError::Upload {
                            path: remote_path.clone(),
                            source,
                        })?;
                    manifest.push_directory(entry.relative);
                }
                EntryKind::File => {
                    let contents =
                        tokio::fs::read(&entry.path)
                            .await
                            .map_err(|source| SyncError::Read {
                                path: entry.path.clone(),
                                source,
                            })?;
                    remote
                        .upload(&contents, &remote_path)
                        .await
                        .map_err(|source| SyncError::Upload {
                            path: remote_path.clone(),
                            source,
                        })?;
                    tracing::debug!("Uploaded {} ({} bytes)", remote_path, contents.len());
                    manifest.push_file(entry.relative, contents.len() as u64);
                }
            }
        }

        Ok(manifest)
    }

    fn is_pruned(&self, entry: &DirEntry) -> bool {
        let Some(name) = entry.file_name().to_str() else {
            return false;
        };
        if entry.file_type().is_dir() {
            self.rules.excludes_directory(name)
        } else {
            self.rules.excludes_file(name)
        }
    }

    fn classify(&self, entry: &DirEntry) -> Option<EntryKind> {
        let file_type = entry.file_type();
        if file_type.is_dir() {
            return Some(EntryKind::Directory);
        }
        if file_type.is_file() {
            return Some(EntryKind::File);
        }
        if file_type.is_symlink() {
            // Linked files are uploaded by content; linked directories are not followed
            return match std::fs::metadata(entry.path()) {
                Ok(meta) if meta.is_file() => Some(EntryKind::File),
                Ok(_) => {
                    tracing::warn!("Skipping symlinked directory {}", entry.path().display());
                    None
                }
                Err(e) => {
                    tracing::warn!("Skipping broken symlink {}: {}", entry.path().display(), e);
                    None
                }
            };
        }
        tracing::debug!("Skipping special file {}", entry.path().display());
        None
    }
}

fn relative_path(root: &Path, path: &Path) -> Result<String, SyncError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| SyncError::NonUtf8Path(path.to_path_buf()))?;
    let mut segments = Vec::new();
    for component in relative.components() {
        let segment = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| SyncError::NonUtf8Path(path.to_path_buf()))?;
        segments.push(segment);
    }
    Ok(segments.join("/"))
}

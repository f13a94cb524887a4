// ABOUTME: Ordered record of what a synchronization uploaded.
// ABOUTME: Directories precede their contents; paths are relative and '/'-separated.

use serde::Serialize;

/// Kind of manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// A single synchronized path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    /// Path relative to the source root, always using `/`.
    pub path: String,
    pub kind: EntryKind,
    /// Bytes transferred (0 for directories).
    pub size: u64,
}

/// Entries in traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileManifest {
    entries: Vec<ManifestEntry>,
}

impl FileManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_directory(&mut self, path: impl Into<String>) {
        self.entries.push(ManifestEntry {
            path: path.into(),
            kind: EntryKind::Directory,
            size: 0,
        });
    }

    pub fn push_file(&mut self, path: impl Into<String>, size: u64) {
        self.entries.push(ManifestEntry {
            path: path.into(),
            kind: EntryKind::File,
            size,
        });
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|e| e.path == path)
    }

    pub fn files(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::File)
    }

    pub fn directories(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::Directory)
    }

    /// Total bytes uploaded.
    pub fn total_bytes(&self) -> u64 {
        self.files().map(|e| e.size).sum()
    }

    /// Paths as an operator reads them: directories carry a trailing `/`.
    pub fn display_paths(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| match e.kind {
                EntryKind::Directory => format!("{}/", e.path),
                EntryKind::File => e.path.clone(),
            })
            .collect()
    }
}

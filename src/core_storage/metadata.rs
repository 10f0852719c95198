// Directory-tree cache written next to the storage root. Bookkeeping only,
// nothing in the protocol reads it back.

use crate::core_storage::error::StorageError;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub size: u64,
    /// Unix timestamp, seconds.
    pub last_modified: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, FileMetadata>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub root: FileMetadata,
}

#[derive(Debug)]
pub struct MetadataIndex {
    root: PathBuf,
    index_path: PathBuf,
}

impl MetadataIndex {
    pub fn new(root: impl Into<PathBuf>, index_path: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index_path: index_path.into(),
        }
    }

    /// Rescans the storage root and rewrites the index file.
    pub fn refresh(&self) -> Result<MetadataDocument, StorageError> {
        let root = describe(&self.root)?;
        let document = MetadataDocument { root };

        if let Some(parent) = self.index_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| StorageError::IndexError(format!("{}: {}", parent.display(), e)))?;
        }
        let content = serde_json::to_string_pretty(&document)
            .map_err(|e| StorageError::IndexError(e.to_string()))?;
        fs::write(&self.index_path, content).map_err(|e| {
            StorageError::IndexError(format!("{}: {}", self.index_path.display(), e))
        })?;

        debug!(
            "Metadata index written to {} ({} top-level entries)",
            self.index_path.display(),
            document.root.children.len()
        );
        Ok(document)
    }

    #[cfg(test)]
    pub fn load(&self) -> Result<MetadataDocument, StorageError> {
        let content = fs::read_to_string(&self.index_path).map_err(|e| {
            StorageError::IndexError(format!("{}: {}", self.index_path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| StorageError::IndexError(e.to_string()))
    }
}

fn describe(path: &Path) -> Result<FileMetadata, StorageError> {
    let meta = fs::metadata(path)
        .map_err(|e| StorageError::IndexError(format!("{}: {}", path.display(), e)))?;
    let last_modified = meta
        .modified()
        .map(|t| DateTime::<Utc>::from(t).timestamp())
        .unwrap_or(0);

    if !meta.is_dir() {
        return Ok(FileMetadata {
            kind: EntryKind::File,
            size: meta.len(),
            last_modified,
            children: BTreeMap::new(),
        });
    }

    let mut children = BTreeMap::new();
    let entries = fs::read_dir(path)
        .map_err(|e| StorageError::IndexError(format!("{}: {}", path.display(), e)))?;
    for entry in entries {
        let entry = entry.map_err(|e| StorageError::IndexError(e.to_string()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        children.insert(name, describe(&entry.path())?);
    }

    Ok(FileMetadata {
        kind: EntryKind::Directory,
        size: meta.len(),
        last_modified,
        children,
    })
}

/// Creates the storage root when missing and writes a fresh index.
pub fn initialize_storage(index: &MetadataIndex) -> Result<(), StorageError> {
    if !index.root.exists() {
        fs::create_dir_all(&index.root)
            .map_err(|e| StorageError::WriteError(format!("{}: {}", index.root.display(), e)))?;
    }
    index.refresh()?;
    info!("File system metadata initialized successfully.");
    Ok(())
}

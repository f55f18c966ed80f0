//! On-disk manifest directory
//!
//! Writes go through two steps. [`ManifestStore::stage`] writes every file of a
//! manifest into temporary files inside the manifest directory, then
//! [`ManifestStore::commit`] renames them over their targets. A failure while
//! staging leaves the existing manifests untouched.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::ManifestError;
use crate::manifest::{ManifestDocument, ManifestKind, PriorManifest};

/// Suffix of the backup written when a corrupt manifest is replaced.
pub const CORRUPT_SUFFIX: &str = "corrupt";

#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
}

/// Files for one manifest, written but not yet in place.
#[derive(Debug)]
pub struct StagedManifest {
    pub kind: ManifestKind,
    files: Vec<(NamedTempFile, PathBuf)>,
}

impl StagedManifest {
    /// Final paths the staged files will be renamed to.
    pub fn targets(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|(_, target)| target.as_path())
    }
}

impl ManifestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ManifestStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, kind: ManifestKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    pub fn markdown_path_for(&self, kind: ManifestKind) -> Option<PathBuf> {
        kind.markdown_view().map(|name| self.dir.join(name))
    }

    pub fn corrupt_backup_path(&self, kind: ManifestKind) -> PathBuf {
        self.dir
            .join(format!("{}.{}", kind.file_name(), CORRUPT_SUFFIX))
    }

    /// Read the current document for `kind`. Unreadable files are reported, never raised.
    pub fn load(&self, kind: ManifestKind) -> PriorManifest {
        let path = self.path_for(kind);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return PriorManifest::Missing,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                return PriorManifest::Corrupt {
                    reason: e.to_string(),
                    raw: Vec::new(),
                };
            }
        };

        let parsed = std::str::from_utf8(&bytes)
            .map_err(|e| e.to_string())
            .and_then(|text| ManifestDocument::parse(text).map_err(|e| e.to_string()));
        match parsed {
            Ok(document) => {
                tracing::debug!(
                    "Loaded {} (version {})",
                    path.display(),
                    document.metadata.version
                );
                PriorManifest::Loaded(document)
            }
            Err(reason) => {
                tracing::warn!("Manifest {} is unreadable: {}", path.display(), reason);
                PriorManifest::Corrupt { reason, raw: bytes }
            }
        }
    }

    /// Create the manifest directory if it does not exist.
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        if !self.dir.is_dir() {
            std::fs::create_dir_all(&self.dir)?;
            tracing::debug!("Created manifest directory {}", self.dir.display());
        }
        Ok(())
    }

    /// Write the document, its Markdown view and an optional backup of a corrupt
    /// predecessor into temporary files next to their targets.
    pub fn stage(
        &self,
        kind: ManifestKind,
        document: &ManifestDocument,
        markdown: Option<&str>,
        corrupt_backup: Option<&[u8]>,
    ) -> Result<StagedManifest, ManifestError> {
        let mut files = Vec::with_capacity(3);

        if let Some(raw) = corrupt_backup {
            files.push((self.write_temp(raw)?, self.corrupt_backup_path(kind)));
        }

        let json = document.to_json_pretty()?;
        files.push((self.write_temp(json.as_bytes())?, self.path_for(kind)));

        if let (Some(text), Some(target)) = (markdown, self.markdown_path_for(kind)) {
            files.push((self.write_temp(text.as_bytes())?, target));
        }

        Ok(StagedManifest { kind, files })
    }

    /// Move staged files into place. Returns the paths written.
    pub fn commit(&self, staged: Vec<StagedManifest>) -> Result<Vec<PathBuf>, ManifestError> {
        let mut written = Vec::new();
        for manifest in staged {
            for (temp, target) in manifest.files {
                temp.persist(&target).map_err(|e| e.error)?;
                tracing::debug!("Wrote {}", target.display());
                written.push(target);
            }
        }
        Ok(written)
    }

    fn write_temp(&self, bytes: &[u8]) -> Result<NamedTempFile, ManifestError> {
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        temp.write_all(bytes)?;
        temp.flush()?;
        Ok(temp)
    }
}

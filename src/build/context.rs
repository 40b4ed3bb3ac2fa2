// ABOUTME: Packs a build context directory into a tar archive held in a temporary file.
// ABOUTME: The archive file is removed when the ContextArchive is dropped.

use std::fs;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use tempfile::NamedTempFile;

use super::error::ContextError;

/// A build context archive backed by a temporary file.
#[derive(Debug)]
pub struct ContextArchive {
    file: NamedTempFile,
}

impl ContextArchive {
    /// Archive every entry under `dir` with paths relative to it. Symlinks
    /// are stored as links.
    pub fn pack(dir: &Path) -> Result<Self, ContextError> {
        let io_err = |source| ContextError::Io {
            path: dir.to_path_buf(),
            source,
        };

        if !dir.is_dir() {
            return Err(ContextError::NotADirectory(dir.to_path_buf()));
        }
        tracing::debug!(context_dir = %dir.display(), "preparing build context");

        let file = tempfile::Builder::new()
            .prefix("imagewright-context-")
            .suffix(".tar")
            .tempfile()
            .map_err(io_err)?;

        let mut builder = tar::Builder::new(file.reopen().map_err(io_err)?);
        builder.follow_symlinks(false);
        builder.append_dir_all("", dir).map_err(io_err)?;
        builder.finish().map_err(io_err)?;

        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// A fresh handle on the archive, positioned at its start.
    pub fn reader(&self) -> Result<fs::File, ContextError> {
        let io_err = |source| ContextError::Io {
            path: self.file.path().to_path_buf(),
            source,
        };
        let mut file = self.file.reopen().map_err(io_err)?;
        file.seek(SeekFrom::Start(0)).map_err(io_err)?;
        Ok(file)
    }
}

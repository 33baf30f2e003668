//! Destinations for encoded results: a directory or a zip archive.

use std::collections::HashSet;
use std::fs::File;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;

/// Default file name for a packed batch of results.
pub const DEFAULT_ARCHIVE_NAME: &str = "gemini_cleaned_images.zip";

/// Receives named, already-encoded results.
pub trait ResultSink {
    /// Store `bytes` under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the result could not be written.
    fn accept(&mut self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Flush anything buffered. Called once after the last result.
    ///
    /// # Errors
    ///
    /// Returns an error if finalizing the destination fails.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes each result as a file in a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Create the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(Self { dir })
    }

    /// The target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ResultSink for DirectorySink {
    fn accept(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        std::fs::write(self.dir.join(name), bytes)?;
        Ok(())
    }
}

/// Packs results into a zip archive.
///
/// Entries are stored uncompressed since encoded images are already compressed.
/// Repeated names get a numeric suffix instead of clobbering earlier entries.
pub struct ZipSink<W: Write + Seek> {
    state: ArchiveState<W>,
    names: HashSet<String>,
}

enum ArchiveState<W: Write + Seek> {
    Open(ZipWriter<W>),
    Finished(W),
}

impl ZipSink<File> {
    /// Create (or truncate) an archive file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write + Seek> ZipSink<W> {
    /// Wrap any seekable writer.
    pub fn new(inner: W) -> Self {
        Self {
            state: ArchiveState::Open(ZipWriter::new(inner)),
            names: HashSet::new(),
        }
    }

    /// Number of entries written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no entries have been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether the central directory has been written.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.state, ArchiveState::Finished(_))
    }

    /// Return the underlying writer, finalizing the archive first if
    /// [`ResultSink::finish`] has not run yet.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Archive`] if the central directory cannot be written.
    pub fn into_inner(self) -> Result<W> {
        match self.state {
            ArchiveState::Open(mut writer) => Ok(writer.finish()?),
            ArchiveState::Finished(inner) => Ok(inner),
        }
    }

    /// First free name for `name`, without reserving it.
    fn unique_name(&self, name: &str) -> String {
        if !self.names.contains(name) {
            return name.to_string();
        }
        let (stem, ext) = match name.rsplit_once('.') {
            Some((stem, ext)) => (stem, format!(".{ext}")),
            None => (name, String::new()),
        };
        (1..)
            .map(|n| format!("{stem}_{n}{ext}"))
            .find(|candidate| !self.names.contains(candidate))
            .unwrap_or_default()
    }
}

impl<W: Write + Seek> ResultSink for ZipSink<W> {
    fn accept(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let name = self.unique_name(name);
        let ArchiveState::Open(writer) = &mut self.state else {
            return Err(std::io::Error::other("archive already finished").into());
        };
        let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
        writer.start_file(name.as_str(), stored)?;
        writer.write_all(bytes)?;
        self.names.insert(name);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let ArchiveState::Open(writer) = &mut self.state {
            let inner = writer.finish()?;
            self.state = ArchiveState::Finished(inner);
        }
        Ok(())
    }
}

//! Archive container for grouped backups
//!
//! A grouped object is a zip container with every entry stored uncompressed;
//! compression is applied to the finished container by the stream codec.
//! Entry names are relative to the backup root, so unpacking any number of
//! archives into one destination rebuilds the original tree.

use coldsync_types::{Error, Result};
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Summary of an archive build or extraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Number of file entries
    pub entries: u64,
    /// Total uncompressed bytes across entries
    pub bytes: u64,
}

/// In-memory archive writer
pub struct ArchiveWriter {
    inner: ZipWriter<Cursor<Vec<u8>>>,
    summary: ArchiveSummary,
}

impl ArchiveWriter {
    /// Create an empty archive
    pub fn new() -> Self {
        Self {
            inner: ZipWriter::new(Cursor::new(Vec::new())),
            summary: ArchiveSummary::default(),
        }
    }

    fn options(size: u64) -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .large_file(size >= u64::from(u32::MAX))
    }

    /// Append an entry named `name` with the contents of `reader`
    pub fn append_entry<R: Read>(&mut self, name: &str, size_hint: u64, mut reader: R) -> Result<u64> {
        self.inner
            .start_file(name, Self::options(size_hint))
            .map_err(|e| Error::archive(format!("Failed to start entry '{}': {}", name, e)))?;

        let written = io::copy(&mut reader, &mut self.inner)
            .map_err(|e| Error::archive(format!("Failed to write entry '{}': {}", name, e)))?;

        self.summary.entries += 1;
        self.summary.bytes += written;
        Ok(written)
    }

    /// Append the file at `path` under the entry name `name`
    pub fn append_file(&mut self, name: &str, path: &Path) -> Result<u64> {
        let file = File::open(path).map_err(|e| Error::Io {
            message: format!("Failed to open '{}': {}", path.display(), e),
        })?;
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);
        self.append_entry(name, size, file)
    }

    /// Append every regular file under `subtree`, naming entries relative to `root`
    pub fn append_tree(&mut self, root: &Path, subtree: &Path) -> Result<u64> {
        let mut appended = 0u64;

        for entry in WalkDir::new(subtree).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Io {
                message: format!("Failed to walk '{}': {}", subtree.display(), e),
            })?;

            if !entry.file_type().is_file() {
                if entry.file_type().is_symlink() {
                    warn!("Skipping symlink: {}", entry.path().display());
                }
                continue;
            }

            let name = entry_name(root, entry.path())?;
            self.append_file(&name, entry.path())?;
            appended += 1;
        }

        Ok(appended)
    }

    /// Summary of what has been appended so far
    pub fn summary(&self) -> ArchiveSummary {
        self.summary
    }

    /// Finish the archive and return its bytes
    pub fn finish(self) -> Result<(Vec<u8>, ArchiveSummary)> {
        let cursor = self
            .inner
            .finish()
            .map_err(|e| Error::archive(format!("Failed to finish archive: {}", e)))?;
        Ok((cursor.into_inner(), self.summary))
    }
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Slash-separated entry name of `path` relative to `root`
fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        Error::archive(format!(
            "'{}' is not under '{}'",
            path.display(),
            root.display()
        ))
    })?;

    let mut segments = Vec::new();
    for component in relative.components() {
        let segment = component.as_os_str().to_str().ok_or_else(|| {
            Error::archive(format!("Non UTF-8 path: {}", path.display()))
        })?;
        segments.push(segment);
    }
    Ok(segments.join("/"))
}

/// Unpack every entry of `data` into `destination`.
///
/// Entries whose names would land outside `destination` are rejected.
pub fn extract_archive(data: Vec<u8>, destination: &Path) -> Result<ArchiveSummary> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| Error::archive(format!("Invalid archive: {}", e)))?;
    let mut summary = ArchiveSummary::default();

    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|e| Error::archive(format!("Failed to read entry {}: {}", index, e)))?;

        let Some(relative) = file.enclosed_name() else {
            return Err(Error::archive(format!(
                "Entry '{}' escapes the destination",
                file.name()
            )));
        };
        let target = destination.join(relative);

        if file.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = File::create(&target).map_err(|e| Error::Io {
            message: format!("Failed to create '{}': {}", target.display(), e),
        })?;
        let written = io::copy(&mut file, &mut out)
            .map_err(|e| Error::archive(format!("Failed to extract '{}': {}", file.name(), e)))?;

        summary.entries += 1;
        summary.bytes += written;
    }

    debug!(
        "Extracted {} entries ({} bytes) into {}",
        summary.entries,
        summary.bytes,
        destination.display()
    );
    Ok(summary)
}

//! Zip container reader and atomic writer.
//!
//! A container holds one or more named text entries. Writing loads every
//! existing entry into memory, replaces or adds the target entry, and writes
//! the complete archive to a temporary file next to the container before a
//! single rename puts it in place. Readers therefore see either the old or
//! the new container, never a partial one, and a failed write leaves the
//! original untouched.
//!
//! Writes to one container are read-merge-rewrite and must be serialized by
//! the caller (see [`super::locks::ContainerLocks`] for in-process use).

use std::collections::BTreeMap;
use std::fs::{File, Permissions};
use std::io::{self, BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::paths::{TEMP_SUFFIX, temp_prefix_for};
use crate::error::StoreError;
use crate::observability;

/// Deflate levels the zip writer accepts.
pub const DEFLATE_LEVELS: std::ops::RangeInclusive<i64> = 1..=9;

/// Entry key to lines, ordered by key.
pub type Entries = BTreeMap<String, Vec<String>>;

/// Compression applied to container entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Deflate (the default).
    #[default]
    Deflated,
    /// No compression.
    Stored,
}

impl Compression {
    const fn method(self) -> CompressionMethod {
        match self {
            Self::Deflated => CompressionMethod::Deflated,
            Self::Stored => CompressionMethod::Stored,
        }
    }
}

/// What a write did to the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// No lines: nothing touched.
    Skipped,
    /// The container did not exist and was created.
    Created,
    /// A new entry was added to an existing container.
    EntryAdded,
    /// An existing entry was overwritten.
    EntryReplaced,
}

impl WriteOutcome {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Created => "created",
            Self::EntryAdded => "entry_added",
            Self::EntryReplaced => "entry_replaced",
        }
    }
}

/// Reads and writes zip containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Archive {
    compression: Compression,
    level: Option<i64>,
}

impl Archive {
    /// Create an archive handler with explicit compression settings.
    #[must_use]
    pub const fn new(compression: Compression, level: Option<i64>) -> Self {
        Self { compression, level }
    }

    /// Read every entry of the container at `path`.
    ///
    /// # Errors
    ///
    /// - `ContainerNotFound` if nothing exists at `path`
    /// - `StorageIoFailure` if the path cannot be opened or is a directory
    /// - `CorruptContainer` if the archive or an entry cannot be decoded
    pub fn read_all(&self, path: &Path) -> Result<Entries, StoreError> {
        let result = read_entries(path);
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.code().reason(),
        };
        observability::record_container_read(outcome);
        result
    }

    /// Replace or add `entry` in the container at `path`.
    ///
    /// Empty `lines` are a no-op: no container is created and an existing one
    /// is left untouched.
    ///
    /// # Errors
    ///
    /// - `InvalidDescriptor` for an empty entry key or a line containing a newline
    /// - `StorageIoFailure` for filesystem failures (directories, permissions, ...)
    /// - `CorruptContainer` if the existing container cannot be decoded; the
    ///   file on disk is left as it was
    pub fn write(
        &self,
        path: &Path,
        entry: &str,
        lines: &[String],
    ) -> Result<WriteOutcome, StoreError> {
        let started = Instant::now();
        let result = self.write_inner(path, entry, lines);
        let outcome = match &result {
            Ok(o) => o.as_str(),
            Err(e) => e.code().reason(),
        };
        observability::record_container_write(outcome, lines.len(), started.elapsed());
        result
    }

    fn write_inner(
        &self,
        path: &Path,
        entry: &str,
        lines: &[String],
    ) -> Result<WriteOutcome, StoreError> {
        if lines.is_empty() {
            debug!(path = %path.display(), entry, "No lines to write, skipping");
            return Ok(WriteOutcome::Skipped);
        }
        validate_entry(entry, lines)?;

        if path.is_dir() {
            return Err(StoreError::io(
                path,
                io::Error::new(io::ErrorKind::IsADirectory, "container path is a directory"),
            ));
        }

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;

        let (mut entries, existed) = match read_entries(path) {
            Ok(entries) => (entries, true),
            Err(StoreError::ContainerNotFound { .. }) => (Entries::new(), false),
            Err(e) => return Err(e),
        };

        let replaced = entries
            .insert(entry.to_string(), lines.to_vec())
            .is_some();

        // The rewrite keeps the mode of the file it replaces.
        let existing_permissions = if existed {
            Some(
                std::fs::metadata(path)
                    .map_err(|e| StoreError::io(path, e))?
                    .permissions(),
            )
        } else {
            None
        };

        let prefix = temp_prefix_for(path);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(TEMP_SUFFIX);
        if let Some(permissions) = new_container_permissions() {
            builder.permissions(permissions);
        }
        let mut tmp = builder
            .tempfile_in(parent)
            .map_err(|e| StoreError::io(parent, e))?;
        if let Some(permissions) = existing_permissions {
            tmp.as_file()
                .set_permissions(permissions)
                .map_err(|e| StoreError::io(tmp.path(), e))?;
        }

        self.write_entries(tmp.as_file_mut(), &entries)
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StoreError::io(tmp.path(), e))?;

        // Dropping the temp file on error removes it.
        tmp.persist(path)
            .map_err(|e| StoreError::io(path, e.error))?;

        let outcome = match (existed, replaced) {
            (false, _) => WriteOutcome::Created,
            (true, false) => WriteOutcome::EntryAdded,
            (true, true) => WriteOutcome::EntryReplaced,
        };

        info!(
            path = %path.display(),
            entry,
            lines = lines.len(),
            entries = entries.len(),
            outcome = outcome.as_str(),
            "Container written"
        );

        Ok(outcome)
    }

    fn file_options(&self) -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(self.compression.method())
            .compression_level(self.level)
    }

    fn write_entries<W: Write + Seek>(&self, sink: W, entries: &Entries) -> io::Result<()> {
        let mut zip = ZipWriter::new(BufWriter::new(sink));
        for (name, lines) in entries {
            zip.start_file(name.as_str(), self.file_options())
                .map_err(zip_to_io)?;
            for line in lines {
                zip.write_all(line.as_bytes())?;
                zip.write_all(b"\n")?;
            }
        }
        let mut buffered = zip.finish().map_err(zip_to_io)?;
        buffered.flush()
    }
}

/// Read every entry of the container at `path` with default settings.
pub fn read_all(path: &Path) -> Result<Entries, StoreError> {
    Archive::default().read_all(path)
}

/// Write one entry into the container at `path` with default settings.
pub fn write(path: &Path, entry: &str, lines: &[String]) -> Result<WriteOutcome, StoreError> {
    Archive::default().write(path, entry, lines)
}

fn read_entries(path: &Path) -> Result<Entries, StoreError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StoreError::ContainerNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(StoreError::io(path, e)),
    };

    let metadata = file.metadata().map_err(|e| StoreError::io(path, e))?;
    if metadata.is_dir() {
        return Err(StoreError::io(
            path,
            io::Error::new(io::ErrorKind::IsADirectory, "container path is a directory"),
        ));
    }

    let mut archive = ZipArchive::new(BufReader::new(file))
        .map_err(|e| StoreError::corrupt(path, e.to_string()))?;

    let mut entries = Entries::new();
    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|e| StoreError::corrupt(path, e.to_string()))?;
        if file.is_dir() {
            continue;
        }

        let name = file.name().to_string();
        let mut text = String::new();
        file.read_to_string(&mut text)
            .map_err(|e| StoreError::corrupt(path, format!("entry '{name}': {e}")))?;

        entries.insert(name, text.lines().map(str::to_string).collect());
    }

    debug!(path = %path.display(), entries = entries.len(), "Container read");
    Ok(entries)
}

fn validate_entry(entry: &str, lines: &[String]) -> Result<(), StoreError> {
    if entry.is_empty() {
        return Err(StoreError::invalid("entry", "Entry key cannot be empty"));
    }
    if entry.contains(['/', '\\']) {
        return Err(StoreError::invalid(
            "entry",
            format!("Entry key '{entry}' must not contain path separators"),
        ));
    }
    if let Some(pos) = lines.iter().position(|l| l.contains(['\n', '\r'])) {
        return Err(StoreError::invalid(
            "lines",
            format!("line {} contains a line break", pos + 1),
        ));
    }
    Ok(())
}

/// Mode for new containers: what a plain `File::create` gets under the
/// process umask, instead of the private 0600 of a temp file.
#[cfg(unix)]
fn new_container_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o666))
}

#[cfg(not(unix))]
fn new_container_permissions() -> Option<Permissions> {
    None
}

fn zip_to_io(err: ZipError) -> io::Error {
    match err {
        ZipError::Io(e) => e,
        other => io::Error::other(other),
    }
}

use crate::codec::{write_hash, write_u64, MAX_STRING_LENGTH};
use crate::compression::{compress, DEFAULT_COMPRESSION_LEVEL, MAX_COMPRESSION_LEVEL};
use crate::config::PakConfig;
use crate::digest::{digest, Digest};
use crate::error::{PakError, Result};
use crate::intern::InternTable;
use crate::pak::entry::EntryHeader;
use crate::pak::format::{
    write_footer, PakHeader, CONTENT_HASH_FIELD_OFFSET, CONTENT_LEN_FIELD_OFFSET, CONTENT_OFFSET,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Normalize path to forward slashes (cross-platform compatibility)
fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Check a path or key before it is written as a pack string
fn check_entry_string(what: &str, text: &str) -> Result<()> {
    if text.contains('\0') {
        return Err(PakError::Config(format!(
            "entry {} {:?} contains a NUL byte",
            what, text
        )));
    }
    if text.len() as u64 > MAX_STRING_LENGTH {
        return Err(PakError::InvalidString(format!(
            "entry {} length {} exceeds limit {}",
            what,
            text.len(),
            MAX_STRING_LENGTH
        )));
    }
    Ok(())
}

/// Reject paths and keys a reader would not read back unchanged
pub(crate) fn validate_entry_names(path: &str, key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(PakError::Config("entry key must not be empty".to_string()));
    }
    check_entry_string("key", key)?;
    check_entry_string("path", path)
}

/// Write one entry record, returning the bytes it occupies
fn write_entry<W: Write>(mut writer: W, header: &EntryHeader, compressed: &[u8]) -> Result<u64> {
    let header_bytes = header.write_to(&mut writer)?;
    writer.write_all(compressed)?;
    Ok(header_bytes as u64 + compressed.len() as u64)
}

/// Tunables for pack creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// zlib level, 0..=9
    pub compression_level: u32,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

/// A file on disk to embed under `key`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PakSource {
    pub path: PathBuf,
    pub key: String,
}

impl PakSource {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }
}

/// Outcome of a finished pack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PakSummary {
    pub path: PathBuf,
    pub entry_count: usize,
    pub content_len: u64,
    pub content_hash: Digest,
}

/// Pack writer
///
/// Output goes to a temporary file beside the destination and is renamed
/// into place by [`PakWriter::finalize`]. Dropping an unfinished writer
/// removes the temporary file, so a partial pack is never visible.
///
/// A failed write leaves the output in an unknown state; after one, every
/// further `add_*` and [`PakWriter::finalize`] returns `WriterPoisoned`.
pub struct PakWriter {
    writer: BufWriter<NamedTempFile>,
    destination: PathBuf,
    options: WriterOptions,
    content_len: u64,
    keys: InternTable,
    poisoned: bool,
}

impl PakWriter {
    /// Start a new pack that will be written to `path`
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let destination = path.as_ref().to_path_buf();
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if destination.file_name().is_none() {
            return Err(PakError::PathError(format!(
                "Not a file path: {}",
                destination.display()
            )));
        }

        // Temp files default to owner-only; packs get the usual 0o666 & !umask
        let mut builder = tempfile::Builder::new();
        builder.prefix(".spooky-pak-");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(fs::Permissions::from_mode(0o666));
        }
        let file = builder.tempfile_in(&dir)?;
        let mut writer = BufWriter::new(file);

        // Placeholder header (length and hash backpatched at finalization)
        PakHeader::new().write_to(&mut writer)?;
        writer.seek(SeekFrom::Start(CONTENT_OFFSET))?;

        Ok(Self {
            writer,
            destination,
            options: WriterOptions::default(),
            content_len: 0,
            keys: InternTable::new(),
            poisoned: false,
        })
    }

    pub fn with_options(mut self, options: WriterOptions) -> Result<Self> {
        if options.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(PakError::Config(format!(
                "compression_level {} out of range 0..={}",
                options.compression_level, MAX_COMPRESSION_LEVEL
            )));
        }
        self.options = options;
        Ok(self)
    }

    /// Number of entries added so far
    pub fn entry_count(&self) -> usize {
        self.keys.len()
    }

    /// Bytes of entry content written so far
    pub fn content_len(&self) -> u64 {
        self.content_len
    }

    /// Embed `data`, recording `path` and `key` in the entry
    pub fn add_bytes(&mut self, path: &str, key: &str, data: &[u8]) -> Result<()> {
        if self.poisoned {
            return Err(PakError::WriterPoisoned);
        }
        let path = normalize_path(path);
        validate_entry_names(&path, key)?;
        if self.keys.lookup(key).is_some() {
            return Err(PakError::DuplicateKey(key.to_string()));
        }

        let compressed = compress(data, self.options.compression_level)?;
        let header = EntryHeader {
            path,
            key: key.to_string(),
            decompressed_len: data.len() as u64,
            compressed_len: compressed.len() as u64,
            decompressed_hash: digest(data),
            compressed_hash: digest(&compressed),
        };

        let written = match write_entry(&mut self.writer, &header, &compressed) {
            Ok(written) => written,
            Err(err) => {
                warn!(key, error = %err, "Entry write failed, writer poisoned");
                self.poisoned = true;
                return Err(err);
            }
        };
        self.content_len += written;
        self.keys.ensure(key);

        debug!(
            key,
            path = %header.path,
            decompressed = header.decompressed_len,
            compressed = header.compressed_len,
            "Added entry"
        );

        Ok(())
    }

    /// Embed a file from disk; the stored path is `disk_path` as given
    pub fn add_file_from_disk(&mut self, disk_path: &Path, key: &str) -> Result<()> {
        let data = fs::read(disk_path)?;
        self.add_bytes(&disk_path.to_string_lossy(), key, &data)
    }

    /// Embed a file read from `disk_path` but stored under `stored_path`
    pub fn add_file_as(&mut self, disk_path: &Path, stored_path: &str, key: &str) -> Result<()> {
        let data = fs::read(disk_path)?;
        self.add_bytes(stored_path, key, &data)
    }

    pub fn add_source(&mut self, source: &PakSource) -> Result<()> {
        self.add_file_from_disk(&source.path, &source.key)
    }

    /// Backpatch length and content hash, append the footer and move the pack into place
    pub fn finalize(self) -> Result<PakSummary> {
        let Self {
            writer,
            destination,
            content_len,
            keys,
            poisoned,
            ..
        } = self;
        if poisoned {
            return Err(PakError::WriterPoisoned);
        }

        let mut file = writer.into_inner().map_err(|e| e.into_error())?;

        file.seek(SeekFrom::Start(CONTENT_LEN_FIELD_OFFSET))?;
        write_u64(&mut file, content_len)?;

        // Hash what actually landed on disk
        file.seek(SeekFrom::Start(CONTENT_OFFSET))?;
        let content_hash = Digest::of_reader(&mut file, content_len)?;

        file.seek(SeekFrom::Start(CONTENT_HASH_FIELD_OFFSET))?;
        write_hash(&mut file, &content_hash)?;

        file.seek(SeekFrom::End(0))?;
        write_footer(&mut file)?;
        file.flush()?;

        // A replaced pack keeps its mode
        if let Ok(existing) = fs::metadata(&destination) {
            file.as_file().set_permissions(existing.permissions())?;
        }
        file.as_file().sync_all()?;

        file.persist(&destination).map_err(|e| PakError::Io(e.error))?;

        info!(
            path = %destination.display(),
            entries = keys.len(),
            content_len,
            content_hash = %content_hash,
            "Pack finalized"
        );

        Ok(PakSummary {
            path: destination,
            entry_count: keys.len(),
            content_len,
            content_hash,
        })
    }

    /// Build a pack from an ordered list of sources in one step
    pub fn create_pak<P: AsRef<Path>>(
        output: P,
        sources: &[PakSource],
        options: WriterOptions,
    ) -> Result<PakSummary> {
        let mut writer = Self::create(output)?.with_options(options)?;
        for source in sources {
            writer.add_source(source)?;
        }
        writer.finalize()
    }

    /// Build the pack described by a configuration
    ///
    /// Entry paths are read relative to the configuration's base directory
    /// and stored as written in the configuration.
    pub fn from_config(config: &PakConfig) -> Result<PakSummary> {
        config.validate()?;
        let mut writer = Self::create(config.resolve(&config.output))?
            .with_options(config.writer_options())?;
        for entry in &config.entries {
            writer.add_file_as(
                &config.resolve(&entry.path),
                &entry.path.to_string_lossy(),
                &entry.key,
            )?;
        }
        writer.finalize()
    }
}

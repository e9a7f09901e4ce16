use crate::digest::Digest;
use crate::error::{PakError, Result};
use crate::intern::{AtomId, InternTable};
use crate::pak::entry::{read_entry_within, EntryInfo, PakEntry};
use crate::pak::format::{read_footer, PakHeader, Version, FOOTER_SIZE};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, info, warn};

/// Validation stage of a pack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Header,
    Version,
    ContentHash,
    Entries,
    Footer,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Header => "header",
            Stage::Version => "version",
            Stage::ContentHash => "content-hash",
            Stage::Entries => "entry",
            Stage::Footer => "footer",
        };
        f.write_str(name)
    }
}

/// Progress of a reader through pack validation
///
/// Format violations are not transient: once `Failed`, a reader stays failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Start,
    HeaderValidated,
    VersionValidated,
    ContentHashValidated,
    EntriesConsumed,
    FooterValidated,
    Done,
    Failed(Stage),
}

impl ReaderState {
    /// Stage that must pass to leave this state
    fn pending_stage(self) -> Option<Stage> {
        match self {
            ReaderState::Start => Some(Stage::Header),
            ReaderState::HeaderValidated => Some(Stage::Version),
            ReaderState::VersionValidated => Some(Stage::ContentHash),
            ReaderState::ContentHashValidated => Some(Stage::Entries),
            ReaderState::EntriesConsumed => Some(Stage::Footer),
            ReaderState::FooterValidated | ReaderState::Done | ReaderState::Failed(_) => None,
        }
    }
}

/// Result of a full verification pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedPak {
    pub version: Version,
    pub content_len: u64,
    pub content_hash: Digest,
    pub entries: Vec<EntryInfo>,
}

/// Pack reader with key lookup
pub struct PakReader<R = BufReader<File>> {
    reader: R,
    state: ReaderState,
    header: Option<PakHeader>,
    entries: Vec<EntryInfo>,
    keys: InternTable,
    index: HashMap<AtomId, usize>,
}

impl PakReader<BufReader<File>> {
    /// Open a pack file, validating its header and version
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = Self::new(BufReader::new(file));
        reader.run(|r| r.read_header())?;
        reader.run(|r| r.check_version())?;
        Ok(reader)
    }
}

impl<R: Read + Seek> PakReader<R> {
    /// Wrap a stream without reading anything yet
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            state: ReaderState::Start,
            header: None,
            entries: Vec::new(),
            keys: InternTable::new(),
            index: HashMap::new(),
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Header, once it has been read
    pub fn header(&self) -> Option<&PakHeader> {
        self.header.as_ref()
    }

    /// Entries found by [`PakReader::verify`]
    pub fn entries(&self) -> &[EntryInfo] {
        &self.entries
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    pub fn get_entry(&self, key: &str) -> Option<&EntryInfo> {
        self.lookup(key).map(|i| &self.entries[i])
    }

    fn lookup(&self, key: &str) -> Option<usize> {
        let atom = self.keys.lookup(key)?;
        self.index.get(&atom).copied()
    }

    /// Run every remaining validation stage
    ///
    /// Checks header magic, version, content offset, the content digest, every
    /// entry's digests and decompressed length, and the footer.
    pub fn verify(&mut self) -> Result<VerifiedPak> {
        loop {
            match self.state {
                ReaderState::Start => self.run(|r| r.read_header())?,
                ReaderState::HeaderValidated => self.run(|r| r.check_version())?,
                ReaderState::VersionValidated => self.run(|r| r.check_content_hash())?,
                ReaderState::ContentHashValidated => self.run(|r| r.consume_entries())?,
                ReaderState::EntriesConsumed => self.run(|r| r.check_footer())?,
                ReaderState::FooterValidated => self.state = ReaderState::Done,
                ReaderState::Done => break,
                ReaderState::Failed(stage) => return Err(PakError::ReaderFailed { stage }),
            }
        }

        let header = self.require_header()?;
        info!(
            version = %header.version,
            entries = self.entries.len(),
            content_len = header.content_len,
            "Pack verified"
        );

        Ok(VerifiedPak {
            version: header.version,
            content_len: header.content_len,
            content_hash: header.content_hash,
            entries: self.entries.clone(),
        })
    }

    /// Extract the entry stored under `key`, verifying the pack first if needed
    pub fn read_file(&mut self, key: &str) -> Result<Vec<u8>> {
        Ok(self.read_entry(key)?.data)
    }

    /// Extract the entry stored under `key` along with its header
    pub fn read_entry(&mut self, key: &str) -> Result<PakEntry> {
        self.ensure_verified()?;
        let index = self
            .lookup(key)
            .ok_or_else(|| PakError::EntryNotFound(key.to_string()))?;
        let info = self.entries[index].clone();
        self.read_at(&info)
    }

    /// Extract every entry in pack order
    pub fn read_all(&mut self) -> Result<Vec<PakEntry>> {
        self.ensure_verified()?;
        let infos = self.entries.clone();
        infos.iter().map(|info| self.read_at(info)).collect()
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn ensure_verified(&mut self) -> Result<()> {
        if self.state != ReaderState::Done {
            self.verify()?;
        }
        Ok(())
    }

    fn read_at(&mut self, info: &EntryInfo) -> Result<PakEntry> {
        self.reader.seek(SeekFrom::Start(info.offset))?;
        read_entry_within(&mut self.reader, info.header.entry_size())
    }

    /// Run one stage, advancing on success and recording the failed stage otherwise
    fn run<F>(&mut self, stage_fn: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<ReaderState>,
    {
        let Some(stage) = self.state.pending_stage() else {
            return Ok(());
        };

        match stage_fn(self) {
            Ok(next) => {
                debug!(%stage, ?next, "Stage passed");
                self.state = next;
                Ok(())
            }
            Err(err) => {
                warn!(%stage, error = %err, "Pack validation failed");
                self.state = ReaderState::Failed(stage);
                Err(err)
            }
        }
    }

    fn require_header(&self) -> Result<&PakHeader> {
        self.header
            .as_ref()
            .ok_or(PakError::ReaderFailed { stage: Stage::Header })
    }

    fn read_header(&mut self) -> Result<ReaderState> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.header = Some(PakHeader::read_from(&mut self.reader)?);
        Ok(ReaderState::HeaderValidated)
    }

    fn check_version(&mut self) -> Result<ReaderState> {
        self.require_header()?.validate_version()?;
        Ok(ReaderState::VersionValidated)
    }

    fn check_content_hash(&mut self) -> Result<ReaderState> {
        let header = self.require_header()?.clone();
        header.validate_content_offset()?;

        // A file too short for its declared content has lost its footer
        let file_len = self.reader.seek(SeekFrom::End(0))?;
        let expected_len = header.expected_file_len().unwrap_or(u64::MAX);
        if file_len < expected_len {
            return Err(PakError::InvalidFooter {
                found: self.tail(file_len)?,
            });
        }

        self.reader.seek(SeekFrom::Start(header.content_offset))?;
        let actual = Digest::of_reader(&mut self.reader, header.content_len)?;
        if actual != header.content_hash {
            return Err(PakError::ContentHashMismatch {
                expected: header.content_hash,
                actual,
            });
        }

        Ok(ReaderState::ContentHashValidated)
    }

    fn consume_entries(&mut self) -> Result<ReaderState> {
        let header = self.require_header()?.clone();
        let end = header.content_offset + header.content_len;

        self.entries.clear();
        self.index.clear();
        self.keys = InternTable::new();

        let mut offset = self.reader.seek(SeekFrom::Start(header.content_offset))?;
        while offset < end {
            let entry = read_entry_within(&mut self.reader, end - offset)?;

            let atom = self.keys.ensure(&entry.header.key);
            if self.index.contains_key(&atom) {
                warn!(key = %entry.header.key, "Duplicate key, keeping first entry");
            } else {
                self.index.insert(atom, self.entries.len());
            }

            let next = offset + entry.header.entry_size();
            self.entries.push(EntryInfo {
                offset,
                header: entry.header,
            });
            offset = next;
        }

        Ok(ReaderState::EntriesConsumed)
    }

    fn check_footer(&mut self) -> Result<ReaderState> {
        let header = self.require_header()?.clone();
        let footer_start = header.content_offset + header.content_len;

        self.reader.seek(SeekFrom::Start(footer_start))?;
        read_footer(&mut self.reader)?;

        // The footer must close the file
        let file_len = self.reader.seek(SeekFrom::End(0))?;
        if file_len != footer_start + FOOTER_SIZE {
            return Err(PakError::InvalidFooter {
                found: self.tail(file_len)?,
            });
        }

        Ok(ReaderState::FooterValidated)
    }

    /// Last footer-sized chunk of the stream, for diagnostics
    fn tail(&mut self, file_len: u64) -> Result<Vec<u8>> {
        let start = file_len.saturating_sub(FOOTER_SIZE);
        self.reader.seek(SeekFrom::Start(start))?;
        let mut tail = Vec::new();
        (&mut self.reader).take(FOOTER_SIZE).read_to_end(&mut tail)?;
        Ok(tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pak::PakWriter;
    use std::io::Cursor;

    fn build_pak(entries: &[(&str, &str, &[u8])]) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.pak");
        let mut writer = PakWriter::create(&path).unwrap();
        for (p, k, data) in entries {
            writer.add_bytes(p, k, data).unwrap();
        }
        writer.finalize().unwrap();
        std::fs::read(&path).unwrap()
    }

    #[test]
    fn test_state_progression() {
        let bytes = build_pak(&[("a.ttf", "a", &b"alpha"[..]), ("b.ttf", "b", &b"beta"[..])]);
        let mut reader = PakReader::new(Cursor::new(bytes));
        assert_eq!(reader.state(), ReaderState::Start);

        let verified = reader.verify().unwrap();
        assert_eq!(reader.state(), ReaderState::Done);
        assert_eq!(verified.entries.len(), 2);
        assert_eq!(verified.entries[0].key(), "a");
        assert_eq!(verified.entries[1].path(), "b.ttf");
        assert_eq!(verified.entries[0].offset, crate::pak::CONTENT_OFFSET);
    }

    #[test]
    fn test_read_by_key() {
        let bytes = build_pak(&[("a.ttf", "a", &b"alpha"[..]), ("b.ttf", "b", &b"beta"[..])]);
        let mut reader = PakReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_file("b").unwrap(), &b"beta"[..]);
        assert_eq!(reader.read_file("a").unwrap(), &b"alpha"[..]);
        assert!(reader.contains("a"));
        assert!(matches!(
            reader.read_file("c"),
            Err(PakError::EntryNotFound(_))
        ));
    }

    #[test]
    fn test_failed_state_is_terminal() {
        let mut bytes = build_pak(&[("a", "a", &b"alpha"[..])]);
        bytes[0] = 0;
        let mut reader = PakReader::new(Cursor::new(bytes));

        assert!(matches!(
            reader.verify(),
            Err(PakError::InvalidHeader { .. })
        ));
        assert_eq!(reader.state(), ReaderState::Failed(Stage::Header));
        assert!(matches!(
            reader.verify(),
            Err(PakError::ReaderFailed {
                stage: Stage::Header
            })
        ));
    }

    #[test]
    fn test_content_hash_stage() {
        let mut bytes = build_pak(&[("a", "a", &b"alpha"[..])]);
        let at = crate::pak::CONTENT_OFFSET as usize + 3;
        bytes[at] ^= 0x01;
        let mut reader = PakReader::new(Cursor::new(bytes));
        assert!(matches!(
            reader.verify(),
            Err(PakError::ContentHashMismatch { .. })
        ));
        assert_eq!(reader.state(), ReaderState::Failed(Stage::ContentHash));
    }

    #[test]
    fn test_trailing_bytes_after_footer() {
        let mut bytes = build_pak(&[("a", "a", &b"alpha"[..])]);
        bytes.extend_from_slice(b"junk");
        let mut reader = PakReader::new(Cursor::new(bytes));
        assert!(matches!(
            reader.verify(),
            Err(PakError::InvalidFooter { .. })
        ));
        assert_eq!(reader.state(), ReaderState::Failed(Stage::Footer));
    }

    #[test]
    fn test_empty_pack_verifies() {
        let bytes = build_pak(&[]);
        let mut reader = PakReader::new(Cursor::new(bytes));
        let verified = reader.verify().unwrap();
        assert!(verified.entries.is_empty());
        assert_eq!(verified.content_len, 0);
        assert!(reader.read_all().unwrap().is_empty());
    }
}

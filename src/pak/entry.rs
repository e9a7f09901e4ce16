use crate::codec::{
    read_hash, read_string, read_tag, read_u64, string_size, write_hash, write_string,
    write_tag, write_u64, ItemType,
};
use crate::compression::{alloc_buffer, decompress};
use crate::digest::{digest, Digest, DIGEST_SIZE};
use crate::error::{HashKind, PakError, Result};
use serde::Serialize;
use std::io::{Read, Write};
use tracing::{debug, warn};

/// Header of an embedded file entry
///
/// Structure (variable length):
/// - Type tag: `BinFile` (1 byte)
/// - Decompressed length: uint64
/// - Compressed length: uint64
/// - Decompressed digest: hash tag + 32 bytes
/// - Compressed digest: hash tag + 32 bytes
/// - Path: string
/// - Key: string
///
/// The compressed bytes follow immediately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryHeader {
    pub path: String,
    pub key: String,
    pub decompressed_len: u64,
    pub compressed_len: u64,
    pub decompressed_hash: Digest,
    pub compressed_hash: Digest,
}

impl EntryHeader {
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<usize> {
        let mut written = write_tag(&mut writer, ItemType::BinFile)?;
        written += write_u64(&mut writer, self.decompressed_len)?;
        written += write_u64(&mut writer, self.compressed_len)?;
        written += write_hash(&mut writer, &self.decompressed_hash)?;
        written += write_hash(&mut writer, &self.compressed_hash)?;
        written += write_string(&mut writer, &self.path)?;
        written += write_string(&mut writer, &self.key)?;
        Ok(written)
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        read_tag(&mut reader, ItemType::BinFile)?;
        let decompressed_len = read_u64(&mut reader)?;
        let compressed_len = read_u64(&mut reader)?;
        let decompressed_hash = read_hash(&mut reader)?;
        let compressed_hash = read_hash(&mut reader)?;
        let path = read_string(&mut reader)?;
        let key = read_string(&mut reader)?;

        Ok(Self {
            path,
            key,
            decompressed_len,
            compressed_len,
            decompressed_hash,
            compressed_hash,
        })
    }

    /// Encoded size of this header
    pub fn header_size(&self) -> u64 {
        (1 + // Type tag
        8 + // Decompressed length
        8 + // Compressed length
        (1 + DIGEST_SIZE) * 2 + // Digests
        string_size(&self.path) +
        string_size(&self.key)) as u64
    }

    /// Header plus payload
    pub fn entry_size(&self) -> u64 {
        self.header_size().saturating_add(self.compressed_len)
    }
}

/// Entry metadata as located in a pack
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    /// Absolute offset of the entry's type tag
    pub offset: u64,
    #[serde(flatten)]
    pub header: EntryHeader,
}

impl EntryInfo {
    pub fn key(&self) -> &str {
        &self.header.key
    }

    pub fn path(&self) -> &str {
        &self.header.path
    }
}

/// An extracted, verified entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PakEntry {
    pub header: EntryHeader,
    pub data: Vec<u8>,
}

impl PakEntry {
    pub fn key(&self) -> &str {
        &self.header.key
    }

    pub fn path(&self) -> &str {
        &self.header.path
    }
}

/// Read one embedded file from a stream positioned at its type tag
///
/// Both digests are checked and the payload is decompressed to exactly the
/// recorded length before anything is returned.
pub fn read_entry<R: Read>(reader: R) -> Result<PakEntry> {
    read_entry_within(reader, u64::MAX)
}

/// Like [`read_entry`], failing with `ContentOverrun` if the entry needs more than `limit` bytes
pub(crate) fn read_entry_within<R: Read>(mut reader: R, limit: u64) -> Result<PakEntry> {
    let header = EntryHeader::read_from(&mut reader)?;

    let needed = header.entry_size();
    if needed > limit {
        return Err(PakError::ContentOverrun {
            needed,
            remaining: limit,
        });
    }

    let mut compressed = alloc_buffer(header.compressed_len)?;
    (&mut reader)
        .take(header.compressed_len)
        .read_to_end(&mut compressed)?;
    if compressed.len() as u64 != header.compressed_len {
        return Err(PakError::ShortRead { what: "entry data" });
    }

    let actual = digest(&compressed);
    if actual != header.compressed_hash {
        warn!(path = %header.path, "compressed digest mismatch");
        return Err(PakError::EntryHashMismatch {
            kind: HashKind::Compressed,
            path: header.path,
            expected: header.compressed_hash,
            actual,
        });
    }

    let data = decompress(&compressed, header.decompressed_len)?;

    let actual = digest(&data);
    if actual != header.decompressed_hash {
        warn!(path = %header.path, "decompressed digest mismatch");
        return Err(PakError::EntryHashMismatch {
            kind: HashKind::Decompressed,
            path: header.path,
            expected: header.decompressed_hash,
            actual,
        });
    }

    debug!(
        key = %header.key,
        path = %header.path,
        len = data.len(),
        "Read entry"
    );

    Ok(PakEntry { header, data })
}

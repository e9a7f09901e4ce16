use crate::codec::{read_hash, read_u16, read_u64, short_read, write_hash, write_u16, write_u64};
use crate::digest::Digest;
use crate::error::{PakError, Result};
use serde::Serialize;
use std::fmt;
use std::io::{Read, Write};

/// Header magic: 🎃 "SPOOKY!" 🎃 NUL
pub const HEADER_MAGIC: [u8; 16] = [
    0xF0, 0x9F, 0x8E, 0x83, b'S', b'P', b'O', b'O', b'K', b'Y', b'!', 0xF0, 0x9F, 0x8E, 0x83, 0x00,
];

/// Footer magic: 🎃 "!YKOOPS" 🎃 NUL
pub const FOOTER_MAGIC: [u8; 16] = [
    0xF0, 0x9F, 0x8E, 0x83, b'!', b'Y', b'K', b'O', b'O', b'P', b'S', 0xF0, 0x9F, 0x8E, 0x83, 0x00,
];

pub const FOOTER_SIZE: u64 = 16;

/// Current format version
pub const FORMAT_VERSION: Version = Version::new(1, 0, 0, 0);

/// Offset where entry content begins; the header region is zero-padded up to it
pub const CONTENT_OFFSET: u64 = 0x100;

// Field offsets inside the header region
pub const VERSION_FIELD_OFFSET: u64 = 0x10;
pub const CONTENT_OFFSET_FIELD_OFFSET: u64 = 0x18;
pub const CONTENT_LEN_FIELD_OFFSET: u64 = 0x20;
pub const CONTENT_HASH_FIELD_OFFSET: u64 = 0x28;

/// Four-part format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
    pub revision: u16,
    pub subrevision: u16,
}

impl Version {
    pub const fn new(major: u16, minor: u16, revision: u16, subrevision: u16) -> Self {
        Self {
            major,
            minor,
            revision,
            subrevision,
        }
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<usize> {
        Ok(write_u16(&mut writer, self.major)?
            + write_u16(&mut writer, self.minor)?
            + write_u16(&mut writer, self.revision)?
            + write_u16(&mut writer, self.subrevision)?)
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        Ok(Self {
            major: read_u16(&mut reader)?,
            minor: read_u16(&mut reader)?,
            revision: read_u16(&mut reader)?,
            subrevision: read_u16(&mut reader)?,
        })
    }

    /// Same major version reads; minor and below may differ in either direction
    pub fn is_compatible(&self) -> bool {
        self.major == FORMAT_VERSION.major
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.revision, self.subrevision
        )
    }
}

/// Fixed header at the beginning of every pack
///
/// Structure (0x100 bytes, little-endian):
/// - Magic: 16 bytes
/// - Version: 4 x uint16
/// - Content offset: uint64 (always 0x100)
/// - Content length: uint64
/// - Content hash: hash tag (1 byte) + 32-byte digest
/// - Zero padding up to the content offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PakHeader {
    pub version: Version,
    pub content_offset: u64,
    pub content_len: u64,
    pub content_hash: Digest,
}

impl PakHeader {
    /// Header with zeroed length and hash, to be backpatched
    pub fn new() -> Self {
        Self {
            version: FORMAT_VERSION,
            content_offset: CONTENT_OFFSET,
            content_len: 0,
            content_hash: Digest::default(),
        }
    }

    /// Write the full header region, padding included
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<usize> {
        writer.write_all(&HEADER_MAGIC)?;
        let mut written = HEADER_MAGIC.len();
        written += self.version.write_to(&mut writer)?;
        written += write_u64(&mut writer, self.content_offset)?;
        written += write_u64(&mut writer, self.content_len)?;
        written += write_hash(&mut writer, &self.content_hash)?;

        let padding = (CONTENT_OFFSET as usize).saturating_sub(written);
        writer.write_all(&vec![0u8; padding])?;

        Ok(written + padding)
    }

    /// Read the header fields, rejecting a wrong magic
    ///
    /// Leaves the reader just past the content hash; padding is not consumed.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 16];
        reader
            .read_exact(&mut magic)
            .map_err(|e| short_read(e, "header magic"))?;
        if magic != HEADER_MAGIC {
            return Err(PakError::InvalidHeader { found: magic });
        }

        let version = Version::read_from(&mut reader)?;
        let content_offset = read_u64(&mut reader)?;
        let content_len = read_u64(&mut reader)?;
        let content_hash = read_hash(&mut reader)?;

        Ok(Self {
            version,
            content_offset,
            content_len,
            content_hash,
        })
    }

    pub fn validate_version(&self) -> Result<()> {
        if !self.version.is_compatible() {
            return Err(PakError::InvalidVersion {
                found: self.version,
                supported_major: FORMAT_VERSION.major,
            });
        }
        Ok(())
    }

    pub fn validate_content_offset(&self) -> Result<()> {
        if self.content_offset != CONTENT_OFFSET {
            return Err(PakError::InvalidContentOffset {
                expected: CONTENT_OFFSET,
                actual: self.content_offset,
            });
        }
        Ok(())
    }

    /// Total file size implied by this header
    pub fn expected_file_len(&self) -> Option<u64> {
        self.content_offset
            .checked_add(self.content_len)?
            .checked_add(FOOTER_SIZE)
    }
}

impl Default for PakHeader {
    fn default() -> Self {
        Self::new()
    }
}

pub fn write_footer<W: Write>(mut writer: W) -> Result<usize> {
    writer.write_all(&FOOTER_MAGIC)?;
    Ok(FOOTER_MAGIC.len())
}

pub fn read_footer<R: Read>(reader: R) -> Result<()> {
    let mut found = Vec::with_capacity(FOOTER_MAGIC.len());
    reader.take(FOOTER_SIZE).read_to_end(&mut found)?;
    if found != FOOTER_MAGIC {
        return Err(PakError::InvalidFooter { found });
    }
    Ok(())
}

//! spooky-pak: resource packs for the spooky engine
//!
//! A pack is a single binary container holding named, zlib-compressed files,
//! each with digests of its compressed and decompressed bytes, plus a digest
//! over the whole content region:
//!
//! ```text
//! 0x000  header magic      F0 9F 8E 83 "SPOOKY!" F0 9F 8E 83 00
//! 0x010  version           4 x u16
//! 0x018  content offset    u64 (0x100)
//! 0x020  content length    u64
//! 0x028  content hash      tag + 32-byte digest
//! 0x100  entries           BinFile records
//! EOF-16 footer magic      F0 9F 8E 83 "!YKOOPS" F0 9F 8E 83 00
//! ```
//!
//! Keys are tracked through an [`InternTable`] of reference-counted atoms.
//!
//! # Example
//!
//! ```no_run
//! use spooky_pak::{PakReader, PakWriter};
//!
//! let mut writer = PakWriter::create("assets.pak")?;
//! writer.add_bytes("res/fonts/a.ttf", "font_a", b"...")?;
//! writer.finalize()?;
//!
//! let mut reader = PakReader::open("assets.pak")?;
//! reader.verify()?;
//! let font = reader.read_file("font_a")?;
//! # Ok::<(), spooky_pak::PakError>(())
//! ```

pub mod codec;
pub mod compression;
pub mod config;
pub mod digest;
pub mod error;
pub mod intern;
pub mod pak;

pub use codec::ItemType;
pub use config::PakConfig;
pub use digest::{digest, Digest, DIGEST_SIZE};
pub use error::{HashKind, PakError, Result};
pub use intern::{Atom, AtomId, InternTable};
pub use pak::{
    read_entry, EntryHeader, EntryInfo, PakEntry, PakHeader, PakReader, PakSource, PakSummary,
    PakWriter, ReaderState, Stage, VerifiedPak, Version, WriterOptions, CONTENT_OFFSET,
    FORMAT_VERSION,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        let header = PakHeader::new();
        assert_eq!(header.version, FORMAT_VERSION);
        assert_eq!(header.content_offset, CONTENT_OFFSET);
        assert_eq!(WriterOptions::default().compression_level, 6);
    }
}

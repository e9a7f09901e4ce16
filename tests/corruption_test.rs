//! Corruption detection suite
//!
//! Every damaged pack must be rejected with the error naming the broken part.

use spooky_pak::pak::{
    CONTENT_HASH_FIELD_OFFSET, CONTENT_LEN_FIELD_OFFSET, CONTENT_OFFSET_FIELD_OFFSET,
    VERSION_FIELD_OFFSET,
};
use spooky_pak::{digest, HashKind, PakError, PakReader, PakWriter, ReaderState, Stage};
use spooky_pak::{CONTENT_OFFSET, DIGEST_SIZE};
use std::fs::{self, OpenOptions};
use std::io::{Cursor, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Offset of the first entry's decompressed digest: tag, two u64 lengths, hash tag
const FIRST_DECOMPRESSED_HASH: u64 = CONTENT_OFFSET + 1 + 8 + 8 + 1;

/// Helper: Create a valid test pack
fn create_test_pak() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.pak");
    let mut writer = PakWriter::create(&path).unwrap();
    writer.add_bytes("test.txt", "test", b"Hello, World!").unwrap();
    writer.add_bytes("data.bin", "data", &vec![0xAB; 1024]).unwrap();
    writer.finalize().unwrap();
    (dir, path)
}

/// Helper: Overwrite bytes at a specific offset
fn write_bytes_at(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().read(true).write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(bytes).unwrap();
}

/// Helper: Corrupt a byte at a specific offset
fn corrupt_byte_at(path: &Path, offset: u64, new_value: u8) {
    write_bytes_at(path, offset, &[new_value]);
}

/// Helper: Truncate file at specific offset
fn truncate_at(path: &Path, new_length: u64) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_len(new_length).unwrap();
}

/// Helper: Read the stored content length
fn stored_content_len(path: &Path) -> u64 {
    let bytes = fs::read(path).unwrap();
    let at = CONTENT_LEN_FIELD_OFFSET as usize;
    u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
}

/// Helper: Recompute and store the content digest so only entry-level checks can fail
fn reseal_content_hash(path: &Path) {
    let bytes = fs::read(path).unwrap();
    let start = CONTENT_OFFSET as usize;
    let end = start + stored_content_len(path) as usize;
    let sealed = digest(&bytes[start..end]);
    write_bytes_at(path, CONTENT_HASH_FIELD_OFFSET + 1, sealed.as_bytes());
}

/// Helper: Run a full verification and return the error
fn verify_err(path: &Path) -> PakError {
    match PakReader::open(path) {
        Ok(mut reader) => reader.verify().expect_err("corrupted pack verified"),
        Err(err) => err,
    }
}

#[test]
fn test_corrupted_header_magic() {
    let (_dir, path) = create_test_pak();

    corrupt_byte_at(&path, 0, 0xFF);

    let result = PakReader::open(&path);
    match result {
        Err(PakError::InvalidHeader { found }) => assert_eq!(found[0], 0xFF),
        Err(other) => panic!("Expected InvalidHeader, got: {:?}", other),
        Ok(_) => panic!("Expected InvalidHeader, pack opened"),
    }
}

#[test]
fn test_corrupted_header_magic_text() {
    let (_dir, path) = create_test_pak();

    // "SPOOKY!" lives between the two pumpkins
    corrupt_byte_at(&path, 6, b'Z');

    match verify_err(&path) {
        PakError::InvalidHeader { .. } => {}
        other => panic!("Expected InvalidHeader, got: {:?}", other),
    }
}

#[test]
fn test_corrupted_version_major() {
    let (_dir, path) = create_test_pak();

    corrupt_byte_at(&path, VERSION_FIELD_OFFSET, 99);

    match PakReader::open(&path) {
        Err(PakError::InvalidVersion { found, .. }) => assert_eq!(found.major, 99),
        Err(other) => panic!("Expected InvalidVersion, got: {:?}", other),
        Ok(_) => panic!("Expected InvalidVersion, pack opened"),
    }
}

#[test]
fn test_newer_minor_version_accepted() {
    let (_dir, path) = create_test_pak();

    // Same major, different minor
    corrupt_byte_at(&path, VERSION_FIELD_OFFSET + 2, 7);

    let mut reader = PakReader::open(&path).unwrap();
    let verified = reader.verify().unwrap();
    assert_eq!(verified.version.minor, 7);
    assert_eq!(reader.read_file("test").unwrap(), b"Hello, World!");
}

#[test]
fn test_corrupted_content_offset() {
    let (_dir, path) = create_test_pak();

    corrupt_byte_at(&path, CONTENT_OFFSET_FIELD_OFFSET, 0x80);

    let mut reader = PakReader::open(&path).unwrap();
    match reader.verify() {
        Err(PakError::InvalidContentOffset { expected, actual }) => {
            assert_eq!(expected, CONTENT_OFFSET);
            assert_eq!(actual, 0x180);
        }
        other => panic!("Expected InvalidContentOffset, got: {:?}", other),
    }
    assert_eq!(reader.state(), ReaderState::Failed(Stage::ContentHash));
}

#[test]
fn test_corrupted_hash_tag() {
    let (_dir, path) = create_test_pak();

    corrupt_byte_at(&path, CONTENT_HASH_FIELD_OFFSET, 0x0B);

    match verify_err(&path) {
        PakError::UnexpectedItemType { expected, found } => {
            assert_eq!(expected, 0x0C);
            assert_eq!(found, 0x0B);
        }
        other => panic!("Expected UnexpectedItemType, got: {:?}", other),
    }
}

#[test]
fn test_corrupted_stored_content_hash() {
    let (_dir, path) = create_test_pak();

    let at = CONTENT_HASH_FIELD_OFFSET + 1 + (DIGEST_SIZE as u64 / 2);
    let original = fs::read(&path).unwrap()[at as usize];
    corrupt_byte_at(&path, at, !original);

    match verify_err(&path) {
        PakError::ContentHashMismatch { expected, actual } => assert_ne!(expected, actual),
        other => panic!("Expected ContentHashMismatch, got: {:?}", other),
    }
}

#[test]
fn test_every_content_byte_flip_detected() {
    let (_dir, path) = create_test_pak();
    let pristine = fs::read(&path).unwrap();
    let start = CONTENT_OFFSET as usize;
    let end = start + stored_content_len(&path) as usize;

    for offset in start..end {
        let mut bytes = pristine.clone();
        bytes[offset] ^= 0x01;

        let mut reader = PakReader::new(Cursor::new(bytes));
        match reader.verify() {
            Err(PakError::ContentHashMismatch { .. }) => {}
            other => panic!(
                "Flip at {:#x}: expected ContentHashMismatch, got: {:?}",
                offset, other
            ),
        }
        assert_eq!(reader.state(), ReaderState::Failed(Stage::ContentHash));
    }

    println!("✓ {} single-byte flips detected", end - start);
}

#[test]
fn test_compressed_hash_mismatch() {
    let (_dir, path) = create_test_pak();

    // Last byte of the last entry's compressed data
    let last = CONTENT_OFFSET + stored_content_len(&path) - 1;
    let original = fs::read(&path).unwrap()[last as usize];
    corrupt_byte_at(&path, last, original ^ 0x40);
    reseal_content_hash(&path);

    match verify_err(&path) {
        PakError::EntryHashMismatch { kind, path, .. } => {
            assert_eq!(kind, HashKind::Compressed);
            assert_eq!(path, "data.bin");
        }
        other => panic!("Expected EntryHashMismatch, got: {:?}", other),
    }
}

#[test]
fn test_decompressed_hash_mismatch() {
    let (_dir, path) = create_test_pak();

    let original = fs::read(&path).unwrap()[FIRST_DECOMPRESSED_HASH as usize];
    corrupt_byte_at(&path, FIRST_DECOMPRESSED_HASH, !original);
    reseal_content_hash(&path);

    let mut reader = PakReader::open(&path).unwrap();
    match reader.verify() {
        Err(PakError::EntryHashMismatch { kind, path, .. }) => {
            assert_eq!(kind, HashKind::Decompressed);
            assert_eq!(path, "test.txt");
        }
        other => panic!("Expected EntryHashMismatch, got: {:?}", other),
    }
    assert_eq!(reader.state(), ReaderState::Failed(Stage::Entries));
}

#[test]
fn test_wrong_decompressed_length() {
    let (_dir, path) = create_test_pak();

    // First entry holds 13 bytes; claim 14
    corrupt_byte_at(&path, CONTENT_OFFSET + 1, 14);
    reseal_content_hash(&path);

    match verify_err(&path) {
        PakError::DecompressionFailure(_) => {}
        other => panic!("Expected DecompressionFailure, got: {:?}", other),
    }
}

#[test]
fn test_wrong_entry_tag() {
    let (_dir, path) = create_test_pak();

    corrupt_byte_at(&path, CONTENT_OFFSET, 0x0B);
    reseal_content_hash(&path);

    match verify_err(&path) {
        PakError::UnexpectedItemType { expected, found } => {
            assert_eq!(expected, 0x0D);
            assert_eq!(found, 0x0B);
        }
        other => panic!("Expected UnexpectedItemType, got: {:?}", other),
    }
}

#[test]
fn test_content_len_too_large() {
    let (_dir, path) = create_test_pak();

    let len = stored_content_len(&path);
    write_bytes_at(&path, CONTENT_LEN_FIELD_OFFSET, &(len + 1).to_le_bytes());

    match verify_err(&path) {
        PakError::InvalidFooter { .. } => {}
        other => panic!("Expected InvalidFooter, got: {:?}", other),
    }
}

#[test]
fn test_content_len_too_small() {
    let (_dir, path) = create_test_pak();

    let len = stored_content_len(&path);
    write_bytes_at(&path, CONTENT_LEN_FIELD_OFFSET, &(len - 1).to_le_bytes());

    match verify_err(&path) {
        PakError::ContentHashMismatch { .. } => {}
        other => panic!("Expected ContentHashMismatch, got: {:?}", other),
    }
}

#[test]
fn test_huge_content_len() {
    let (_dir, path) = create_test_pak();

    write_bytes_at(&path, CONTENT_LEN_FIELD_OFFSET, &u64::MAX.to_le_bytes());

    match verify_err(&path) {
        PakError::InvalidFooter { .. } => {}
        other => panic!("Expected InvalidFooter, got: {:?}", other),
    }
}

#[test]
fn test_corrupted_footer() {
    let (_dir, path) = create_test_pak();

    let len = fs::metadata(&path).unwrap().len();
    corrupt_byte_at(&path, len - 4, b'X');

    let mut reader = PakReader::open(&path).unwrap();
    match reader.verify() {
        Err(PakError::InvalidFooter { found }) => assert_eq!(found[12], b'X'),
        other => panic!("Expected InvalidFooter, got: {:?}", other),
    }
    assert_eq!(reader.state(), ReaderState::Failed(Stage::Footer));
}

#[test]
fn test_truncated_footer() {
    for cut in [1u64, 8, 16] {
        let (_dir, path) = create_test_pak();
        let len = fs::metadata(&path).unwrap().len();
        truncate_at(&path, len - cut);

        match verify_err(&path) {
            PakError::InvalidFooter { .. } => {}
            other => panic!("Cut {}: expected InvalidFooter, got: {:?}", cut, other),
        }
    }
}

#[test]
fn test_truncated_mid_content() {
    let (_dir, path) = create_test_pak();

    let len = stored_content_len(&path);
    truncate_at(&path, CONTENT_OFFSET + len / 2);

    let mut reader = PakReader::open(&path).unwrap();
    match reader.verify() {
        Err(PakError::InvalidFooter { .. }) => {}
        other => panic!("Expected InvalidFooter, got: {:?}", other),
    }
    assert_eq!(reader.state(), ReaderState::Failed(Stage::ContentHash));
}

#[test]
fn test_truncated_header() {
    let (_dir, path) = create_test_pak();

    truncate_at(&path, 20);

    match PakReader::open(&path) {
        Err(PakError::ShortRead { .. }) => {}
        Err(other) => panic!("Expected ShortRead, got: {:?}", other),
        Ok(_) => panic!("Expected ShortRead, pack opened"),
    }
}

#[test]
fn test_failed_reader_stays_failed() {
    let (_dir, path) = create_test_pak();

    let len = fs::metadata(&path).unwrap().len();
    corrupt_byte_at(&path, len - 1, 0xFF);

    let mut reader = PakReader::open(&path).unwrap();
    assert!(reader.verify().is_err());
    match reader.read_file("test") {
        Err(PakError::ReaderFailed { stage }) => assert_eq!(stage, Stage::Footer),
        other => panic!("Expected ReaderFailed, got: {:?}", other),
    }
}

#[test]
fn test_absurd_decompressed_length() {
    let (_dir, path) = create_test_pak();

    // A sealed pack claiming an impossible size must not abort the process
    write_bytes_at(&path, CONTENT_OFFSET + 1, &u64::MAX.to_le_bytes());
    reseal_content_hash(&path);

    match verify_err(&path) {
        PakError::AllocationFailure { requested } => assert_eq!(requested, u64::MAX),
        other => panic!("Expected AllocationFailure, got: {:?}", other),
    }
}

//! String interning
//!
//! [`InternTable`] maps string content to [`Atom`]s with stable numeric ids.
//! Atoms live in an arena addressed by id, strings are copied once into a
//! table-owned arena, and lookups hash into a fixed, prime-sized bucket array.
//!
//! ```
//! use spooky_pak::InternTable;
//!
//! let mut table = InternTable::new();
//! let a = table.ensure("PrintChar21");
//! let b = table.ensure("PrintChar21");
//! assert_eq!(a, b);
//! assert_eq!(table.atom(a).unwrap().ref_count(), 2);
//! assert_eq!(table.find_by_id(a), Some("PrintChar21"));
//! ```

use crate::error::{PakError, Result};
use std::fmt;

/// Default bucket count (prime)
pub const DEFAULT_BUCKET_COUNT: usize = 1021;

/// Stable identity of an interned string; ids start at 1 and are never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomId(u32);

impl AtomId {
    pub fn get(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An interned, reference-counted string handle
#[derive(Debug, Clone)]
pub struct Atom {
    id: AtomId,
    hash: u64,
    ref_count: u32,
    text: usize,
}

impl Atom {
    pub fn id(&self) -> AtomId {
        self.id
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }
}

/// SDBM string hash, consuming input eight bytes per round
pub fn sdbm_hash(bytes: &[u8]) -> u64 {
    #[inline(always)]
    fn step(hash: u64, byte: u8) -> u64 {
        (byte as u64)
            .wrapping_add(hash << 6)
            .wrapping_add(hash << 16)
            .wrapping_sub(hash)
    }

    let mut hash = 0u64;
    let mut chunks = bytes.chunks_exact(8);
    for chunk in &mut chunks {
        hash = step(hash, chunk[0]);
        hash = step(hash, chunk[1]);
        hash = step(hash, chunk[2]);
        hash = step(hash, chunk[3]);
        hash = step(hash, chunk[4]);
        hash = step(hash, chunk[5]);
        hash = step(hash, chunk[6]);
        hash = step(hash, chunk[7]);
    }
    for &byte in chunks.remainder() {
        hash = step(hash, byte);
    }
    hash
}

/// Hash table of interned strings
#[derive(Debug)]
pub struct InternTable {
    buckets: Vec<Vec<AtomId>>,
    atoms: Vec<Option<Atom>>,
    strings: Vec<String>,
    live: usize,
}

impl InternTable {
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKET_COUNT)
    }

    /// Create a table with `bucket_count` buckets (should be prime; zero is treated as one)
    pub fn with_buckets(bucket_count: usize) -> Self {
        Self {
            buckets: vec![Vec::new(); bucket_count.max(1)],
            atoms: Vec::new(),
            strings: Vec::new(),
            live: 0,
        }
    }

    fn bucket_of(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    fn find(&self, hash: u64, text: &str) -> Option<AtomId> {
        self.buckets[self.bucket_of(hash)]
            .iter()
            .copied()
            .find(|&id| match self.atom(id) {
                Some(atom) => atom.hash == hash && self.strings[atom.text] == text,
                None => false,
            })
    }

    /// Return the atom for `text`, interning it on first use
    ///
    /// A hit bumps the atom's reference count; a miss creates the atom with a
    /// count of one.
    pub fn ensure(&mut self, text: &str) -> AtomId {
        let hash = sdbm_hash(text.as_bytes());

        if let Some(id) = self.find(hash, text) {
            if let Some(atom) = self.atoms[id.index()].as_mut() {
                atom.ref_count += 1;
            }
            return id;
        }

        let id = AtomId(self.atoms.len() as u32 + 1);
        self.strings.push(text.to_owned());
        self.atoms.push(Some(Atom {
            id,
            hash,
            ref_count: 1,
            text: self.strings.len() - 1,
        }));
        let bucket = self.bucket_of(hash);
        self.buckets[bucket].push(id);
        self.live += 1;
        id
    }

    /// Find the atom for `text` without touching reference counts
    pub fn lookup(&self, text: &str) -> Option<AtomId> {
        self.find(sdbm_hash(text.as_bytes()), text)
    }

    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id.index()).and_then(Option::as_ref)
    }

    /// Text of a live atom
    pub fn find_by_id(&self, id: AtomId) -> Option<&str> {
        self.atom(id).map(|atom| self.strings[atom.text].as_str())
    }

    /// Add a holder to an existing atom
    pub fn retain(&mut self, id: AtomId) -> Result<u32> {
        let atom = self
            .atoms
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(PakError::UnknownAtom(id.0))?;
        atom.ref_count += 1;
        Ok(atom.ref_count)
    }

    /// Drop a holder; the atom and its string are freed when the count reaches zero
    ///
    /// Returns the remaining count. A freed atom leaves an empty slot and an
    /// empty string in the arenas; neither is reused, since ids are never
    /// reissued, so the arenas grow with every distinct atom ever created.
    pub fn release(&mut self, id: AtomId) -> Result<u32> {
        let slot = self
            .atoms
            .get_mut(id.index())
            .ok_or(PakError::UnknownAtom(id.0))?;
        let atom = slot.as_mut().ok_or(PakError::UnknownAtom(id.0))?;

        atom.ref_count -= 1;
        let remaining = atom.ref_count;
        if remaining == 0 {
            let (hash, text) = (atom.hash, atom.text);
            *slot = None;
            std::mem::take(&mut self.strings[text]);
            let bucket = self.bucket_of(hash);
            self.buckets[bucket].retain(|&other| other != id);
            self.live -= 1;
        }
        Ok(remaining)
    }

    /// Number of live atoms
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Iterate live atoms in id order
    pub fn iter(&self) -> impl Iterator<Item = (&Atom, &str)> {
        self.atoms
            .iter()
            .flatten()
            .map(|atom| (atom, self.strings[atom.text].as_str()))
    }
}

impl Default for InternTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sdbm_known_values() {
        assert_eq!(sdbm_hash(b""), 0);
        assert_eq!(sdbm_hash(b"a"), 97);
        // 97 * 65599 + 98
        assert_eq!(sdbm_hash(b"ab"), 6_363_201);
    }

    #[test]
    fn test_sdbm_unrolled_matches_bytewise() {
        let text = b"a string that is longer than eight bytes!";
        let mut expected = 0u64;
        for &b in text.iter() {
            expected = (b as u64)
                .wrapping_add(expected << 6)
                .wrapping_add(expected << 16)
                .wrapping_sub(expected);
        }
        assert_eq!(sdbm_hash(text), expected);
    }

    #[test]
    fn test_ensure_reuses_atom() {
        let mut table = InternTable::new();
        let a = table.ensure("font");
        let b = table.ensure("font");
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
        assert_eq!(table.atom(a).unwrap().ref_count(), 2);
        assert_eq!(table.atom(a).unwrap().hash(), sdbm_hash(b"font"));
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut table = InternTable::new();
        assert_eq!(table.ensure("a").get(), 1);
        assert_eq!(table.ensure("b").get(), 2);
        assert_eq!(table.ensure("a").get(), 1);
        assert_eq!(table.ensure("c").get(), 3);
    }

    #[test]
    fn test_collisions_in_single_bucket() {
        let mut table = InternTable::with_buckets(1);
        let ids: Vec<_> = ["x", "y", "z", "x"].iter().map(|s| table.ensure(s)).collect();
        assert_eq!(ids[0], ids[3]);
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
        assert_eq!(table.find_by_id(ids[2]), Some("z"));
    }

    #[test]
    fn test_release_frees_atom() {
        let mut table = InternTable::new();
        let id = table.ensure("ghost");
        table.retain(id).unwrap();
        assert_eq!(table.release(id).unwrap(), 1);
        assert_eq!(table.find_by_id(id), Some("ghost"));
        assert_eq!(table.release(id).unwrap(), 0);
        assert_eq!(table.find_by_id(id), None);
        assert!(table.lookup("ghost").is_none());
        assert!(table.is_empty());
        assert!(matches!(table.release(id), Err(PakError::UnknownAtom(_))));
    }

    #[test]
    fn test_ids_not_reused_after_release() {
        let mut table = InternTable::new();
        let first = table.ensure("ghost");
        table.release(first).unwrap();
        let second = table.ensure("ghost");
        assert_ne!(first, second);
        assert_eq!(second.get(), 2);
        assert_eq!(table.atom(second).unwrap().ref_count(), 1);
        assert!(table.atom(first).is_none());
        assert_eq!(table.len(), 1);
        assert_eq!(table.iter().count(), 1);
    }

    #[test]
    fn test_lookup_does_not_count() {
        let mut table = InternTable::new();
        let id = table.ensure("k");
        assert_eq!(table.lookup("k"), Some(id));
        assert_eq!(table.lookup("missing"), None);
        assert_eq!(table.atom(id).unwrap().ref_count(), 1);
    }

    #[test]
    fn test_unknown_id() {
        let mut table = InternTable::new();
        let id = table.ensure("a");
        let mut other = InternTable::new();
        assert!(other.find_by_id(id).is_none());
        assert!(matches!(other.retain(id), Err(PakError::UnknownAtom(1))));
    }

    #[test]
    fn test_iter_in_id_order() {
        let mut table = InternTable::new();
        table.ensure("one");
        table.ensure("two");
        let texts: Vec<_> = table.iter().map(|(_, text)| text).collect();
        assert_eq!(texts, ["one", "two"]);
    }

    proptest! {
        #[test]
        fn prop_identity_and_distinctness(a in ".{0,16}", b in ".{0,16}") {
            let mut table = InternTable::with_buckets(7);
            let id_a = table.ensure(&a);
            let id_b = table.ensure(&b);
            prop_assert_eq!(id_a == id_b, a == b);
            prop_assert_eq!(table.ensure(&a), id_a);
        }
    }
}

#![no_main]

use libfuzzer_sys::fuzz_target;
use spooky_pak::codec::{read_string, read_tag, ItemType};
use spooky_pak::read_entry;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let _ = read_string(Cursor::new(data));
    let _ = read_tag(Cursor::new(data), ItemType::BinFile);
    let _ = read_entry(Cursor::new(data));
});

#![no_main]

use libfuzzer_sys::fuzz_target;
use spooky_pak::PakReader;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let mut reader = PakReader::new(Cursor::new(data));

    // Full verification must fail cleanly on any malformed input
    let verified = match reader.verify() {
        Ok(v) => v,
        Err(_) => return,
    };

    for entry in &verified.entries {
        let _ = reader.read_file(entry.key());
    }

    let _ = reader.read_all();
    let _ = reader.entry_count();
    let _ = reader.contains("");
    let _ = reader.contains("missing");
});

//! Generate seed corpus for fuzzing

use spooky_pak::PakWriter;
use std::fs;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let corpus_dir = "fuzz/corpus/fuzz_pak_parse";
    fs::create_dir_all(corpus_dir)?;

    println!("Generating seed corpus...");

    let seeds: [(&str, Vec<(&str, &str, Vec<u8>)>); 5] = [
        ("seed_empty", vec![]),
        (
            "seed_single_small",
            vec![("test.txt", "test", b"Hello, World!".to_vec())],
        ),
        (
            "seed_fonts",
            vec![
                ("res/fonts/a.ttf", "a", b"\x00\x01\x00\x00glyf".repeat(40)),
                ("res/fonts/b.ttf", "b", b"\x00\x01\x00\x00cmap".repeat(25)),
            ],
        ),
        ("seed_binary", vec![("binary.bin", "bin", (0..=255).collect())]),
        ("seed_zero_length", vec![("empty.txt", "empty", Vec::new())]),
    ];

    for (name, entries) in &seeds {
        let path = format!("{}/{}.pak", corpus_dir, name);
        let mut writer = PakWriter::create(&path)?;
        for (stored, key, data) in entries {
            writer.add_bytes(stored, key, data)?;
        }
        writer.finalize()?;
        println!("✓ Generated: {}", path);
    }

    println!("\nGenerated {} seed files in {}", seeds.len(), corpus_dir);
    Ok(())
}

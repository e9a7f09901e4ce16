//! Pack build configuration
//!
//! A pack is described by a TOML document listing its output and entries:
//!
//! ```toml
//! output = "assets.pak"
//! compression_level = 6
//!
//! [[entry]]
//! path = "res/fonts/PrintChar21.ttf"
//! key = "print_char_21"
//! ```
//!
//! Relative paths are resolved against the directory holding the document.
//! The configuration is loaded once and passed by reference; nothing here is
//! process-global.

use crate::compression::{DEFAULT_COMPRESSION_LEVEL, MAX_COMPRESSION_LEVEL};
use crate::error::{PakError, Result};
use crate::intern::InternTable;
use crate::pak::{validate_entry_names, PakSource, WriterOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_compression_level() -> u32 {
    DEFAULT_COMPRESSION_LEVEL
}

/// Pack build configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PakConfig {
    /// Destination pack file
    pub output: PathBuf,

    /// zlib level, 0..=9
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,

    /// Files to embed, in pack order
    #[serde(default, rename = "entry")]
    pub entries: Vec<PakSource>,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl PakConfig {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            entries: Vec::new(),
            base_dir: None,
        }
    }

    pub fn with_entry(mut self, path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        self.entries.push(PakSource::new(path, key));
        self
    }

    /// Parse and validate a TOML document; relative paths stay relative to the working directory
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, resolving relative paths against its directory
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;
        config.base_dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf);
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(PakError::Config(format!(
                "compression_level {} out of range 0..={}",
                self.compression_level, MAX_COMPRESSION_LEVEL
            )));
        }
        if self.output.as_os_str().is_empty() {
            return Err(PakError::Config("output path is empty".to_string()));
        }

        let mut seen = InternTable::new();
        for entry in &self.entries {
            if entry.key.is_empty() {
                return Err(PakError::Config(format!(
                    "entry {} has an empty key",
                    entry.path.display()
                )));
            }
            validate_entry_names(&entry.path.to_string_lossy(), &entry.key)?;
            if seen.lookup(&entry.key).is_some() {
                return Err(PakError::Config(format!("duplicate key '{}'", entry.key)));
            }
            seen.ensure(&entry.key);
        }

        Ok(())
    }

    /// Resolve `path` against the base directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            compression_level: self.compression_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
output = "assets.pak"
compression_level = 9

[[entry]]
path = "fonts/a.ttf"
key = "a"

[[entry]]
path = "fonts/b.ttf"
key = "b"
"#;

    #[test]
    fn test_parse() {
        let config = PakConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.output, PathBuf::from("assets.pak"));
        assert_eq!(config.compression_level, 9);
        assert_eq!(config.entries.len(), 2);
        assert_eq!(config.entries[1], PakSource::new("fonts/b.ttf", "b"));
        assert_eq!(config.writer_options().compression_level, 9);
    }

    #[test]
    fn test_default_level() {
        let config = PakConfig::from_toml_str("output = \"x.pak\"").unwrap();
        assert_eq!(config.compression_level, DEFAULT_COMPRESSION_LEVEL);
        assert!(config.entries.is_empty());
    }

    #[test]
    fn test_rejects_bad_level() {
        let result = PakConfig::from_toml_str("output = \"x.pak\"\ncompression_level = 11");
        assert!(matches!(result, Err(PakError::Config(_))));
    }

    #[test]
    fn test_rejects_duplicate_keys() {
        let config = PakConfig::new("x.pak")
            .with_entry("a.ttf", "font")
            .with_entry("b.ttf", "font");
        assert!(matches!(config.validate(), Err(PakError::Config(_))));
    }

    #[test]
    fn test_rejects_nul_in_key() {
        // Stored keys stop at the NUL, so these would collide as "font" and ""
        let config = PakConfig::new("x.pak")
            .with_entry("a.ttf", "font")
            .with_entry("b.ttf", "font\0b");
        assert!(matches!(config.validate(), Err(PakError::Config(_))));

        let config = PakConfig::new("x.pak").with_entry("c.ttf", "\0hidden");
        assert!(matches!(config.validate(), Err(PakError::Config(_))));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let result = PakConfig::from_toml_str("output = \"x.pak\"\nlevel = 3");
        assert!(matches!(result, Err(PakError::Toml(_))));
    }

    #[test]
    fn test_from_file_resolves_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pack.toml");
        fs::write(&path, SAMPLE).unwrap();

        let config = PakConfig::from_file(&path).unwrap();
        assert_eq!(config.resolve(&config.output), dir.path().join("assets.pak"));
        assert_eq!(
            config.resolve(&config.entries[0].path),
            dir.path().join("fonts/a.ttf")
        );
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = PakConfig::new("out.pak").with_entry("a.ttf", "a");
        let text = config.to_toml_string().unwrap();
        assert_eq!(PakConfig::from_toml_str(&text).unwrap(), config);
    }
}

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};
use spooky_pak::{
    PakConfig, PakReader, PakSource, PakWriter, ReaderState, VerifiedPak, WriterOptions,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Parser)]
#[command(name = "spooky-pak")]
#[command(version, about = "Build, verify and unpack spooky resource packs", long_about = None)]
struct Cli {
    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a pack from a TOML config or from FILE=KEY pairs
    Create {
        /// Pack description (output, level and entries)
        #[arg(short, long, conflicts_with_all = ["output", "entries"])]
        config: Option<PathBuf>,

        /// Output .pak file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// zlib level (0-9)
        #[arg(short, long)]
        level: Option<u32>,

        /// Entries as FILE=KEY
        entries: Vec<String>,
    },

    /// Check every header, digest and footer in a pack
    Verify {
        /// Pack to verify
        pak: PathBuf,
    },

    /// List the entries of a verified pack
    List {
        /// Pack to list
        pak: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Extract one entry by key
    Extract {
        /// Pack to read
        pak: PathBuf,

        /// Entry key
        key: String,

        /// Destination file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn parse_entry(arg: &str) -> anyhow::Result<PakSource> {
    match arg.rsplit_once('=') {
        Some((path, key)) if !path.is_empty() && !key.is_empty() => Ok(PakSource::new(path, key)),
        _ => bail!("invalid entry '{}', expected FILE=KEY", arg),
    }
}

fn create(
    config: Option<PathBuf>,
    output: Option<PathBuf>,
    level: Option<u32>,
    entries: Vec<String>,
) -> anyhow::Result<()> {
    let summary = match config {
        Some(config_path) => {
            let mut config = PakConfig::from_file(&config_path)
                .with_context(|| format!("loading {}", config_path.display()))?;
            if let Some(level) = level {
                config.compression_level = level;
            }
            PakWriter::from_config(&config)?
        }
        None => {
            let Some(output) = output else {
                bail!("either --config or --output is required");
            };
            let sources = entries
                .iter()
                .map(|arg| parse_entry(arg))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let options = WriterOptions {
                compression_level: level.unwrap_or(WriterOptions::default().compression_level),
            };
            PakWriter::create_pak(&output, &sources, options)
                .with_context(|| format!("creating {}", output.display()))?
        }
    };

    println!(
        "Created {} ({} entries, {} content bytes, hash {})",
        summary.path.display(),
        summary.entry_count,
        summary.content_len,
        summary.content_hash
    );
    Ok(())
}

fn open_verified(path: &Path) -> anyhow::Result<(PakReader, VerifiedPak)> {
    let mut reader =
        PakReader::open(path).with_context(|| format!("{} failed verification", path.display()))?;
    match reader.verify() {
        Ok(verified) => Ok((reader, verified)),
        Err(err) => {
            let stage = match reader.state() {
                ReaderState::Failed(stage) => stage.to_string(),
                _ => "unknown".to_string(),
            };
            Err(err).with_context(|| {
                format!(
                    "{} failed verification at the {} stage",
                    path.display(),
                    stage
                )
            })
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Create {
            config,
            output,
            level,
            entries,
        } => create(config, output, level, entries)?,

        Commands::Verify { pak } => {
            let (_, verified) = open_verified(&pak)?;
            println!(
                "OK {} (format {}, {} entries, content hash {})",
                pak.display(),
                verified.version,
                verified.entries.len(),
                verified.content_hash
            );
        }

        Commands::List { pak, json } => {
            let (_, verified) = open_verified(&pak)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&verified)?);
            } else {
                for entry in &verified.entries {
                    println!(
                        "{:<24} {:>10} {:>10}  {}",
                        entry.key(),
                        entry.header.decompressed_len,
                        entry.header.compressed_len,
                        entry.path()
                    );
                }
            }
        }

        Commands::Extract { pak, key, output } => {
            let (mut reader, _) = open_verified(&pak)?;
            let data = reader
                .read_file(&key)
                .with_context(|| format!("extracting '{}' from {}", key, pak.display()))?;
            fs::write(&output, &data)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("Extracted {} bytes to {}", data.len(), output.display());
        }
    }

    Ok(())
}

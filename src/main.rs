use std::path::PathBuf;

use clap::{Parser, Subcommand};
use jagstore::container::Compression;
use jagstore::{pack, recovery, unpack, Storage};

#[derive(Parser)]
#[command(name = "jagstore", version = "1.0.0", about = "Diagnostic CLI for a JAGEX-style linked-block cache")]
struct Cli {
    /// Root directory containing the references and blocks files
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a file's contents into an entry, packing it into a container first
    Put {
        #[arg(short, long, default_value_t = 0)]
        volume: u8,
        entry: u16,
        input: PathBuf,
        /// Compression to apply: none, bzip2, gzip
        #[arg(short, long, default_value = "none")]
        compression: String,
    },
    /// Read an entry and unpack its container to a file
    Get {
        #[arg(short, long, default_value_t = 0)]
        volume: u8,
        entry: u16,
        output: PathBuf,
    },
    /// Print an entry's reference and block chain without decoding its container
    Inspect {
        #[arg(short, long, default_value_t = 0)]
        volume: u8,
        entry: u16,
    },
    /// Scan a volume's blocks file directly and report chain health per entry
    Scan {
        #[arg(short, long, default_value_t = 0)]
        volume: u8,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let storage = Storage::new(&cli.root)?;

    match cli.command {
        Commands::Put {
            volume,
            entry,
            input,
            compression,
        } => {
            let contents = std::fs::read(&input)?;
            let compression = parse_compression(&compression);
            let packed = pack(&contents, compression)?;

            let mut vol = storage.open(volume)?;
            vol.write(entry, &packed)?;
            println!(
                "wrote entry {entry} in volume {volume} ({} bytes packed from {})",
                packed.len(),
                contents.len()
            );
        }

        Commands::Get {
            volume,
            entry,
            output,
        } => {
            let mut vol = storage.open(volume)?;
            let packed = vol.read(entry)?;
            let contents = unpack(&packed)?;
            std::fs::write(&output, &contents)?;
            println!("wrote {} bytes to {}", contents.len(), output.display());
        }

        Commands::Inspect { volume, entry } => {
            let mut vol = storage.open(volume)?;
            let contents = vol.read(entry)?;
            println!("entry {entry} in volume {volume}: {} raw bytes", contents.len());
        }

        Commands::Scan { volume } => {
            let blocks_path = storage.root().join("main_file_cache.dat2");
            let blocks = std::fs::File::open(&blocks_path)?;
            let entries = recovery::scan_volume(&blocks, volume)?;
            println!("{:<8} {:<12} {:<10} {:?}", "entry", "head_block", "blocks", "health");
            for e in entries {
                println!(
                    "{:<8} {:<12} {:<10} {:?}",
                    e.entry_id, e.head_block_id, e.block_count, e.health
                );
            }
        }
    }

    Ok(())
}

fn parse_compression(s: &str) -> Compression {
    match s {
        "bzip2" => Compression::Bzip2,
        "gzip" => Compression::Gzip,
        _ => Compression::None,
    }
}

//! ringstore SSTable Tool
//!
//! Operator commands for segments on disk: finish interrupted renames,
//! inspect a segment, look up or dump its records.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use ringstore::partitioner::{HashPartitioner, OrderPreservingPartitioner};
use ringstore::sstable::{recover_directory, SSTableReader};
use ringstore::{Config, Partitioner, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// ringstore SSTable Tool
#[derive(Parser, Debug)]
#[command(name = "sstable-tool")]
#[command(about = "Inspect and recover ringstore table segments")]
#[command(version)]
struct Args {
    /// Partitioner the segments were written with
    #[arg(short, long, value_enum, default_value = "hash")]
    partitioner: PartitionerKind,

    /// Sparse index sampling interval used when opening segments
    #[arg(short, long, default_value = "128")]
    index_interval: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PartitionerKind {
    Hash,
    Order,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Complete interrupted finalizes in a data directory
    Recover {
        /// Directory holding the segments
        dir: PathBuf,
    },

    /// Print a summary of one segment
    Inspect {
        /// Path of the segment's data file
        data_file: PathBuf,
    },

    /// Look up one key
    Get {
        /// Path of the segment's data file
        data_file: PathBuf,

        /// The key to get
        key: String,
    },

    /// Print every record of a segment
    Dump {
        /// Path of the segment's data file
        data_file: PathBuf,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ringstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args, &mut io::stdout().lock()) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run<W: Write>(args: Args, out: &mut W) -> Result<()> {
    let partitioner: Arc<dyn Partitioner> = match args.partitioner {
        PartitionerKind::Hash => Arc::new(HashPartitioner),
        PartitionerKind::Order => Arc::new(OrderPreservingPartitioner),
    };
    let open = |path: &PathBuf| {
        SSTableReader::open(path, Arc::clone(&partitioner), args.index_interval, 0.0)
    };

    match &args.command {
        Commands::Recover { dir } => {
            let config = Config::builder()
                .data_dir(dir)
                .index_interval(args.index_interval)
                .build();
            let report = recover_directory(dir, Arc::clone(&partitioner), &config)?;
            for reader in &report.recovered {
                writeln!(out, "recovered  {}", reader.path().display())?;
            }
            for path in &report.incomplete {
                writeln!(out, "incomplete {}", path.display())?;
            }
            tracing::info!(
                "Recovery done: {} recovered, {} incomplete",
                report.recovered.len(),
                report.incomplete.len()
            );
        }
        Commands::Inspect { data_file } => {
            let reader = open(data_file)?;
            let descriptor = reader.descriptor();
            writeln!(out, "table:         {}", descriptor.table())?;
            writeln!(out, "generation:    {}", descriptor.generation())?;
            writeln!(out, "temporary:     {}", descriptor.is_temporary())?;
            writeln!(out, "index samples: {}", reader.index_positions().len())?;
            writeln!(out, "filter bits:   {}", reader.bloom_filter().num_bits())?;
            writeln!(out, "filter hashes: {}", reader.bloom_filter().hash_count())?;
        }
        Commands::Get { data_file, key } => {
            let reader = open(data_file)?;
            let key = partitioner.decorate_key(key.as_bytes());
            match reader.get(&key)? {
                Some(value) => writeln!(out, "{}", String::from_utf8_lossy(&value))?,
                None => writeln!(out, "(nil)")?,
            }
        }
        Commands::Dump { data_file } => {
            let reader = open(data_file)?;
            for record in reader.iter()? {
                let (key, value) = record?;
                writeln!(out, "{} => {} bytes", key, value.len())?;
            }
        }
    }
    Ok(())
}

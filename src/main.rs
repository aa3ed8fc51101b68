//! cdmkit - inspect scientific data files through a uniform data model.

use anyhow::{bail, Context, Result};
use cdmkit::render::{describe_variable, render_record, render_tree};
use cdmkit::{Dataset, DecoderRegistry, IndexPolicy, OpenOptions, RecordStream};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "cdmkit")]
#[command(about = "Inspect scientific data files through a uniform data model", long_about = None)]
struct Args {
    /// Enable debug logging to the specified file
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    /// Never build or load secondary indices
    #[arg(long, global = true)]
    no_index: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the namespace tree of a file
    Tree {
        /// Path to the data file
        file: PathBuf,

        /// Describe a single variable (`"/group/var"`) instead
        #[arg(long)]
        variable: Option<String>,
    },
    /// Print the records of a sequence
    Records {
        /// Path to the data file
        file: PathBuf,

        /// Sequence to read, as listed by `tree`
        sequence: String,

        /// Only records belonging to this key
        #[arg(long)]
        key: Option<String>,

        /// Stop after this many records
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Summarize the secondary index of a file
    Index {
        /// Path to the data file
        file: PathBuf,

        /// Rebuild even if a valid index exists
        #[arg(long)]
        rebuild: bool,
    },
    /// List the supported formats
    Formats,
}

fn init_logging(log: Option<&Path>) -> Result<()> {
    match log {
        Some(log_path) => {
            let file = std::fs::File::create(log_path)
                .with_context(|| format!("Failed to open log file {}", log_path.display()))?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(Level::DEBUG)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        },
        None => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
                )
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        },
    }
    Ok(())
}

fn open(file: &Path, options: &OpenOptions) -> Result<Dataset> {
    Dataset::open_with(file, options).with_context(|| format!("Failed to open {}", file.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log.as_deref())?;
    tracing::info!("Starting cdmkit");

    let mut options = OpenOptions::default();
    if args.no_index {
        options.index.policy = IndexPolicy::Disabled;
    }

    match args.command {
        Command::Tree { file, variable } => {
            let dataset = open(&file, &options)?;
            match variable {
                Some(path) => {
                    let var = dataset
                        .tree()
                        .find_variable_by_path(&path)
                        .with_context(|| format!("No variable {} in {}", path, file.display()))?;
                    print!("{}", describe_variable(var));
                },
                None => {
                    let name = file.file_name().map(|n| n.to_string_lossy().to_string());
                    print!("{}", render_tree(dataset.tree(), name.as_deref()));
                    let sequences = dataset.sequences();
                    if !sequences.is_empty() {
                        println!("\nSequences: {}", sequences.join(", "));
                    }
                },
            }
        },
        Command::Records {
            file,
            sequence,
            key,
            limit,
        } => {
            let dataset = open(&file, &options)?;
            let mut stream = match &key {
                Some(key) => dataset.keyed_stream(&sequence, key),
                None => dataset.stream(&sequence),
            }
            .with_context(|| format!("Cannot read {} from {}", sequence, file.display()))?;
            let limit = limit.unwrap_or(usize::MAX);
            let mut printed = 0;
            while printed < limit && stream.has_next()? {
                println!("{}", render_record(&stream.next_record()?));
                printed += 1;
            }
        },
        Command::Index { file, rebuild } => {
            if args.no_index {
                bail!("--no-index cannot be combined with the index command");
            }
            if rebuild {
                options.index.policy = IndexPolicy::Rebuild;
            }
            let dataset = open(&file, &options)?;
            let Some(index) = dataset.index() else {
                bail!("{} format does not use a secondary index", dataset.format());
            };
            println!("Index: {}", options.index.index_path(dataset.path()).display());
            println!("Keys: {}", index.len());
            println!("Ordering violations: {}", index.violations());
            for entry in index.entries() {
                let layout = if entry.contiguous { "" } else { " (scattered)" };
                println!("  {} @{} x{}{}", entry.key, entry.offset, entry.count, layout);
            }
        },
        Command::Formats => {
            for decoder in DecoderRegistry::global().decoders() {
                println!("{:<8} {}", decoder.id(), decoder.description());
            }
        },
    }

    tracing::info!("cdmkit exited");
    Ok(())
}

//! batchfeed: batched, resumable iteration over CSV and JSON files

mod commands;

use anyhow::Result;
use batchfeed::{
    batch::{FileLogSink, LogSink, RawWindow, TracingSink},
    config::{Config, LogFormat},
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "batchfeed")]
#[command(about = "Batched, resumable iteration over CSV and JSON files")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "batchfeed.toml")]
    config: PathBuf,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Batch window bounds, kept as raw strings until validated
#[derive(Args, Debug, Clone, Default)]
struct WindowArgs {
    /// First position of the batch
    #[arg(long)]
    start: Option<String>,

    /// Position where the batch ends
    #[arg(long)]
    end: Option<String>,

    /// Number of items (used when --end is not given)
    #[arg(long)]
    num_items: Option<String>,
}

impl From<WindowArgs> for RawWindow {
    fn from(args: WindowArgs) -> Self {
        RawWindow {
            start: args.start,
            end: args.end,
            num_items: args.num_items,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the column names of a CSV file
    Header {
        /// Path to the CSV file
        path: PathBuf,
    },

    /// Resolve a batch window and print it, counting the file if needed
    Count {
        /// Path to the CSV or JSON file
        path: PathBuf,

        #[command(flatten)]
        window: WindowArgs,

        /// JSON pointer selecting the array to read
        #[arg(short, long)]
        pointer: Option<String>,
    },

    /// Stream a batch of records to stdout as JSON lines
    Dump {
        /// Path to the CSV or JSON file
        path: PathBuf,

        #[command(flatten)]
        window: WindowArgs,

        /// JSON pointer selecting the array to read
        #[arg(short, long)]
        pointer: Option<String>,

        /// Resume from checkpoint if available
        #[arg(long)]
        resume: bool,

        /// Checkpoint file path
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Maximum records to emit
        #[arg(long)]
        max_records: Option<usize>,

        /// Quiet mode (no progress output)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show status of a saved checkpoint
    Status {
        /// Checkpoint file path
        checkpoint: PathBuf,
    },

    /// Initialize a new configuration
    Init {
        /// Directory to write batchfeed.toml into
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_or_default(&cli.config)?;

    // Setup logging; stdout is reserved for records
    let log_level = config.logging.level.raised(cli.verbose).to_tracing();
    let builder = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr);
    match config.logging.format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }

    let sink: Arc<dyn LogSink> = match config.logging.file {
        Some(ref file) => Arc::new(FileLogSink::open(file, config.logging.echo)?),
        None => Arc::new(TracingSink),
    };

    match cli.command {
        Commands::Header { path } => commands::header::show_header(&config, path),
        Commands::Count {
            path,
            window,
            pointer,
        } => commands::count::count_batch(&config, sink, path, window.into(), pointer),
        Commands::Dump {
            path,
            window,
            pointer,
            resume,
            checkpoint,
            max_records,
            quiet,
        } => commands::dump::dump_batch(
            &config,
            sink,
            path,
            window.into(),
            pointer,
            resume,
            checkpoint,
            max_records,
            quiet,
        ),
        Commands::Status { checkpoint } => commands::status::show_status(checkpoint),
        Commands::Init { path } => commands::init::init_config(path),
    }
}

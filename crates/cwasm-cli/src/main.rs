/// cwasm command-line tool: run format-driven transcodes over files, list
/// the values a format decodes, and produce test inputs from JSON.
///
/// # Command overview
///
/// ```text
/// cwasm <COMMAND> [OPTIONS]
///
/// Commands:
///   decompress  Transcode a file through a format manifest
///   inspect     Print every decoded value with its input address
///   encode      Write a JSON list of typed values as a binary stream
///   help        Print help information
///
/// Global options:
///   -v, --verbose    Log driver activity to stderr (RUST_LOG overrides)
///   -h, --help       Print help
///   -V, --version    Print version
/// ```
///
/// # Exit codes
///
/// | Code | Meaning                                         |
/// |------|-------------------------------------------------|
/// | 0    | Success                                         |
/// | 1    | Error (I/O failure, bad manifest, failed run)   |
///
/// All error details are written to stderr so stdout can be piped cleanly.
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd_decompress;
mod cmd_encode;
mod cmd_inspect;
mod manifest;

// ── CLI root ──────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "cwasm", version, about = "Streaming format-driven transcoder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log driver state transitions and block activity to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
}

// ── Sub-commands ──────────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum Commands {
    /// Transcode a file through a format manifest.
    Decompress(DecompressArgs),
    /// Print every value the format decodes, with its input address.
    Inspect(InspectArgs),
    /// Write a JSON list of typed values as a binary stream.
    Encode(EncodeArgs),
}

// ── Argument structs ──────────────────────────────────────────────────────────

/// Arguments for `cwasm decompress`.
///
/// ```text
/// ┌──────────────────┬────────────────────────────────────────────────┐
/// │ Flag             │ Effect                                         │
/// ├──────────────────┼────────────────────────────────────────────────┤
/// │ --chunk-size N   │ Read and page size in bytes (default 4096)     │
/// │ --padded         │ Keep block size headers at their reserved width│
/// │ --allow-trailing │ Ignore input left after the root node          │
/// │ -o / --output    │ Write to a file instead of stdout              │
/// └──────────────────┴────────────────────────────────────────────────┘
/// ```
#[derive(clap::Args)]
pub struct DecompressArgs {
    /// JSON format manifest.
    #[arg(short, long)]
    pub format: PathBuf,

    /// Input file.
    pub input: PathBuf,

    /// Write output to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = 4096)]
    pub chunk_size: usize,

    #[arg(long)]
    pub padded: bool,

    #[arg(long)]
    pub allow_trailing: bool,
}

/// Arguments for `cwasm inspect`.
#[derive(clap::Args)]
pub struct InspectArgs {
    /// JSON format manifest.
    #[arg(short, long)]
    pub format: PathBuf,

    /// Input file.
    pub input: PathBuf,

    /// Feed the input in pieces of this many bytes.
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Also print the transcoded output as hex.
    #[arg(long)]
    pub show_hex: bool,
}

/// Arguments for `cwasm encode`.
#[derive(clap::Args)]
pub struct EncodeArgs {
    /// JSON value list.
    pub input: PathBuf,

    /// Output file path.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Keep block size headers at their reserved width.
    #[arg(long)]
    pub padded: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Decompress(args) => cmd_decompress::run(&args),
        Commands::Inspect(args) => cmd_inspect::run(&args),
        Commands::Encode(args) => cmd_encode::run(&args),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

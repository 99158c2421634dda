//! `ncd` command-line tool.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use ncd_core::{BackendChoice, CompressorKind, compressor_ids};
use tracing_subscriber::EnvFilter;

use ncd_cli::app::{AppError, MatrixArgs, Overrides, Settings, init_config, run_matrix, run_pair};
use ncd_cli::format::OutputFormat;

/// NCD CLI.
#[derive(Debug, Parser)]
#[command(name = "ncd")]
#[command(about = "Normalized Compression Distance between files and sets")]
struct Cli {
    #[command(flatten)]
    shared: SharedArgs,
    #[command(subcommand)]
    command: Command,
}

/// Settings accepted by every subcommand.
#[derive(Debug, Args)]
struct SharedArgs {
    /// TOML config file path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Compressor id (see `ncd compressors`).
    #[arg(long, global = true)]
    compressor: Option<CompressorKind>,
    /// Compression level; the accepted range depends on the compressor.
    #[arg(long, global = true)]
    level: Option<u32>,
    /// Timestamp written into gzip headers.
    #[arg(long, global = true)]
    fixed_timestamp: Option<u32>,
    /// Brotli window exponent, 10..=24.
    #[arg(long, global = true)]
    brotli_window: Option<u32>,
    /// auto | reference | worker.
    #[arg(long, global = true)]
    backend: Option<BackendChoice>,
    /// Worker binary.
    #[arg(long, global = true)]
    worker: Option<String>,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Distance between two files.
    Pair {
        file_a: PathBuf,
        file_b: PathBuf,
    },
    /// Distance matrix between two sets (dirs, files, list files, or literals).
    Matrix {
        set_a: String,
        set_b: Option<String>,
        /// Compare SET_A against itself.
        #[arg(long)]
        square: bool,
        /// Interpret set args as newline-separated file-list files.
        #[arg(long)]
        list: bool,
        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Tsv)]
        format: OutputFormat,
        /// Omit row/column labels.
        #[arg(long = "no-labels")]
        no_labels: bool,
        /// Print progress and a remaining-time estimate to stderr.
        #[arg(long)]
        progress: bool,
    },
    /// List available compressors.
    Compressors,
    /// Write the example config file.
    InitConfig {
        /// Destination path.
        #[arg(long, default_value = "ncd.toml")]
        path: PathBuf,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

impl From<SharedArgs> for Overrides {
    fn from(args: SharedArgs) -> Self {
        Self {
            config: args.config,
            compressor: args.compressor,
            level: args.level,
            fixed_timestamp: args.fixed_timestamp,
            brotli_window: args.brotli_window,
            backend: args.backend,
            worker: args.worker,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let overrides = Overrides::from(cli.shared);
    match cli.command {
        Command::Pair { file_a, file_b } => {
            let settings = Settings::resolve(&overrides)?;
            let d = run_pair(&settings, &file_a, &file_b)?;
            println!("{d}");
        }
        Command::Matrix {
            set_a,
            set_b,
            square,
            list,
            format,
            no_labels,
            progress,
        } => {
            let settings = Settings::resolve(&overrides)?;
            let out = run_matrix(
                &settings,
                &MatrixArgs {
                    set_a,
                    set_b,
                    square,
                    list,
                    format,
                    no_labels,
                    progress,
                },
            )?;
            print!("{out}");
        }
        Command::Compressors => {
            for id in compressor_ids() {
                println!("{id}");
            }
        }
        Command::InitConfig { path, force } => {
            init_config(&path, force)?;
            eprintln!("wrote {}", path.display());
        }
    }
    Ok(())
}

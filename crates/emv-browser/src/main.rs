use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use emv_card::DiscoveryConfig;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

mod commands;
mod formatters;
mod tui;

use formatters::FormatMode;

#[derive(Parser)]
#[command(name = "emv-browser")]
#[command(about = "EMV Card Browser - Discover and read payment applications on smart cards")]
#[command(version)]
struct Args {
    /// Output format mode
    #[arg(short, long, value_enum, global = true, default_value_t = FormatMode::Human)]
    format: FormatMode,

    /// Reader to use (default: first reader with a card present)
    #[arg(short, long, global = true)]
    reader: Option<String>,

    /// Probe the known AIDs without selecting a payment system environment
    #[arg(long, global = true, env = "EMV_SKIP_PSE")]
    skip_pse: bool,

    /// Also read the transaction counters with GET DATA
    #[arg(long, global = true)]
    get_data: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List the PC/SC readers
    Readers,
    /// Read the card and print its applications (default)
    Read,
    /// Read the card and write the result as XML
    Export {
        /// Destination file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Decode hex-encoded TLV data without a card
    Decode {
        /// Hex bytes; spaces between bytes are allowed
        #[arg(required = true, num_args = 1..)]
        hex: Vec<String>,
    },
    /// Interactive terminal browser
    Tui,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose, matches!(args.command, Some(Command::Tui)));

    let config = DiscoveryConfig {
        skip_pse: args.skip_pse,
        read_data_objects: args.get_data,
    };
    let reader = args.reader.as_deref();

    match args.command.unwrap_or(Command::Read) {
        Command::Readers => commands::readers::cmd_readers(),
        Command::Read => commands::read::cmd_read(reader, config, args.format),
        Command::Export { output } => commands::export::cmd_export(reader, config, &output),
        Command::Decode { hex } => commands::decode::cmd_decode(&hex.concat(), args.format),
        Command::Tui => tui::run_tui(args.reader.clone(), config, args.format),
    }
}

/// Log to stderr, or nowhere while the TUI owns the terminal
///
/// Set RUST_LOG=debug for detailed logs, RUST_LOG=trace for APDU traces.
fn init_tracing(verbose: bool, tui: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let writer = if tui {
        BoxMakeWriter::new(io::sink)
    } else {
        BoxMakeWriter::new(io::stderr)
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(writer)
        .with_target(false)
        .init();
}

//! CLI tool to encode and decode CNAB remittance and return files.

use clap::{Parser, Subcommand};
use cnab_cli::{Layout, decode_file, encode_file, loader_for, show_tables};
use cnab_rs::{Direction, Format, FsStore};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Encode JSON records into CNAB 240/400 files and decode them back.
#[derive(Parser)]
#[command(name = "cnab")]
struct Cli {
    /// Bank code selecting layouts and reference tables
    #[arg(long, global = true, default_value = "104", env = "CNAB_BANK")]
    bank: String,

    /// File format: 240 or 400
    #[arg(long, global = true, default_value = "400")]
    format: Format,

    /// remittance or return (encode defaults to remittance, decode to return)
    #[arg(long, global = true)]
    direction: Option<Direction>,

    /// Load layouts from this directory instead of the builtin set
    #[arg(long, global = true, env = "CNAB_SCHEMA_DIR")]
    schema_dir: Option<PathBuf>,

    /// Log debug events on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode a JSON records document into a CNAB file
    Encode {
        /// JSON document with header, lots and trailer
        input: PathBuf,

        /// CNAB file to write
        #[arg(short, long)]
        output: PathBuf,

        /// Do not fill unset detail fields from the bank defaults
        #[arg(long)]
        no_defaults: bool,
    },
    /// Decode a CNAB file and print its records as JSON
    Decode {
        /// CNAB file to read
        input: PathBuf,

        /// Indent the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Print the bank's reference tables
    Tables {
        /// Table name, e.g. rejection-codes (all tables when omitted)
        table: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(io::stderr)
        .init();

    let loader = loader_for(cli.schema_dir.as_deref());
    let layout = |default: Direction| Layout {
        bank: cli.bank.clone(),
        format: cli.format,
        direction: cli.direction.unwrap_or(default),
    };

    let output = match &cli.command {
        Command::Encode {
            input,
            output,
            no_defaults,
        } => encode_file(
            &loader,
            &layout(Direction::Remittance),
            &FsStore,
            input,
            output,
            !no_defaults,
        )
        .map(|lines| {
            if cli.verbose {
                eprintln!("Wrote {lines} lines to {}", output.display());
            }
            None
        }),
        Command::Decode { input, pretty } => {
            decode_file(&loader, &layout(Direction::Return), &FsStore, input, *pretty).map(Some)
        }
        Command::Tables { table } => show_tables(&cli.bank, table.as_deref()).map(Some),
    };

    match output {
        Ok(Some(text)) => {
            let mut stdout = io::stdout();
            if let Err(e) = writeln!(stdout, "{text}") {
                eprintln!("Error writing output: {e}");
                process::exit(1);
            }
        }
        Ok(None) => {}
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

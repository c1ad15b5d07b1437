//! Keyward CLI - WebAuthn structure inspection tool.

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Invalid arguments
  65  Undecodable input or failed verification
  66  Input file not found or unreadable
  71  Entropy source failure";

#[derive(Parser)]
#[command(name = "keyward")]
#[command(author, version, about = "Inspect and verify WebAuthn authenticator structures", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Suppress human-readable output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode authenticator data and show flags, counter and attested credential
    InspectAuthData {
        /// Hex or base64url text, a file path, or `-` for stdin
        #[arg(value_name = "INPUT")]
        input: String,

        /// Check the RP ID hash against this RP ID
        #[arg(long)]
        rp_id: Option<String>,

        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Decode an attestation object, optionally verifying its statement
    InspectAttestation {
        /// Hex or base64url text, a file path, or `-` for stdin
        #[arg(value_name = "INPUT")]
        input: String,

        /// clientDataJSON (file, hex or base64url) to verify the statement signature against
        #[arg(long, value_name = "CLIENT_DATA")]
        client_data: Option<String>,

        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Generate random ceremony challenges
    Challenge {
        /// Challenge length in bytes (minimum 16)
        #[arg(short, long, default_value_t = 32)]
        length: usize,

        /// Number of challenges to print
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Print hex instead of base64url
        #[arg(long)]
        hex: bool,
    },

    /// Convert a raw U2F public key to COSE (or back with --reverse)
    CoseKey {
        /// Hex or base64url text, a file path, or `-` for stdin
        #[arg(value_name = "KEY")]
        input: String,

        /// Convert a COSE key to a raw uncompressed EC point
        #[arg(long)]
        reverse: bool,

        /// Print hex instead of base64url
        #[arg(long)]
        hex: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "keyward=debug,keyward_core=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::InspectAuthData { input, rp_id, json } => {
            commands::inspect_auth_data::execute(input, rp_id, json, cli.quiet)
        }
        Commands::InspectAttestation {
            input,
            client_data,
            json,
        } => commands::inspect_attestation::execute(input, client_data, json, cli.quiet),
        Commands::Challenge { length, count, hex } => {
            commands::challenge::execute(length, count, hex)
        }
        Commands::CoseKey {
            input,
            reverse,
            hex,
        } => commands::cose_key::execute(input, reverse, hex, cli.quiet),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit = match run(cli) {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "Error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}

//! Cose-key command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use keyward_core::cose::{cose_key_to_raw, raw_ec_key_to_cose};
use tracing::info;

use crate::utils::load_input;

/// Convert between a raw U2F public key (uncompressed SEC1 point) and its
/// COSE encoding.
pub fn execute(input: String, reverse: bool, hex_output: bool, quiet: bool) -> Result<()> {
    let bytes = load_input(&input)?;

    let (converted, label) = if reverse {
        let raw = cose_key_to_raw(&bytes).context("Failed to decode COSE key")?;
        (raw, "Raw EC point")
    } else {
        let cose = raw_ec_key_to_cose(&bytes).context("Failed to decode raw EC public key")?;
        (cose, "COSE key")
    };
    info!(input_bytes = bytes.len(), output_bytes = converted.len(), reverse, "Converted key");

    let encoded = if hex_output {
        converted.to_hex()
    } else {
        converted.to_base64url()
    };

    if quiet {
        println!("{}", encoded);
    } else {
        println!("{} {}", format!("{}:", label).dimmed(), encoded);
    }
    Ok(())
}

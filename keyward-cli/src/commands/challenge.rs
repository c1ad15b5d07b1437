//! Challenge command implementation.

use anyhow::{Context, Result};
use keyward_core::{ChallengeGenerator, RandomChallengeGenerator};
use tracing::debug;

/// Print `count` fresh challenges, one per line.
pub fn execute(length: usize, count: usize, hex_output: bool) -> Result<()> {
    let generator = RandomChallengeGenerator::with_length(length)
        .with_context(|| format!("Invalid argument --length {}", length))?;

    for _ in 0..count {
        let challenge = generator
            .generate_challenge()
            .context("Failed to generate challenge")?;
        debug!(bytes = challenge.len(), "Generated challenge");
        if hex_output {
            println!("{}", challenge.to_hex());
        } else {
            println!("{}", challenge.to_base64url());
        }
    }
    Ok(())
}

//! Inspect-auth-data command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use keyward_core::{AuthenticatorData, CoseAlgorithm, CosePublicKey, CryptoContext};
use serde_json::json;
use tracing::{debug, info};

use crate::utils::{abbreviate, describe_cbor, load_input};

/// Execute the inspect-auth-data command.
pub fn execute(input: String, rp_id: Option<String>, json_output: bool, quiet: bool) -> Result<()> {
    let bytes = load_input(&input)?;
    info!(bytes = bytes.len(), "Read authenticator data");

    let auth_data =
        AuthenticatorData::parse(&bytes).context("Failed to decode authenticator data")?;
    debug!(flags = ?auth_data.flags, "Parsed authenticator data");

    let rp_id_matches = rp_id
        .as_deref()
        .map(|id| auth_data.verify_rp_id(&CryptoContext::new(), id).is_ok());

    if json_output {
        println!("{}", serde_json::to_string_pretty(&to_json(&auth_data, rp_id_matches)?)?);
    } else if !quiet {
        print_summary(&auth_data, rp_id.as_deref(), rp_id_matches);
    }

    match (rp_id, rp_id_matches) {
        (Some(id), Some(false)) => {
            anyhow::bail!("RP ID verification failed: hash does not match {:?}", id)
        }
        _ => Ok(()),
    }
}

fn to_json(auth_data: &AuthenticatorData, rp_id_matches: Option<bool>) -> Result<serde_json::Value> {
    let attested = match &auth_data.attested_credential_data {
        Some(attested) => {
            let key = CosePublicKey::from_cbor(attested.public_key_cose.as_bytes())
                .context("Failed to decode credential public key")?;
            json!({
                "aaguid": attested.aaguid_string(),
                "credential_id": attested.credential_id.to_base64url(),
                "algorithm": key.algorithm().id(),
                "public_key_cose": attested.public_key_cose.to_base64url(),
            })
        }
        None => serde_json::Value::Null,
    };
    let extensions: serde_json::Map<_, _> = auth_data
        .extensions
        .iter()
        .flatten()
        .map(|(id, value)| (id.clone(), json!(describe_cbor(value))))
        .collect();

    Ok(json!({
        "rp_id_hash": hex::encode(auth_data.rp_id_hash),
        "rp_id_matches": rp_id_matches,
        "flags": auth_data.flags,
        "signature_counter": auth_data.signature_counter,
        "attested_credential_data": attested,
        "extensions": extensions,
    }))
}

fn print_summary(auth_data: &AuthenticatorData, rp_id: Option<&str>, rp_id_matches: Option<bool>) {
    let flag = |set: bool| if set { "yes".green() } else { "no".dimmed() };

    println!();
    println!("{}", "Authenticator data".bold());
    println!(
        "   {} {}",
        "RP ID hash:".dimmed(),
        hex::encode(auth_data.rp_id_hash)
    );
    if let (Some(id), Some(matches)) = (rp_id, rp_id_matches) {
        let verdict = if matches {
            format!("matches {:?}", id).green()
        } else {
            format!("does NOT match {:?}", id).red()
        };
        println!("   {} {}", "RP ID:".dimmed(), verdict);
    }
    println!(
        "   {} {}",
        "User present:".dimmed(),
        flag(auth_data.flags.user_present)
    );
    println!(
        "   {} {}",
        "User verified:".dimmed(),
        flag(auth_data.flags.user_verified)
    );
    println!(
        "   {} {} / {}",
        "Backup (eligible/state):".dimmed(),
        flag(auth_data.flags.backup_eligible),
        flag(auth_data.flags.backup_state)
    );
    println!(
        "   {} {}",
        "Signature counter:".dimmed(),
        auth_data.signature_counter
    );

    if let Some(attested) = &auth_data.attested_credential_data {
        println!();
        println!("{}", "Attested credential".bold());
        println!("   {} {}", "AAGUID:".dimmed(), attested.aaguid_string());
        println!(
            "   {} {}",
            "Credential ID:".dimmed(),
            attested.credential_id.to_base64url()
        );
        match CosePublicKey::from_cbor(attested.public_key_cose.as_bytes()) {
            Ok(key) => {
                let name = match key.algorithm() {
                    CoseAlgorithm::ES256 => "ES256",
                };
                println!("   {} {} ({})", "Algorithm:".dimmed(), name, key.algorithm().id());
                println!(
                    "   {} {}",
                    "Public key:".dimmed(),
                    abbreviate(&hex::encode(key.to_raw_ec_point()))
                );
            }
            Err(e) => println!("   {} {}", "Public key:".dimmed(), e.to_string().red()),
        }
    }

    if let Some(extensions) = &auth_data.extensions {
        println!();
        println!("{}", "Extensions".bold());
        for (id, value) in extensions {
            println!("   {} {}", format!("{}:", id).dimmed(), describe_cbor(value));
        }
    }
}

//! Inspect-attestation command implementation.

use anyhow::{Context, Result};
use ciborium::value::Value;
use colored::Colorize;
use keyward_core::attestation::{AttestationStatementVerifier, VerifiedAttestation};
use keyward_core::client_data::ClientData;
use keyward_core::{AttestationObject, AuthenticatorData, ByteSequence, CryptoContext};
use serde_json::json;
use tracing::{debug, error, info};

use crate::utils::{describe_cbor, load_input};

/// Execute the inspect-attestation command.
///
/// With `client_data` the statement signature is verified as well; a
/// statement that does not verify fails the command.
pub fn execute(
    input: String,
    client_data: Option<String>,
    json_output: bool,
    quiet: bool,
) -> Result<()> {
    let bytes = load_input(&input)?;
    info!(bytes = bytes.len(), "Read attestation object");

    let object = AttestationObject::from_cbor(&bytes).context("Failed to decode attestation object")?;
    let auth_data = AuthenticatorData::parse(object.authenticator_data().as_bytes())
        .context("Failed to decode embedded authenticator data")?;
    debug!(format = object.format(), "Parsed attestation object");

    let verification = match client_data {
        Some(arg) => {
            let raw = ByteSequence::from(load_input(&arg)?);
            let client_data =
                ClientData::parse(&raw).context("Failed to decode client data JSON")?;
            let crypto = CryptoContext::new();
            let client_data_hash = crypto.hash(client_data.raw().as_bytes());
            let result = AttestationStatementVerifier::new(crypto).verify(
                &object,
                &auth_data,
                &client_data_hash,
            );
            if let Err(e) = &result {
                error!(error = %e, "Attestation statement verification failed");
            }
            Some(result)
        }
        None => None,
    };

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&to_json(&object, &auth_data, verification.as_ref()))?
        );
    } else if !quiet {
        print_summary(&object, &auth_data, verification.as_ref());
    }

    match verification {
        Some(Err(e)) => Err(e).context("Attestation verification failed"),
        _ => Ok(()),
    }
}

fn statement_field_name(key: &Value) -> String {
    match key {
        Value::Text(name) => name.clone(),
        other => describe_cbor(other),
    }
}

fn certificate_count(object: &AttestationObject) -> usize {
    object
        .statement()
        .iter()
        .find(|(k, _)| matches!(k, Value::Text(name) if name == "x5c"))
        .and_then(|(_, v)| v.as_array())
        .map_or(0, Vec::len)
}

fn to_json(
    object: &AttestationObject,
    auth_data: &AuthenticatorData,
    verification: Option<&keyward_core::Result<VerifiedAttestation>>,
) -> serde_json::Value {
    let statement: serde_json::Map<_, _> = object
        .statement()
        .iter()
        .map(|(k, v)| (statement_field_name(k), json!(describe_cbor(v))))
        .collect();
    let verification = verification.map(|result| match result {
        Ok(verified) => json!({
            "valid": true,
            "attestation_type": verified.attestation_type,
            "trust_path_len": verified.trust_path.len(),
        }),
        Err(e) => json!({ "valid": false, "error": e.to_string() }),
    });

    json!({
        "fmt": object.format(),
        "statement": statement,
        "certificates": certificate_count(object),
        "aaguid": auth_data.attested_credential_data.as_ref().map(|a| a.aaguid_string()),
        "credential_id": auth_data
            .attested_credential_data
            .as_ref()
            .map(|a| a.credential_id.to_base64url()),
        "signature_counter": auth_data.signature_counter,
        "verification": verification,
    })
}

fn print_summary(
    object: &AttestationObject,
    auth_data: &AuthenticatorData,
    verification: Option<&keyward_core::Result<VerifiedAttestation>>,
) {
    println!();
    println!("{}", "Attestation object".bold());
    println!("   {} {}", "Format:".dimmed(), object.format());
    for (key, value) in object.statement() {
        println!(
            "   {} {}",
            format!("attStmt.{}:", statement_field_name(key)).dimmed(),
            describe_cbor(value)
        );
    }
    match &auth_data.attested_credential_data {
        Some(attested) => {
            println!("   {} {}", "AAGUID:".dimmed(), attested.aaguid_string());
            println!(
                "   {} {}",
                "Credential ID:".dimmed(),
                attested.credential_id.to_base64url()
            );
        }
        None => println!(
            "   {} {}",
            "Credential:".dimmed(),
            "no attested credential data".yellow()
        ),
    }

    match verification {
        Some(Ok(verified)) => {
            println!();
            println!("{}", "VALID".green().bold());
            println!(
                "   {} {:?}",
                "Attestation type:".dimmed(),
                verified.attestation_type
            );
            println!(
                "   {} {} certificate(s)",
                "Trust path:".dimmed(),
                verified.trust_path.len()
            );
        }
        Some(Err(e)) => {
            println!();
            println!("{}", "INVALID".red().bold());
            println!("   {} {}", "Reason:".dimmed(), e.to_string().red());
        }
        None => {}
    }
}

//! `fido-u2f` attestation for CTAP1 authenticators.

use ciborium::value::Value;

use super::certificate;
use super::{AttestationType, VerifiedAttestation};
use crate::authenticator_data::AuthenticatorData;
use crate::cose::{self, CosePublicKey};
use crate::crypto::{CryptoContext, Digest32};
use crate::error::{KeywardError, Result};

pub(super) fn verify(
    crypto: &CryptoContext,
    statement: &[(Value, Value)],
    auth_data: &AuthenticatorData,
    client_data_hash: &Digest32,
) -> Result<VerifiedAttestation> {
    let sig = cose::text_entry(statement, "sig")
        .and_then(Value::as_bytes)
        .ok_or_else(|| KeywardError::malformed("fido-u2f statement has no sig"))?;
    let chain = certificate::x5c_chain(statement)?
        .ok_or_else(|| KeywardError::malformed("fido-u2f statement has no x5c"))?;
    if chain.len() != 1 {
        return Err(KeywardError::malformed(format!(
            "fido-u2f x5c must hold exactly one certificate, got {}",
            chain.len()
        )));
    }

    let cert = certificate::parse(chain[0].as_bytes())?;
    let cert_key = certificate::public_key(crypto, &cert)?;

    let attested = auth_data
        .attested_credential_data
        .as_ref()
        .ok_or(KeywardError::MissingAttestedCredentialData)?;
    let credential_key =
        CosePublicKey::from_cbor(attested.public_key_cose.as_bytes())?.to_raw_ec_point();

    // 0x00 || rpIdHash || clientDataHash || credentialId || publicKeyU2F
    let mut signed = Vec::with_capacity(1 + 32 + 32 + attested.credential_id.len() + 65);
    signed.push(0x00);
    signed.extend_from_slice(&auth_data.rp_id_hash);
    signed.extend_from_slice(client_data_hash);
    signed.extend_from_slice(attested.credential_id.as_bytes());
    signed.extend_from_slice(&credential_key);

    if !crypto.verify_signature(&cert_key, &signed, sig) {
        return Err(KeywardError::InvalidAttestationSignature(
            "fido-u2f signature does not verify with the attestation certificate".into(),
        ));
    }

    // Self attestation carries no trust path.
    if certificate::is_self_signed(&cert) && cert_key.to_raw_ec_point() == credential_key {
        return Ok(VerifiedAttestation {
            attestation_type: AttestationType::SelfAttestation,
            trust_path: Vec::new(),
        });
    }

    Ok(VerifiedAttestation {
        attestation_type: AttestationType::Basic,
        trust_path: chain,
    })
}

//! `packed` attestation: full (x5c) or self attestation.

use ciborium::value::Value;
use x509_parser::prelude::*;

use super::certificate;
use super::{AttestationType, VerifiedAttestation};
use crate::authenticator_data::{AuthenticatorData, AAGUID_LEN};
use crate::cose::{self, CoseAlgorithm, CosePublicKey};
use crate::crypto::{CryptoContext, Digest32};
use crate::error::{KeywardError, Result};

const ATTESTATION_OU: &str = "Authenticator Attestation";

pub(super) fn verify(
    crypto: &CryptoContext,
    statement: &[(Value, Value)],
    auth_data_bytes: &[u8],
    auth_data: &AuthenticatorData,
    client_data_hash: &Digest32,
) -> Result<VerifiedAttestation> {
    let alg = cose::text_entry(statement, "alg")
        .and_then(cose::as_i64)
        .ok_or_else(|| KeywardError::malformed("packed statement has no integer alg"))?;
    let sig = cose::text_entry(statement, "sig")
        .and_then(Value::as_bytes)
        .ok_or_else(|| KeywardError::malformed("packed statement has no sig"))?;
    if cose::text_entry(statement, "ecdaaKeyId").is_some() {
        return Err(KeywardError::UnsupportedAttestationFormat(
            "packed (ECDAA)".into(),
        ));
    }

    let mut signed = Vec::with_capacity(auth_data_bytes.len() + client_data_hash.len());
    signed.extend_from_slice(auth_data_bytes);
    signed.extend_from_slice(client_data_hash);

    match certificate::x5c_chain(statement)? {
        Some(chain) => {
            CoseAlgorithm::from_id(alg)?;
            let cert = certificate::parse(chain[0].as_bytes())?;
            let aaguid = auth_data
                .attested_credential_data
                .as_ref()
                .map(|attested| attested.aaguid);
            check_certificate_requirements(&cert, aaguid)?;

            let key = certificate::public_key(crypto, &cert)?;
            if !crypto.verify_signature(&key, &signed, sig) {
                return Err(KeywardError::InvalidAttestationSignature(
                    "packed signature does not verify with the x5c leaf certificate".into(),
                ));
            }
            Ok(VerifiedAttestation {
                attestation_type: AttestationType::Basic,
                trust_path: chain,
            })
        }
        None => {
            let attested = auth_data
                .attested_credential_data
                .as_ref()
                .ok_or(KeywardError::MissingAttestedCredentialData)?;
            let credential_key = CosePublicKey::from_cbor(attested.public_key_cose.as_bytes())?;
            if credential_key.algorithm().id() != alg {
                return Err(KeywardError::InvalidAttestationSignature(format!(
                    "self attestation alg {} does not match credential key alg {}",
                    alg,
                    credential_key.algorithm().id()
                )));
            }

            let key = credential_key.to_public_key(crypto)?;
            if !crypto.verify_signature(&key, &signed, sig) {
                return Err(KeywardError::InvalidAttestationSignature(
                    "packed self attestation signature does not verify".into(),
                ));
            }
            Ok(VerifiedAttestation {
                attestation_type: AttestationType::SelfAttestation,
                trust_path: Vec::new(),
            })
        }
    }
}

fn check_certificate_requirements(
    cert: &X509Certificate<'_>,
    aaguid: Option<[u8; AAGUID_LEN]>,
) -> Result<()> {
    let invalid = |reason: &str| Err(KeywardError::InvalidAttestationCertificate(reason.into()));

    if cert.version() != X509Version::V3 {
        return invalid("attestation certificate must be X.509 version 3");
    }

    let subject = cert.subject();
    let has_value = |attr: Option<&AttributeTypeAndValue<'_>>| {
        attr.and_then(|a| a.as_str().ok())
            .is_some_and(|value| !value.is_empty())
    };
    if !has_value(subject.iter_country().next()) {
        return invalid("subject has no country");
    }
    if !has_value(subject.iter_organization().next()) {
        return invalid("subject has no organization");
    }
    if !has_value(subject.iter_common_name().next()) {
        return invalid("subject has no common name");
    }
    let ou = subject
        .iter_organizational_unit()
        .next()
        .and_then(|a| a.as_str().ok());
    if ou != Some(ATTESTATION_OU) {
        return invalid("subject OU must be \"Authenticator Attestation\"");
    }

    let is_ca = cert
        .basic_constraints()
        .map_err(|e| KeywardError::InvalidAttestationCertificate(e.to_string()))?
        .is_some_and(|ext| ext.value.ca);
    if is_ca {
        return invalid("attestation certificate must not be a CA");
    }

    if let Some(cert_aaguid) = certificate::aaguid_extension(cert)? {
        if Some(cert_aaguid) != aaguid {
            return invalid("certificate AAGUID does not match authenticator data");
        }
    }

    Ok(())
}

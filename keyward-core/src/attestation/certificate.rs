//! X.509 helpers shared by the certificate-bearing attestation formats.

use ciborium::value::Value;
use x509_parser::prelude::*;

use crate::authenticator_data::AAGUID_LEN;
use crate::bytes::ByteSequence;
use crate::cose::text_entry;
use crate::crypto::{CryptoContext, PublicKeyHandle};
use crate::error::{KeywardError, Result};

/// id-fido-gen-ce-aaguid
pub const AAGUID_EXTENSION_OID: &str = "1.3.6.1.4.1.45724.1.1.4";

/// Read the `x5c` array of DER certificates, leaf first.
pub(crate) fn x5c_chain(statement: &[(Value, Value)]) -> Result<Option<Vec<ByteSequence>>> {
    let Some(x5c) = text_entry(statement, "x5c") else {
        return Ok(None);
    };
    let entries = x5c
        .as_array()
        .ok_or_else(|| KeywardError::malformed("x5c is not an array"))?;
    if entries.is_empty() {
        return Err(KeywardError::malformed("x5c is empty"));
    }
    entries
        .iter()
        .map(|entry| {
            entry
                .as_bytes()
                .map(|der| ByteSequence::from(der.as_slice()))
                .ok_or_else(|| KeywardError::malformed("x5c entry is not a byte string"))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

pub(crate) fn parse(der: &[u8]) -> Result<X509Certificate<'_>> {
    let (rest, cert) = X509Certificate::from_der(der)
        .map_err(|e| KeywardError::InvalidAttestationCertificate(e.to_string()))?;
    if !rest.is_empty() {
        return Err(KeywardError::InvalidAttestationCertificate(
            "trailing bytes after certificate".into(),
        ));
    }
    Ok(cert)
}

/// Subject public key of an EC P-256 certificate.
pub(crate) fn public_key(crypto: &CryptoContext, cert: &X509Certificate<'_>) -> Result<PublicKeyHandle> {
    crypto.decode_public_key(&cert.public_key().subject_public_key.data)
}

/// AAGUID carried in the FIDO extension, if present and well formed.
pub(crate) fn aaguid_extension(cert: &X509Certificate<'_>) -> Result<Option<[u8; AAGUID_LEN]>> {
    let Some(ext) = cert
        .extensions()
        .iter()
        .find(|ext| ext.oid.to_id_string() == AAGUID_EXTENSION_OID)
    else {
        return Ok(None);
    };
    if ext.critical {
        return Err(KeywardError::InvalidAttestationCertificate(
            "AAGUID extension must not be critical".into(),
        ));
    }
    // OCTET STRING wrapping the 16 AAGUID bytes
    match ext.value {
        [0x04, 0x10, aaguid @ ..] if aaguid.len() == AAGUID_LEN => {
            let mut out = [0u8; AAGUID_LEN];
            out.copy_from_slice(aaguid);
            Ok(Some(out))
        }
        _ => Err(KeywardError::InvalidAttestationCertificate(
            "AAGUID extension is not a 16 byte octet string".into(),
        )),
    }
}

pub(crate) fn is_self_signed(cert: &X509Certificate<'_>) -> bool {
    cert.subject().as_raw() == cert.issuer().as_raw()
}

pub(crate) fn subject_summary(cert: &X509Certificate<'_>) -> String {
    cert.subject().to_string()
}

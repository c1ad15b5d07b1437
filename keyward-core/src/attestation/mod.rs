//! Attestation statement verification.
//!
//! Each supported statement format is a variant of [`AttestationFormat`];
//! [`AttestationStatementVerifier::verify`] dispatches on it. The verifier
//! only establishes that the statement cryptographically vouches for the
//! attested key. Whether the returned chain is trusted is decided by an
//! [`AttestationTrustResolver`](crate::trust::AttestationTrustResolver).

pub(crate) mod certificate;
mod fido_u2f;
mod none;
mod object;
mod packed;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::authenticator_data::AuthenticatorData;
use crate::bytes::ByteSequence;
use crate::crypto::{CryptoContext, Digest32};
use crate::error::{KeywardError, Result};

pub use certificate::AAGUID_EXTENSION_OID;
pub use object::AttestationObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttestationFormat {
    Packed,
    FidoU2f,
    None,
}

impl AttestationFormat {
    pub fn identifier(&self) -> &'static str {
        match self {
            Self::Packed => "packed",
            Self::FidoU2f => "fido-u2f",
            Self::None => "none",
        }
    }

    pub fn from_identifier(id: &str) -> Result<Self> {
        match id {
            "packed" => Ok(Self::Packed),
            "fido-u2f" => Ok(Self::FidoU2f),
            "none" => Ok(Self::None),
            other => Err(KeywardError::UnsupportedAttestationFormat(other.to_string())),
        }
    }
}

impl FromStr for AttestationFormat {
    type Err = KeywardError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_identifier(s)
    }
}

impl fmt::Display for AttestationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttestationType {
    Basic,
    #[serde(rename = "self")]
    SelfAttestation,
    AttCa,
    None,
    Uncertain,
}

/// Outcome of a successful statement verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAttestation {
    pub attestation_type: AttestationType,
    /// DER certificates leaf first; empty for self and none attestation.
    pub trust_path: Vec<ByteSequence>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AttestationStatementVerifier {
    crypto: CryptoContext,
}

impl AttestationStatementVerifier {
    pub fn new(crypto: CryptoContext) -> Self {
        Self { crypto }
    }

    /// Verify the statement over `authData || clientDataHash`.
    pub fn verify(
        &self,
        object: &AttestationObject,
        auth_data: &AuthenticatorData,
        client_data_hash: &Digest32,
    ) -> Result<VerifiedAttestation> {
        let format = AttestationFormat::from_identifier(object.format())?;
        tracing::debug!(format = %format, "Verifying attestation statement");

        let verified = match format {
            AttestationFormat::Packed => packed::verify(
                &self.crypto,
                object.statement(),
                object.authenticator_data().as_bytes(),
                auth_data,
                client_data_hash,
            ),
            AttestationFormat::FidoU2f => {
                fido_u2f::verify(&self.crypto, object.statement(), auth_data, client_data_hash)
            }
            AttestationFormat::None => none::verify(object.statement()),
        }?;

        tracing::debug!(
            format = %format,
            attestation_type = ?verified.attestation_type,
            chain_len = verified.trust_path.len(),
            "Attestation statement verified"
        );
        Ok(verified)
    }
}

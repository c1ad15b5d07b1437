use thiserror::Error;

use crate::bytes::ByteSequence;
use crate::extensions::ExtensionLocation;

/// Minimum challenge length accepted by the ceremony pipeline.
pub const MIN_CHALLENGE_LENGTH: usize = 16;

/// Why a client data check rejected the response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientDataMismatch {
    #[error("expected type {expected}, got {actual}")]
    Type { expected: String, actual: String },

    #[error("challenge does not match the issued challenge")]
    Challenge,

    #[error("origin {0} is not an accepted origin")]
    Origin(String),

    #[error("token binding status is present but no id was supplied")]
    TokenBindingIdMissing,

    #[error("token binding information is missing")]
    TokenBindingMissing,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeywardError {
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Client data mismatch: {0}")]
    ClientDataMismatch(ClientDataMismatch),

    #[error("RP ID hash does not match the expected RP ID")]
    RpIdMismatch,

    #[error("Truncated authenticator data: {field} needs {needed} bytes, {remaining} remain")]
    TruncatedAuthenticatorData {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("Malformed public key: {0}")]
    MalformedKey(String),

    #[error("Unsupported COSE algorithm: {0}")]
    UnsupportedAlgorithm(i64),

    #[error("Credential algorithm {0} was not among the requested parameters")]
    AlgorithmNotRequested(i64),

    #[error("Unsupported attestation statement format: {0}")]
    UnsupportedAttestationFormat(String),

    #[error("Invalid attestation signature: {0}")]
    InvalidAttestationSignature(String),

    #[error("Invalid attestation certificate: {0}")]
    InvalidAttestationCertificate(String),

    #[error("Invalid assertion signature")]
    InvalidAssertionSignature,

    #[error("Unknown credential: {0}")]
    UnknownCredential(ByteSequence),

    #[error("Credential {0} is not in the allowed credentials list")]
    CredentialNotAllowed(ByteSequence),

    #[error("Credential ID is already registered")]
    CredentialIdInUse,

    #[error("User handle does not own the presented credential")]
    UserHandleMismatch,

    #[error("Authenticator data carries no attested credential data")]
    MissingAttestedCredentialData,

    #[error("User presence flag is not set")]
    UserNotPresent,

    #[error("User verification was required but not performed")]
    UserNotVerified,

    #[error("Unrequested {location} extensions: {ids:?}, requested: {requested:?}")]
    UnrequestedExtension {
        location: ExtensionLocation,
        ids: Vec<String>,
        requested: Vec<String>,
    },

    #[error("Signature counter regression: stored {stored}, presented {presented}")]
    CounterRegression { stored: u32, presented: u32 },

    #[error("Attestation is not trusted")]
    UntrustedAttestation,

    #[error("No such ceremony in progress")]
    NoSuchCeremony,

    #[error("Invalid AppID: {0}")]
    InvalidAppId(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Credential repository error: {0}")]
    Repository(String),

    #[error("Attestation trust resolution error: {0}")]
    TrustResolution(String),

    #[error("Entropy source failure: {0}")]
    Entropy(String),
}

impl KeywardError {
    /// True for failures of the runtime environment rather than of the
    /// presented response. These are never attacker-triggerable.
    pub fn is_environment_fault(&self) -> bool {
        matches!(self, Self::Entropy(_))
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }
}

impl From<ClientDataMismatch> for KeywardError {
    fn from(reason: ClientDataMismatch) -> Self {
        Self::ClientDataMismatch(reason)
    }
}

pub type Result<T> = std::result::Result<T, KeywardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_fault_classification() {
        assert!(KeywardError::Entropy("getrandom failed".into()).is_environment_fault());
        assert!(!KeywardError::InvalidAssertionSignature.is_environment_fault());
        assert!(!KeywardError::malformed("bad cbor").is_environment_fault());
    }

    #[test]
    fn test_client_data_mismatch_display() {
        let err: KeywardError = ClientDataMismatch::Origin("https://evil.test".into()).into();
        assert_eq!(
            err.to_string(),
            "Client data mismatch: origin https://evil.test is not an accepted origin"
        );
    }
}

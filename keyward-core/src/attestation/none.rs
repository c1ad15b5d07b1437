use ciborium::value::Value;

use super::{AttestationType, VerifiedAttestation};
use crate::error::{KeywardError, Result};

pub(super) fn verify(statement: &[(Value, Value)]) -> Result<VerifiedAttestation> {
    if !statement.is_empty() {
        return Err(KeywardError::malformed(
            "none attestation must carry an empty statement",
        ));
    }
    Ok(VerifiedAttestation {
        attestation_type: AttestationType::None,
        trust_path: Vec::new(),
    })
}

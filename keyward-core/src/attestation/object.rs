use ciborium::value::Value;

use crate::bytes::ByteSequence;
use crate::cose;
use crate::error::{KeywardError, Result};

/// Decoded attestation object: `{fmt, attStmt, authData}`.
///
/// The embedded authenticator data is kept as raw bytes; it is parsed
/// separately because the signature covers the exact wire encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationObject {
    format: String,
    statement: Vec<(Value, Value)>,
    authenticator_data: ByteSequence,
}

impl AttestationObject {
    pub fn new(
        format: impl Into<String>,
        statement: Vec<(Value, Value)>,
        authenticator_data: ByteSequence,
    ) -> Self {
        Self {
            format: format.into(),
            statement,
            authenticator_data,
        }
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        let Value::Map(entries) = cose::decode_exact(bytes)? else {
            return Err(KeywardError::malformed("attestation object is not a CBOR map"));
        };

        let format = cose::text_entry(&entries, "fmt")
            .and_then(Value::as_text)
            .ok_or_else(|| KeywardError::malformed("attestation object has no text fmt"))?
            .to_string();
        let statement = cose::text_entry(&entries, "attStmt")
            .and_then(Value::as_map)
            .ok_or_else(|| KeywardError::malformed("attestation object has no attStmt map"))?
            .clone();
        let authenticator_data = cose::text_entry(&entries, "authData")
            .and_then(Value::as_bytes)
            .map(|bytes| ByteSequence::from(bytes.as_slice()))
            .ok_or_else(|| KeywardError::malformed("attestation object has no authData bytes"))?;

        Ok(Self {
            format,
            statement,
            authenticator_data,
        })
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        cose::encode(&Value::Map(vec![
            (Value::Text("fmt".into()), Value::Text(self.format.clone())),
            (Value::Text("attStmt".into()), Value::Map(self.statement.clone())),
            (
                Value::Text("authData".into()),
                Value::Bytes(self.authenticator_data.as_bytes().to_vec()),
            ),
        ]))
    }

    /// Format identifier exactly as sent.
    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn statement(&self) -> &[(Value, Value)] {
        &self.statement
    }

    pub fn authenticator_data(&self) -> &ByteSequence {
        &self.authenticator_data
    }
}

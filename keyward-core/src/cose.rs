//! CBOR helpers and COSE public key encoding.
//!
//! Only EC2 keys on P-256 with ES256 are understood. Raw U2F keys
//! (uncompressed SEC1 points) convert to and from the COSE form.

use std::io::Cursor;

use ciborium::value::{Integer, Value};
use serde::{Deserialize, Serialize};

use crate::bytes::ByteSequence;
use crate::crypto::{CryptoContext, PublicKeyHandle, RAW_EC_POINT_LEN};
use crate::error::{KeywardError, Result};

// COSE key map labels (RFC 8152 section 7 and 13.1.1)
const LABEL_KTY: i64 = 1;
const LABEL_ALG: i64 = 3;
const LABEL_CRV: i64 = -1;
const LABEL_X: i64 = -2;
const LABEL_Y: i64 = -3;

pub const COSE_KTY_EC2: i64 = 2;
pub const COSE_CRV_P256: i64 = 1;
pub const COSE_ALG_ES256: i64 = -7;

const COORDINATE_LEN: usize = 32;

/// Signature algorithms this engine can verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CoseAlgorithm {
    ES256,
}

impl CoseAlgorithm {
    pub fn id(&self) -> i64 {
        match self {
            Self::ES256 => COSE_ALG_ES256,
        }
    }

    pub fn from_id(id: i64) -> Result<Self> {
        match id {
            COSE_ALG_ES256 => Ok(Self::ES256),
            other => Err(KeywardError::UnsupportedAlgorithm(other)),
        }
    }
}

/// EC2 P-256 public key decoded from its COSE map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CosePublicKey {
    algorithm: CoseAlgorithm,
    x: [u8; COORDINATE_LEN],
    y: [u8; COORDINATE_LEN],
}

impl CosePublicKey {
    /// Decode a COSE key occupying the whole buffer.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        let value = decode_exact(bytes)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value
            .as_map()
            .ok_or_else(|| KeywardError::MalformedKey("COSE key is not a CBOR map".into()))?;

        let alg = int_label(map, LABEL_ALG)
            .ok_or_else(|| KeywardError::MalformedKey("COSE key has no alg".into()))?;
        let algorithm = CoseAlgorithm::from_id(alg)?;

        if int_label(map, LABEL_KTY) != Some(COSE_KTY_EC2) {
            return Err(KeywardError::MalformedKey("ES256 key must have kty EC2".into()));
        }
        if int_label(map, LABEL_CRV) != Some(COSE_CRV_P256) {
            return Err(KeywardError::MalformedKey("ES256 key must use curve P-256".into()));
        }

        Ok(Self {
            algorithm,
            x: coordinate(map, LABEL_X, "x")?,
            y: coordinate(map, LABEL_Y, "y")?,
        })
    }

    /// Build from an uncompressed SEC1 point as produced by U2F authenticators.
    pub fn from_raw_ec_point(raw: &[u8]) -> Result<Self> {
        if raw.len() != RAW_EC_POINT_LEN || raw[0] != 0x04 {
            return Err(KeywardError::MalformedKey(format!(
                "raw EC key must be {} bytes starting with 0x04",
                RAW_EC_POINT_LEN
            )));
        }
        let mut x = [0u8; COORDINATE_LEN];
        let mut y = [0u8; COORDINATE_LEN];
        x.copy_from_slice(&raw[1..33]);
        y.copy_from_slice(&raw[33..65]);
        Ok(Self {
            algorithm: CoseAlgorithm::ES256,
            x,
            y,
        })
    }

    pub fn algorithm(&self) -> CoseAlgorithm {
        self.algorithm
    }

    pub fn to_raw_ec_point(&self) -> [u8; RAW_EC_POINT_LEN] {
        let mut raw = [0u8; RAW_EC_POINT_LEN];
        raw[0] = 0x04;
        raw[1..33].copy_from_slice(&self.x);
        raw[33..65].copy_from_slice(&self.y);
        raw
    }

    pub fn to_value(&self) -> Value {
        Value::Map(vec![
            (int(LABEL_KTY), int(COSE_KTY_EC2)),
            (int(LABEL_ALG), int(self.algorithm.id())),
            (int(LABEL_CRV), int(COSE_CRV_P256)),
            (int(LABEL_X), Value::Bytes(self.x.to_vec())),
            (int(LABEL_Y), Value::Bytes(self.y.to_vec())),
        ])
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        encode(&self.to_value())
    }

    /// Decode into a verification handle, checking the point is on the curve.
    pub fn to_public_key(&self, crypto: &CryptoContext) -> Result<PublicKeyHandle> {
        crypto.decode_public_key(&self.to_raw_ec_point())
    }
}

/// Convert a raw U2F public key into COSE encoding.
pub fn raw_ec_key_to_cose(raw: &[u8]) -> Result<ByteSequence> {
    CosePublicKey::from_raw_ec_point(raw)?
        .to_cbor()
        .map(ByteSequence::from)
}

/// Convert a COSE EC2 key back into an uncompressed SEC1 point.
pub fn cose_key_to_raw(cose: &[u8]) -> Result<ByteSequence> {
    Ok(ByteSequence::from(CosePublicKey::from_cbor(cose)?.to_raw_ec_point()))
}

// ==================== CBOR helpers ====================

/// Decode one CBOR item from the front of `bytes`, returning it with the
/// number of bytes it occupied.
pub(crate) fn decode_prefix(bytes: &[u8]) -> Result<(Value, usize)> {
    let mut cursor = Cursor::new(bytes);
    let value: Value = ciborium::de::from_reader(&mut cursor)
        .map_err(|e| KeywardError::malformed(format!("invalid CBOR: {}", e)))?;
    Ok((value, cursor.position() as usize))
}

/// Decode exactly one CBOR item spanning the whole buffer.
pub(crate) fn decode_exact(bytes: &[u8]) -> Result<Value> {
    let (value, used) = decode_prefix(bytes)?;
    if used != bytes.len() {
        return Err(KeywardError::malformed(format!(
            "{} trailing bytes after CBOR item",
            bytes.len() - used
        )));
    }
    Ok(value)
}

pub(crate) fn encode(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out)
        .map_err(|e| KeywardError::malformed(format!("CBOR encoding failed: {}", e)))?;
    Ok(out)
}

/// Look up a text key in a CBOR map.
pub(crate) fn text_entry<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| k.as_text() == Some(key))
        .map(|(_, v)| v)
}

pub(crate) fn as_i64(value: &Value) -> Option<i64> {
    value
        .as_integer()
        .and_then(|i| i64::try_from(i128::from(i)).ok())
}

fn int(value: i64) -> Value {
    Value::Integer(Integer::from(value))
}

fn int_label(map: &[(Value, Value)], label: i64) -> Option<i64> {
    map.iter()
        .find(|(k, _)| as_i64(k) == Some(label))
        .and_then(|(_, v)| as_i64(v))
}

fn coordinate(map: &[(Value, Value)], label: i64, name: &str) -> Result<[u8; COORDINATE_LEN]> {
    let bytes = map
        .iter()
        .find(|(k, _)| as_i64(k) == Some(label))
        .and_then(|(_, v)| v.as_bytes())
        .ok_or_else(|| KeywardError::MalformedKey(format!("COSE key has no {} coordinate", name)))?;
    bytes.as_slice().try_into().map_err(|_| {
        KeywardError::MalformedKey(format!(
            "{} coordinate is {} bytes, expected {}",
            name,
            bytes.len(),
            COORDINATE_LEN
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::SigningKey;

    fn raw_point() -> Vec<u8> {
        SigningKey::from_slice(&[0x22; 32])
            .unwrap()
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    #[test]
    fn test_raw_to_cose_and_back() {
        let raw = raw_point();
        let cose = raw_ec_key_to_cose(&raw).unwrap();
        assert_eq!(cose_key_to_raw(cose.as_bytes()).unwrap().as_bytes(), raw.as_slice());
    }

    #[test]
    fn test_cose_key_decodes_to_usable_handle() {
        let crypto = CryptoContext::new();
        let cose = raw_ec_key_to_cose(&raw_point()).unwrap();
        let key = CosePublicKey::from_cbor(cose.as_bytes()).unwrap();
        assert_eq!(key.algorithm(), CoseAlgorithm::ES256);
        assert_eq!(key.to_public_key(&crypto).unwrap().to_raw_ec_point(), raw_point());
    }

    #[test]
    fn test_unsupported_algorithm_rejected() {
        let mut value = CosePublicKey::from_raw_ec_point(&raw_point())
            .unwrap()
            .to_value();
        if let Value::Map(entries) = &mut value {
            for (k, v) in entries.iter_mut() {
                if as_i64(k) == Some(LABEL_ALG) {
                    *v = int(-257);
                }
            }
        }
        let bytes = encode(&value).unwrap();
        assert_eq!(
            CosePublicKey::from_cbor(&bytes).unwrap_err(),
            KeywardError::UnsupportedAlgorithm(-257)
        );
    }

    #[test]
    fn test_missing_coordinate_is_malformed() {
        let value = Value::Map(vec![
            (int(LABEL_KTY), int(COSE_KTY_EC2)),
            (int(LABEL_ALG), int(COSE_ALG_ES256)),
            (int(LABEL_CRV), int(COSE_CRV_P256)),
            (int(LABEL_X), Value::Bytes(vec![0; 32])),
        ]);
        let bytes = encode(&value).unwrap();
        assert!(matches!(
            CosePublicKey::from_cbor(&bytes),
            Err(KeywardError::MalformedKey(_))
        ));
    }

    #[test]
    fn test_wrong_raw_length_rejected() {
        assert!(matches!(
            raw_ec_key_to_cose(&[0x04; 33]),
            Err(KeywardError::MalformedKey(_))
        ));
    }

    #[test]
    fn test_decode_prefix_reports_consumed_length() {
        let cose = raw_ec_key_to_cose(&raw_point()).unwrap();
        let mut buffer = cose.as_bytes().to_vec();
        buffer.extend_from_slice(&[0xa0]);
        let (_, used) = decode_prefix(&buffer).unwrap();
        assert_eq!(used, cose.len());
        assert!(decode_exact(&buffer).is_err());
    }
}

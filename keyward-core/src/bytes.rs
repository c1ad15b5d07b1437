//! Immutable byte buffers with a base64url text form.
//!
//! Every binary value that crosses the wire (challenges, credential IDs,
//! COSE keys, signatures) is carried as a [`ByteSequence`].

use std::fmt;
use std::str::FromStr;

use base64::alphabet::URL_SAFE;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{KeywardError, Result};

/// URL-safe alphabet, unpadded on output, padding tolerated on input.
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Immutable byte sequence compared and ordered by content.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteSequence(Box<[u8]>);

impl ByteSequence {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into().into_boxed_slice())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Decode base64url text, with or without padding.
    pub fn from_base64url(text: &str) -> Result<Self> {
        BASE64URL
            .decode(text)
            .map(Self::new)
            .map_err(|e| KeywardError::malformed(format!("invalid base64url: {}", e)))
    }

    pub fn from_hex(text: &str) -> Result<Self> {
        hex::decode(text)
            .map(Self::new)
            .map_err(|e| KeywardError::malformed(format!("invalid hex: {}", e)))
    }

    pub fn to_base64url(&self) -> String {
        BASE64URL.encode(&self.0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// New sequence holding `self` followed by `other`.
    pub fn concat(&self, other: &[u8]) -> Self {
        let mut joined = Vec::with_capacity(self.len() + other.len());
        joined.extend_from_slice(&self.0);
        joined.extend_from_slice(other);
        Self::new(joined)
    }
}

impl AsRef<[u8]> for ByteSequence {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for ByteSequence {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for ByteSequence {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for ByteSequence {
    fn from(bytes: [u8; N]) -> Self {
        Self::new(bytes.to_vec())
    }
}

impl FromStr for ByteSequence {
    type Err = KeywardError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_base64url(s)
    }
}

impl fmt::Display for ByteSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64url())
    }
}

impl fmt::Debug for ByteSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteSequence({})", self.to_hex())
    }
}

impl Serialize for ByteSequence {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64url())
    }
}

impl<'de> Deserialize<'de> for ByteSequence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_base64url(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64url_known_vector() {
        let bytes = ByteSequence::from([0xfb, 0xff, 0x01]);
        assert_eq!(bytes.to_base64url(), "-_8B");
        assert_eq!(ByteSequence::from_base64url("-_8B").unwrap(), bytes);
    }

    #[test]
    fn test_padding_is_optional_on_decode() {
        let padded = ByteSequence::from_base64url("AQ==").unwrap();
        let unpadded = ByteSequence::from_base64url("AQ").unwrap();
        assert_eq!(padded, unpadded);
        assert_eq!(padded.as_bytes(), &[0x01]);
    }

    #[test]
    fn test_standard_alphabet_rejected() {
        let err = ByteSequence::from_base64url("+/8B").unwrap_err();
        assert!(matches!(err, KeywardError::MalformedResponse(_)));
    }

    #[test]
    fn test_ordering_is_by_content() {
        let a = ByteSequence::from([1, 2]);
        let b = ByteSequence::from([1, 3]);
        let c = ByteSequence::from([1, 2, 0]);
        assert!(a < b);
        assert!(a < c);
        assert_eq!(a, ByteSequence::from(vec![1, 2]));
    }

    #[test]
    fn test_serde_uses_base64url_string() {
        let bytes = ByteSequence::from(*b"keyward");
        let json = serde_json::to_string(&bytes).unwrap();
        assert_eq!(json, "\"a2V5d2FyZA\"");
        let back: ByteSequence = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bytes);
    }

    #[test]
    fn test_concat() {
        let joined = ByteSequence::from([1, 2]).concat(&[3]);
        assert_eq!(joined.as_bytes(), &[1, 2, 3]);
    }
}

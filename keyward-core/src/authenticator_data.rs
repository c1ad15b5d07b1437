//! Authenticator data decoding and encoding.
//!
//! Layout: `rpIdHash[32] || flags[1] || counter[4, BE]`, then the attested
//! credential block when AT is set, then an extensions CBOR map when ED is set.

use std::collections::{BTreeMap, BTreeSet};

use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use crate::bytes::ByteSequence;
use crate::cose;
use crate::crypto::{CryptoContext, Digest32, DIGEST_LEN};
use crate::error::{KeywardError, Result};

pub const AAGUID_LEN: usize = 16;

/// Flag bits of the authenticator data flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthenticatorFlags {
    pub user_present: bool,
    pub user_verified: bool,
    pub backup_eligible: bool,
    pub backup_state: bool,
    pub attested_data_included: bool,
    pub extension_data_included: bool,
}

impl AuthenticatorFlags {
    pub const UP: u8 = 0x01;
    pub const UV: u8 = 0x04;
    pub const BE: u8 = 0x08;
    pub const BS: u8 = 0x10;
    pub const AT: u8 = 0x40;
    pub const ED: u8 = 0x80;

    /// Reserved bits (RFU1, RFU2) are ignored.
    pub fn from_byte(byte: u8) -> Self {
        Self {
            user_present: byte & Self::UP != 0,
            user_verified: byte & Self::UV != 0,
            backup_eligible: byte & Self::BE != 0,
            backup_state: byte & Self::BS != 0,
            attested_data_included: byte & Self::AT != 0,
            extension_data_included: byte & Self::ED != 0,
        }
    }

    pub fn to_byte(&self) -> u8 {
        [
            (self.user_present, Self::UP),
            (self.user_verified, Self::UV),
            (self.backup_eligible, Self::BE),
            (self.backup_state, Self::BS),
            (self.attested_data_included, Self::AT),
            (self.extension_data_included, Self::ED),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .fold(0, |acc, (_, bit)| acc | bit)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttestedCredentialData {
    pub aaguid: [u8; AAGUID_LEN],
    pub credential_id: ByteSequence,
    /// COSE-encoded credential public key, exactly as it appeared on the wire.
    pub public_key_cose: ByteSequence,
}

impl AttestedCredentialData {
    /// AAGUID in hyphenated UUID form.
    pub fn aaguid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.aaguid).hyphenated().to_string()
    }
}

/// Authenticator extension outputs keyed by extension identifier.
pub type AuthenticatorExtensions = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorData {
    pub rp_id_hash: Digest32,
    pub flags: AuthenticatorFlags,
    pub signature_counter: u32,
    pub attested_credential_data: Option<AttestedCredentialData>,
    pub extensions: Option<AuthenticatorExtensions>,
}

/// Bounds-checked forward reader over the raw buffer.
struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.offset..]
    }

    fn take(&mut self, field: &'static str, needed: usize) -> Result<&'a [u8]> {
        let remaining = self.bytes.len() - self.offset;
        if remaining < needed {
            return Err(KeywardError::TruncatedAuthenticatorData {
                field,
                needed,
                remaining,
            });
        }
        let slice = &self.bytes[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(field, N)?);
        Ok(out)
    }

    fn advance(&mut self, count: usize) {
        self.offset += count;
    }
}

impl AuthenticatorData {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);

        let rp_id_hash: Digest32 = reader.take_array::<DIGEST_LEN>("rpIdHash")?;
        let [flags_byte] = reader.take_array::<1>("flags")?;
        let flags = AuthenticatorFlags::from_byte(flags_byte);
        let signature_counter = u32::from_be_bytes(reader.take_array::<4>("signCount")?);

        let attested_credential_data = if flags.attested_data_included {
            let aaguid = reader.take_array::<AAGUID_LEN>("aaguid")?;
            let id_len = u16::from_be_bytes(reader.take_array::<2>("credentialIdLength")?);
            let credential_id = ByteSequence::from(reader.take("credentialId", id_len as usize)?);

            let remaining = reader.remaining();
            let (_, used) = cose::decode_prefix(remaining)
                .map_err(|e| KeywardError::malformed(format!("credential public key: {}", e)))?;
            let public_key_cose = ByteSequence::from(&remaining[..used]);
            reader.advance(used);

            Some(AttestedCredentialData {
                aaguid,
                credential_id,
                public_key_cose,
            })
        } else {
            None
        };

        let extensions = if flags.extension_data_included {
            let remaining = reader.remaining();
            let (value, used) = cose::decode_prefix(remaining)
                .map_err(|e| KeywardError::malformed(format!("extensions: {}", e)))?;
            reader.advance(used);
            Some(extension_map(value)?)
        } else {
            None
        };

        let trailing = reader.remaining().len();
        if trailing > 0 {
            return Err(KeywardError::malformed(format!(
                "{} unexpected trailing bytes in authenticator data",
                trailing
            )));
        }

        Ok(Self {
            rp_id_hash,
            flags,
            signature_counter,
            attested_credential_data,
            extensions,
        })
    }

    /// Encode back to the wire layout. Flags for AT and ED follow the
    /// presence of the optional blocks.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut flags = self.flags;
        flags.attested_data_included = self.attested_credential_data.is_some();
        flags.extension_data_included = self.extensions.is_some();

        let mut out = Vec::with_capacity(37);
        out.extend_from_slice(&self.rp_id_hash);
        out.push(flags.to_byte());
        out.extend_from_slice(&self.signature_counter.to_be_bytes());

        if let Some(attested) = &self.attested_credential_data {
            let id_len = u16::try_from(attested.credential_id.len()).map_err(|_| {
                KeywardError::malformed("credential ID longer than 65535 bytes")
            })?;
            out.extend_from_slice(&attested.aaguid);
            out.extend_from_slice(&id_len.to_be_bytes());
            out.extend_from_slice(attested.credential_id.as_bytes());
            out.extend_from_slice(attested.public_key_cose.as_bytes());
        }

        if let Some(extensions) = &self.extensions {
            let map = extensions
                .iter()
                .map(|(k, v)| (Value::Text(k.clone()), v.clone()))
                .collect();
            out.extend_from_slice(&cose::encode(&Value::Map(map))?);
        }

        Ok(out)
    }

    /// Compare the RP ID hash against `hash(rp_id)`.
    pub fn verify_rp_id(&self, crypto: &CryptoContext, rp_id: &str) -> Result<()> {
        if self.rp_id_hash == crypto.hash(rp_id.as_bytes()) {
            Ok(())
        } else {
            Err(KeywardError::RpIdMismatch)
        }
    }

    pub fn extension_ids(&self) -> BTreeSet<String> {
        self.extensions
            .as_ref()
            .map(|ext| ext.keys().cloned().collect())
            .unwrap_or_default()
    }
}

fn extension_map(value: Value) -> Result<AuthenticatorExtensions> {
    let Value::Map(entries) = value else {
        return Err(KeywardError::malformed("extensions are not a CBOR map"));
    };
    entries
        .into_iter()
        .map(|(k, v)| match k {
            Value::Text(id) => Ok((id, v)),
            _ => Err(KeywardError::malformed("extension identifier is not text")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cose::raw_ec_key_to_cose;
    use p256::ecdsa::SigningKey;

    fn cose_key() -> ByteSequence {
        let raw = SigningKey::from_slice(&[0x33; 32])
            .unwrap()
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        raw_ec_key_to_cose(&raw).unwrap()
    }

    fn header(flags: u8, counter: u32) -> Vec<u8> {
        let mut bytes = CryptoContext::new().hash(b"example.com").to_vec();
        bytes.push(flags);
        bytes.extend_from_slice(&counter.to_be_bytes());
        bytes
    }

    #[test]
    fn test_parse_minimal_assertion_data() {
        let data = AuthenticatorData::parse(&header(0x05, 42)).unwrap();
        assert!(data.flags.user_present);
        assert!(data.flags.user_verified);
        assert!(!data.flags.attested_data_included);
        assert_eq!(data.signature_counter, 42);
        assert!(data.attested_credential_data.is_none());
        assert!(data.extensions.is_none());
        data.verify_rp_id(&CryptoContext::new(), "example.com").unwrap();
    }

    #[test]
    fn test_counter_is_big_endian() {
        let data = AuthenticatorData::parse(&header(0x01, 0x0102_0304)).unwrap();
        assert_eq!(data.signature_counter, 0x0102_0304);
        assert_eq!(&header(0x01, 0x0102_0304)[33..37], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_rp_id_mismatch() {
        let data = AuthenticatorData::parse(&header(0x01, 0)).unwrap();
        assert_eq!(
            data.verify_rp_id(&CryptoContext::new(), "example.org"),
            Err(KeywardError::RpIdMismatch)
        );
    }

    #[test]
    fn test_parse_attested_credential_data() {
        let mut bytes = header(0x41, 0);
        bytes.extend_from_slice(&[0xAA; AAGUID_LEN]);
        bytes.extend_from_slice(&4u16.to_be_bytes());
        bytes.extend_from_slice(&[9, 8, 7, 6]);
        bytes.extend_from_slice(cose_key().as_bytes());

        let data = AuthenticatorData::parse(&bytes).unwrap();
        let attested = data.attested_credential_data.unwrap();
        assert_eq!(attested.aaguid, [0xAA; AAGUID_LEN]);
        assert_eq!(attested.credential_id.as_bytes(), &[9, 8, 7, 6]);
        assert_eq!(attested.public_key_cose, cose_key());
        assert_eq!(
            attested.aaguid_string(),
            "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa"
        );
    }

    #[test]
    fn test_truncated_header() {
        let bytes = header(0x01, 0);
        assert_eq!(
            AuthenticatorData::parse(&bytes[..36]),
            Err(KeywardError::TruncatedAuthenticatorData {
                field: "signCount",
                needed: 4,
                remaining: 3,
            })
        );
        assert!(matches!(
            AuthenticatorData::parse(&bytes[..10]),
            Err(KeywardError::TruncatedAuthenticatorData { field: "rpIdHash", .. })
        ));
    }

    #[test]
    fn test_truncated_credential_id() {
        let mut bytes = header(0x41, 0);
        bytes.extend_from_slice(&[0; AAGUID_LEN]);
        bytes.extend_from_slice(&64u16.to_be_bytes());
        bytes.extend_from_slice(&[1; 10]);
        assert_eq!(
            AuthenticatorData::parse(&bytes),
            Err(KeywardError::TruncatedAuthenticatorData {
                field: "credentialId",
                needed: 64,
                remaining: 10,
            })
        );
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = header(0x01, 0);
        bytes.push(0x00);
        assert!(matches!(
            AuthenticatorData::parse(&bytes),
            Err(KeywardError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_extensions_block() {
        let mut bytes = header(0x81, 3);
        let ext = Value::Map(vec![(Value::Text("credProtect".into()), Value::Integer(2.into()))]);
        bytes.extend_from_slice(&cose::encode(&ext).unwrap());

        let data = AuthenticatorData::parse(&bytes).unwrap();
        assert_eq!(
            data.extension_ids(),
            BTreeSet::from(["credProtect".to_string()])
        );
    }

    #[test]
    fn test_round_trip_full_record() {
        let mut extensions = AuthenticatorExtensions::new();
        extensions.insert("hmac-secret".into(), Value::Bool(true));

        let record = AuthenticatorData {
            rp_id_hash: CryptoContext::new().hash(b"login.example.com"),
            flags: AuthenticatorFlags {
                user_present: true,
                user_verified: true,
                backup_eligible: true,
                backup_state: false,
                attested_data_included: true,
                extension_data_included: true,
            },
            signature_counter: 7,
            attested_credential_data: Some(AttestedCredentialData {
                aaguid: [0x5A; AAGUID_LEN],
                credential_id: ByteSequence::from(vec![0xC0; 32]),
                public_key_cose: cose_key(),
            }),
            extensions: Some(extensions),
        };

        let bytes = record.to_bytes().unwrap();
        assert_eq!(AuthenticatorData::parse(&bytes).unwrap(), record);
    }

    #[test]
    fn test_flag_byte_round_trip() {
        for byte in [0x00u8, 0x01, 0x05, 0x1D, 0x41, 0xC5] {
            assert_eq!(AuthenticatorFlags::from_byte(byte).to_byte(), byte);
        }
    }
}

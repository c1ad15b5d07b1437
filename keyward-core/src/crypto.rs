//! Hashing and ECDSA P-256 verification.
//!
//! All ceremony components receive a [`CryptoContext`] explicitly instead of
//! reaching for process-wide provider state.

use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{DerSignature, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::error::{KeywardError, Result};

/// SHA-256 output length in bytes.
pub const DIGEST_LEN: usize = 32;

/// Uncompressed SEC1 P-256 point: 0x04 || x || y.
pub const RAW_EC_POINT_LEN: usize = 65;

pub type Digest32 = [u8; DIGEST_LEN];

/// Decoded P-256 public key ready for verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKeyHandle(VerifyingKey);

impl PublicKeyHandle {
    /// Uncompressed SEC1 encoding of the key.
    pub fn to_raw_ec_point(&self) -> Vec<u8> {
        self.0.to_encoded_point(false).as_bytes().to_vec()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CryptoContext {
    _private: (),
}

impl CryptoContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash(&self, bytes: &[u8]) -> Digest32 {
        let digest = Sha256::digest(bytes);
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(&digest);
        out
    }

    /// Decode an uncompressed P-256 point.
    pub fn decode_public_key(&self, raw: &[u8]) -> Result<PublicKeyHandle> {
        if raw.len() != RAW_EC_POINT_LEN {
            return Err(KeywardError::MalformedKey(format!(
                "expected {} byte uncompressed point, got {} bytes",
                RAW_EC_POINT_LEN,
                raw.len()
            )));
        }
        if raw[0] != 0x04 {
            return Err(KeywardError::MalformedKey(format!(
                "unexpected point encoding tag 0x{:02x}",
                raw[0]
            )));
        }
        VerifyingKey::from_sec1_bytes(raw)
            .map(PublicKeyHandle)
            .map_err(|_| KeywardError::MalformedKey("point is not on the P-256 curve".into()))
    }

    /// ECDSA/SHA-256 verification of a DER signature.
    ///
    /// Garbled signature bytes verify as `false`; they are never an error.
    pub fn verify_signature(
        &self,
        key: &PublicKeyHandle,
        signed_bytes: &[u8],
        signature: &[u8],
    ) -> bool {
        let Ok(signature) = DerSignature::from_bytes(signature) else {
            tracing::debug!(len = signature.len(), "Signature is not valid DER");
            return false;
        };
        key.0.verify(signed_bytes, &signature).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::Signer;
    use p256::ecdsa::SigningKey;

    fn test_key() -> SigningKey {
        SigningKey::from_slice(&[0x11; 32]).unwrap()
    }

    fn raw_point(key: &SigningKey) -> Vec<u8> {
        key.verifying_key().to_encoded_point(false).as_bytes().to_vec()
    }

    #[test]
    fn test_sha256_known_vector() {
        let crypto = CryptoContext::new();
        assert_eq!(
            hex::encode(crypto.hash(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            hex::encode(crypto.hash(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hash_distinguishes_inputs() {
        let crypto = CryptoContext::new();
        assert_ne!(crypto.hash(b"localhost"), crypto.hash(b"localhost."));
    }

    #[test]
    fn test_sign_verify_and_bit_flips() {
        let crypto = CryptoContext::new();
        let signing_key = test_key();
        let public = crypto.decode_public_key(&raw_point(&signing_key)).unwrap();

        let message = b"authenticator data || client data hash".to_vec();
        let signature: DerSignature = signing_key.sign(&message);
        let signature = signature.as_bytes().to_vec();

        assert!(crypto.verify_signature(&public, &message, &signature));

        for bit in [0usize, 7, 100, message.len() * 8 - 1] {
            let mut tampered = message.clone();
            tampered[bit / 8] ^= 1 << (bit % 8);
            assert!(
                !crypto.verify_signature(&public, &tampered, &signature),
                "flipping message bit {} should break the signature",
                bit
            );
        }

        for byte in [signature.len() / 2, signature.len() - 1] {
            let mut tampered = signature.clone();
            tampered[byte] ^= 0x01;
            assert!(
                !crypto.verify_signature(&public, &message, &tampered),
                "flipping signature byte {} should break the signature",
                byte
            );
        }
    }

    #[test]
    fn test_garbage_signature_is_false_not_error() {
        let crypto = CryptoContext::new();
        let public = crypto.decode_public_key(&raw_point(&test_key())).unwrap();
        assert!(!crypto.verify_signature(&public, b"msg", &[]));
        assert!(!crypto.verify_signature(&public, b"msg", &[0x30, 0x02, 0x01]));
        assert!(!crypto.verify_signature(&public, b"msg", &[0xff; 72]));
    }

    #[test]
    fn test_decode_rejects_bad_points() {
        let crypto = CryptoContext::new();
        let mut raw = raw_point(&test_key());

        assert!(matches!(
            crypto.decode_public_key(&raw[..64]),
            Err(KeywardError::MalformedKey(_))
        ));

        raw[0] = 0x02;
        assert!(matches!(
            crypto.decode_public_key(&raw),
            Err(KeywardError::MalformedKey(_))
        ));

        raw[0] = 0x04;
        raw[64] ^= 0x01;
        assert!(matches!(
            crypto.decode_public_key(&raw),
            Err(KeywardError::MalformedKey(_))
        ));
    }

    #[test]
    fn test_raw_point_round_trip() {
        let crypto = CryptoContext::new();
        let raw = raw_point(&test_key());
        let public = crypto.decode_public_key(&raw).unwrap();
        assert_eq!(public.to_raw_ec_point(), raw);
    }
}

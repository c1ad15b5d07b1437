//! Attestation trust resolution.
//!
//! The ceremony pipeline hands the verified certificate chain to an
//! [`AttestationTrustResolver`] and records the verdict on the result.
//! [`StaticTrustResolver`] trusts a fixed set of DER anchors and describes
//! known authenticator models from a built-in AAGUID table.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use x509_parser::certificate::X509Certificate;

use crate::attestation::certificate;
use crate::bytes::ByteSequence;
use crate::crypto::{CryptoContext, Digest32};
use crate::error::{KeywardError, Result};

/// Known authenticator AAGUIDs with their descriptions.
/// Static fallback used when an anchor carries no metadata of its own.
static KNOWN_AUTHENTICATORS: &[(&str, &str, &str)] = &[
    // Google
    (
        "ea9b8d66-4d01-1d21-3ce4-b6b48cb575d4",
        "Google Titan Security Key",
        "Google",
    ),
    // Microsoft
    (
        "08987058-cadc-4b81-b6e1-30de50dcbe96",
        "Windows Hello Hardware",
        "Microsoft",
    ),
    // Yubico
    (
        "cb69481e-8ff7-4039-93ec-0a2729a154a8",
        "YubiKey 5 Series",
        "Yubico",
    ),
    (
        "ee882879-721c-4913-9775-3dfcce97072a",
        "YubiKey 5 Series",
        "Yubico",
    ),
    (
        "2fc0579f-8113-47ea-b116-bb5a8db9202a",
        "YubiKey 5 NFC",
        "Yubico",
    ),
    (
        "c5ef55ff-ad9a-4b9f-b580-adebafe026d0",
        "YubiKey 5Ci",
        "Yubico",
    ),
    (
        "fa2b99dc-9e39-4257-8f92-4a30d23c4118",
        "YubiKey 5 FIPS",
        "Yubico",
    ),
    (
        "73bb0cd4-e502-49b8-9c6f-b59445bf720b",
        "YubiKey 5 Bio",
        "Yubico",
    ),
    // Feitian
    (
        "77010bd7-212a-4fc9-b236-d2ca5e9d4084",
        "Feitian BioPass K27",
        "Feitian",
    ),
    (
        "3e22415d-7fdf-4ea4-8a0c-dd60c4249b9d",
        "Feitian ePass FIDO2",
        "Feitian",
    ),
    // SoloKeys
    (
        "8876631b-d4a0-427f-5773-0ec71c9e0279",
        "Solo Secp256R1 FIDO2 CTAP2 Authenticator",
        "SoloKeys",
    ),
];

/// Description of the authenticator model behind an attestation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationMetadata {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aaguid: Option<String>,
}

/// Look up an authenticator model by hyphenated AAGUID.
pub fn lookup_authenticator(aaguid: &str) -> Option<AttestationMetadata> {
    let aaguid = aaguid.to_lowercase();
    KNOWN_AUTHENTICATORS
        .iter()
        .find(|(id, _, _)| *id == aaguid)
        .map(|(id, description, vendor)| AttestationMetadata {
            description: description.to_string(),
            vendor: Some(vendor.to_string()),
            aaguid: Some(id.to_string()),
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrustVerdict {
    pub trusted: bool,
    pub metadata: Option<AttestationMetadata>,
}

impl TrustVerdict {
    pub fn untrusted() -> Self {
        Self::default()
    }
}

/// Resolves an attestation certificate chain (leaf first) to a verdict.
#[async_trait]
pub trait AttestationTrustResolver: Send + Sync {
    async fn resolve_trust(&self, chain: &[ByteSequence]) -> Result<TrustVerdict>;
}

/// Trusts nothing. Registrations still succeed when untrusted attestation
/// is allowed, with `attestation_trusted = false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyTrustResolver;

#[async_trait]
impl AttestationTrustResolver for EmptyTrustResolver {
    async fn resolve_trust(&self, _chain: &[ByteSequence]) -> Result<TrustVerdict> {
        Ok(TrustVerdict::untrusted())
    }
}

#[derive(Debug, Clone)]
struct TrustAnchor {
    der: ByteSequence,
    fingerprint: Digest32,
    metadata: Option<AttestationMetadata>,
}

/// Trusts chains that link, certificate by certificate from the leaf, to
/// one of a fixed set of anchors.
#[derive(Debug, Clone, Default)]
pub struct StaticTrustResolver {
    crypto: CryptoContext,
    anchors: Vec<TrustAnchor>,
}

impl StaticTrustResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a DER-encoded anchor certificate.
    pub fn with_anchor(
        mut self,
        der: impl Into<ByteSequence>,
        metadata: Option<AttestationMetadata>,
    ) -> Result<Self> {
        let der = der.into();
        certificate::parse(der.as_bytes())
            .map_err(|e| KeywardError::InvalidConfig(format!("trust anchor: {}", e)))?;
        let fingerprint = self.crypto.hash(der.as_bytes());
        self.anchors.push(TrustAnchor {
            der,
            fingerprint,
            metadata,
        });
        Ok(self)
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    fn anchor_for(&self, der: &ByteSequence, cert: &X509Certificate<'_>) -> Option<&TrustAnchor> {
        let fingerprint = self.crypto.hash(der.as_bytes());
        if let Some(anchor) = self.anchors.iter().find(|a| a.fingerprint == fingerprint) {
            return Some(anchor);
        }
        self.anchors.iter().find(|anchor| {
            certificate::parse(anchor.der.as_bytes())
                .is_ok_and(|anchor_cert| issued_by(cert, &anchor_cert))
        })
    }

    /// Walk the chain from the leaf. Every certificate before the one that
    /// reaches an anchor must be issued by its successor.
    fn chain_anchor(&self, chain: &[ByteSequence]) -> Option<&TrustAnchor> {
        let certs = chain
            .iter()
            .map(|der| certificate::parse(der.as_bytes()))
            .collect::<Result<Vec<_>>>()
            .ok()?;

        for (i, (der, cert)) in chain.iter().zip(&certs).enumerate() {
            if let Some(anchor) = self.anchor_for(der, cert) {
                return Some(anchor);
            }
            let next = certs.get(i + 1)?;
            if !issued_by(cert, next) {
                tracing::debug!(position = i, "Attestation chain link does not verify");
                return None;
            }
        }
        None
    }

    fn leaf_metadata(&self, leaf_der: &ByteSequence) -> Option<AttestationMetadata> {
        let leaf = certificate::parse(leaf_der.as_bytes()).ok()?;
        let aaguid = certificate::aaguid_extension(&leaf).ok()??;
        lookup_authenticator(&uuid::Uuid::from_bytes(aaguid).hyphenated().to_string())
    }
}

fn issued_by(cert: &X509Certificate<'_>, issuer: &X509Certificate<'_>) -> bool {
    cert.issuer().as_raw() == issuer.subject().as_raw()
        && cert.verify_signature(Some(issuer.public_key())).is_ok()
}

#[async_trait]
impl AttestationTrustResolver for StaticTrustResolver {
    async fn resolve_trust(&self, chain: &[ByteSequence]) -> Result<TrustVerdict> {
        let Some(leaf) = chain.first() else {
            return Ok(TrustVerdict::untrusted());
        };

        let anchor = self.chain_anchor(chain);
        let metadata = anchor
            .and_then(|a| a.metadata.clone())
            .or_else(|| self.leaf_metadata(leaf));

        if anchor.is_some() {
            tracing::debug!(chain_len = chain.len(), "Attestation chain trusted");
        } else {
            let leaf_subject = certificate::parse(leaf.as_bytes())
                .map(|c| certificate::subject_summary(&c))
                .unwrap_or_default();
            tracing::debug!(
                chain_len = chain.len(),
                leaf_subject = %leaf_subject,
                "No trust anchor matched attestation chain"
            );
        }

        Ok(TrustVerdict {
            trusted: anchor.is_some(),
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_authenticator() {
        let metadata = lookup_authenticator("2FC0579F-8113-47EA-B116-BB5A8DB9202A").unwrap();
        assert_eq!(metadata.description, "YubiKey 5 NFC");
        assert_eq!(metadata.vendor.as_deref(), Some("Yubico"));
    }

    #[test]
    fn test_lookup_unknown_authenticator() {
        assert!(lookup_authenticator("00000000-0000-0000-0000-000000000000").is_none());
    }

    #[tokio::test]
    async fn test_empty_chain_is_untrusted() {
        let resolver = StaticTrustResolver::new();
        assert_eq!(
            resolver.resolve_trust(&[]).await.unwrap(),
            TrustVerdict::untrusted()
        );
        assert!(!EmptyTrustResolver
            .resolve_trust(&[ByteSequence::from([1u8])])
            .await
            .unwrap()
            .trusted);
    }

    #[test]
    fn test_invalid_anchor_rejected() {
        let err = StaticTrustResolver::new()
            .with_anchor(vec![0x30, 0x03, 0x02, 0x01, 0x01], None)
            .unwrap_err();
        assert!(matches!(err, KeywardError::InvalidConfig(_)));
    }
}

//! Ceremony options handed to the client and re-presented at finish time.
//!
//! Options serialize to the WebAuthn JSON shape (camelCase, base64url bytes)
//! so callers can pass them straight to `navigator.credentials`.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::appid::{AppId, APPID_EXTENSION};
use crate::bytes::ByteSequence;
use crate::cose::{CoseAlgorithm, COSE_ALG_ES256};
use crate::error::{KeywardError, Result, MIN_CHALLENGE_LENGTH};

/// Only credential type defined by WebAuthn.
pub const PUBLIC_KEY_TYPE: &str = "public-key";

/// Longest user handle permitted by WebAuthn.
pub const MAX_USER_HANDLE_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelyingPartyIdentity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    /// Opaque user handle, never derived from personal data.
    pub id: ByteSequence,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKeyCredentialParameters {
    #[serde(rename = "type")]
    pub credential_type: String,
    pub alg: i64,
}

impl PublicKeyCredentialParameters {
    pub fn es256() -> Self {
        Self {
            credential_type: PUBLIC_KEY_TYPE.to_string(),
            alg: COSE_ALG_ES256,
        }
    }

    pub fn for_algorithm(algorithm: CoseAlgorithm) -> Self {
        Self {
            credential_type: PUBLIC_KEY_TYPE.to_string(),
            alg: algorithm.id(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticatorAttachment {
    Platform,
    CrossPlatform,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationRequirement {
    Required,
    #[default]
    Preferred,
    Discouraged,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationConveyancePreference {
    #[default]
    None,
    Indirect,
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticatorTransport {
    Usb,
    Nfc,
    Ble,
    Internal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelectionCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
    #[serde(default)]
    pub require_resident_key: bool,
    #[serde(default)]
    pub user_verification: UserVerificationRequirement,
}

/// Reference to a credential in allow/exclude lists. Ordered by ID so the
/// lists are stable, duplicate-free sets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKeyCredentialDescriptor {
    pub id: ByteSequence,
    #[serde(rename = "type")]
    pub credential_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transports: Option<BTreeSet<AuthenticatorTransport>>,
}

impl PublicKeyCredentialDescriptor {
    pub fn new(id: ByteSequence) -> Self {
        Self {
            id,
            credential_type: PUBLIC_KEY_TYPE.to_string(),
            transports: None,
        }
    }
}

/// Extension inputs keyed by identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtensionInputs(BTreeMap<String, serde_json::Value>);

impl ExtensionInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app_id(mut self, app_id: &AppId) -> Self {
        self.0.insert(
            APPID_EXTENSION.to_string(),
            serde_json::Value::String(app_id.to_string()),
        );
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, value: serde_json::Value) {
        self.0.insert(id.into(), value);
    }

    pub fn app_id(&self) -> Option<AppId> {
        self.0
            .get(APPID_EXTENSION)
            .and_then(|v| v.as_str())
            .and_then(|s| AppId::new(s).ok())
    }

    pub fn ids(&self) -> BTreeSet<String> {
        self.0.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Options for `navigator.credentials.create()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialCreationOptions {
    rp: RelyingPartyIdentity,
    user: UserIdentity,
    challenge: ByteSequence,
    pub_key_cred_params: Vec<PublicKeyCredentialParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exclude_credentials: Option<BTreeSet<PublicKeyCredentialDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    authenticator_selection: Option<AuthenticatorSelectionCriteria>,
    #[serde(default)]
    attestation: AttestationConveyancePreference,
    #[serde(default, skip_serializing_if = "ExtensionInputs::is_empty")]
    extensions: ExtensionInputs,
}

/// Everything needed to build [`CredentialCreationOptions`] apart from the
/// relying party and the challenge.
#[derive(Debug, Clone)]
pub(crate) struct CreationParts {
    pub rp: RelyingPartyIdentity,
    pub user: UserIdentity,
    pub challenge: ByteSequence,
    pub pub_key_cred_params: Vec<PublicKeyCredentialParameters>,
    pub timeout: Option<Duration>,
    pub exclude_credentials: Option<BTreeSet<PublicKeyCredentialDescriptor>>,
    pub authenticator_selection: Option<AuthenticatorSelectionCriteria>,
    pub attestation: AttestationConveyancePreference,
    pub extensions: ExtensionInputs,
}

impl CredentialCreationOptions {
    pub(crate) fn build(parts: CreationParts) -> Result<Self> {
        if parts.rp.id.is_empty() {
            return Err(KeywardError::InvalidConfig("RP ID must not be empty".into()));
        }
        if parts.user.id.is_empty() || parts.user.id.len() > MAX_USER_HANDLE_LEN {
            return Err(KeywardError::InvalidConfig(format!(
                "user handle must be 1 to {} bytes",
                MAX_USER_HANDLE_LEN
            )));
        }
        if parts.user.name.is_empty() {
            return Err(KeywardError::InvalidConfig("user name must not be empty".into()));
        }
        check_challenge(&parts.challenge)?;
        if parts.pub_key_cred_params.is_empty() {
            return Err(KeywardError::InvalidConfig(
                "at least one credential algorithm is required".into(),
            ));
        }

        Ok(Self {
            rp: parts.rp,
            user: parts.user,
            challenge: parts.challenge,
            pub_key_cred_params: parts.pub_key_cred_params,
            timeout: parts.timeout.map(duration_millis),
            exclude_credentials: parts.exclude_credentials,
            authenticator_selection: parts.authenticator_selection,
            attestation: parts.attestation,
            extensions: parts.extensions,
        })
    }

    pub fn rp(&self) -> &RelyingPartyIdentity {
        &self.rp
    }

    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    pub fn challenge(&self) -> &ByteSequence {
        &self.challenge
    }

    pub fn pub_key_cred_params(&self) -> &[PublicKeyCredentialParameters] {
        &self.pub_key_cred_params
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_millis)
    }

    pub fn exclude_credentials(&self) -> Option<&BTreeSet<PublicKeyCredentialDescriptor>> {
        self.exclude_credentials.as_ref()
    }

    pub fn authenticator_selection(&self) -> Option<&AuthenticatorSelectionCriteria> {
        self.authenticator_selection.as_ref()
    }

    pub fn attestation(&self) -> AttestationConveyancePreference {
        self.attestation
    }

    pub fn extensions(&self) -> &ExtensionInputs {
        &self.extensions
    }

    pub fn user_verification(&self) -> UserVerificationRequirement {
        self.authenticator_selection
            .as_ref()
            .map(|s| s.user_verification)
            .unwrap_or_default()
    }
}

/// Options for `navigator.credentials.get()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionOptions {
    challenge: ByteSequence,
    rp_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    allow_credentials: Option<BTreeSet<PublicKeyCredentialDescriptor>>,
    #[serde(default)]
    user_verification: UserVerificationRequirement,
    #[serde(default, skip_serializing_if = "ExtensionInputs::is_empty")]
    extensions: ExtensionInputs,
    /// Account the assertion was started for, when known. Not sent to clients.
    #[serde(default, skip_serializing)]
    user_handle: Option<ByteSequence>,
}

#[derive(Debug, Clone)]
pub(crate) struct AssertionParts {
    pub challenge: ByteSequence,
    pub rp_id: String,
    pub timeout: Option<Duration>,
    pub allow_credentials: Option<BTreeSet<PublicKeyCredentialDescriptor>>,
    pub user_verification: UserVerificationRequirement,
    pub extensions: ExtensionInputs,
    pub user_handle: Option<ByteSequence>,
}

impl AssertionOptions {
    pub(crate) fn build(parts: AssertionParts) -> Result<Self> {
        if parts.rp_id.is_empty() {
            return Err(KeywardError::InvalidConfig("RP ID must not be empty".into()));
        }
        check_challenge(&parts.challenge)?;
        Ok(Self {
            challenge: parts.challenge,
            rp_id: parts.rp_id,
            timeout: parts.timeout.map(duration_millis),
            allow_credentials: parts.allow_credentials,
            user_verification: parts.user_verification,
            extensions: parts.extensions,
            user_handle: parts.user_handle,
        })
    }

    pub fn challenge(&self) -> &ByteSequence {
        &self.challenge
    }

    pub fn rp_id(&self) -> &str {
        &self.rp_id
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_millis)
    }

    pub fn allow_credentials(&self) -> Option<&BTreeSet<PublicKeyCredentialDescriptor>> {
        self.allow_credentials.as_ref()
    }

    pub fn user_verification(&self) -> UserVerificationRequirement {
        self.user_verification
    }

    pub fn extensions(&self) -> &ExtensionInputs {
        &self.extensions
    }

    pub fn user_handle(&self) -> Option<&ByteSequence> {
        self.user_handle.as_ref()
    }
}

fn check_challenge(challenge: &ByteSequence) -> Result<()> {
    if challenge.len() < MIN_CHALLENGE_LENGTH {
        return Err(KeywardError::InvalidConfig(format!(
            "challenge must be at least {} bytes, got {}",
            MIN_CHALLENGE_LENGTH,
            challenge.len()
        )));
    }
    Ok(())
}

fn duration_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

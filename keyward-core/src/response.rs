//! Client responses as produced by `navigator.credentials`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::appid::APPID_EXTENSION;
use crate::bytes::ByteSequence;
use crate::options::PUBLIC_KEY_TYPE;

fn public_key_type() -> String {
    PUBLIC_KEY_TYPE.to_string()
}

/// Client extension outputs keyed by identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientExtensionOutputs(BTreeMap<String, serde_json::Value>);

impl ClientExtensionOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, value: serde_json::Value) {
        self.0.insert(id.into(), value);
    }

    pub fn ids(&self) -> BTreeSet<String> {
        self.0.keys().cloned().collect()
    }

    /// Whether the client reports having used the AppID for this assertion.
    pub fn app_id_used(&self) -> bool {
        self.0
            .get(APPID_EXTENSION)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAttestationResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: ByteSequence,
    pub attestation_object: ByteSequence,
}

/// Response to a registration ceremony.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationCredential {
    pub id: ByteSequence,
    #[serde(rename = "type", default = "public_key_type")]
    pub credential_type: String,
    pub response: AuthenticatorAttestationResponse,
    #[serde(default)]
    pub client_extension_results: ClientExtensionOutputs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAssertionResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: ByteSequence,
    pub authenticator_data: ByteSequence,
    pub signature: ByteSequence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<ByteSequence>,
}

/// Response to an assertion ceremony.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionCredential {
    pub id: ByteSequence,
    #[serde(rename = "type", default = "public_key_type")]
    pub credential_type: String,
    pub response: AuthenticatorAssertionResponse,
    #[serde(default)]
    pub client_extension_results: ClientExtensionOutputs,
}

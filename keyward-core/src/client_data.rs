//! Collected client data parsing and validation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::bytes::ByteSequence;
use crate::error::{ClientDataMismatch, KeywardError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyType {
    Create,
    Get,
}

impl CeremonyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "webauthn.create",
            Self::Get => "webauthn.get",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenBindingStatus {
    Present,
    Supported,
    NotSupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBinding {
    pub status: TokenBindingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Client data JSON as sent by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedClientData {
    #[serde(rename = "type")]
    pub ceremony_type: String,
    pub challenge: String,
    pub origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_binding: Option<TokenBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_origin: Option<bool>,
}

/// Parsed client data together with the exact bytes that were hashed.
#[derive(Debug, Clone)]
pub struct ClientData {
    raw: ByteSequence,
    collected: CollectedClientData,
}

impl ClientData {
    pub fn parse(raw: &ByteSequence) -> Result<Self> {
        let collected = serde_json::from_slice(raw.as_bytes())
            .map_err(|e| KeywardError::malformed(format!("client data JSON: {}", e)))?;
        Ok(Self {
            raw: raw.clone(),
            collected,
        })
    }

    pub fn raw(&self) -> &ByteSequence {
        &self.raw
    }

    pub fn collected(&self) -> &CollectedClientData {
        &self.collected
    }
}

/// Ordered client data checks: type, challenge, origin, token binding.
#[derive(Debug, Clone, Copy)]
pub struct ClientDataValidator<'a> {
    pub expected_type: CeremonyType,
    pub expected_challenge: &'a ByteSequence,
    pub origins: &'a BTreeSet<String>,
    pub allow_missing_token_binding: bool,
}

impl ClientDataValidator<'_> {
    pub fn validate(&self, client: &CollectedClientData) -> Result<()> {
        if client.ceremony_type != self.expected_type.as_str() {
            return Err(ClientDataMismatch::Type {
                expected: self.expected_type.as_str().to_string(),
                actual: client.ceremony_type.clone(),
            }
            .into());
        }

        match ByteSequence::from_base64url(&client.challenge) {
            Ok(challenge) if &challenge == self.expected_challenge => {}
            _ => return Err(ClientDataMismatch::Challenge.into()),
        }

        if !self.origins.contains(&client.origin) {
            return Err(ClientDataMismatch::Origin(client.origin.clone()).into());
        }

        match &client.token_binding {
            Some(binding) if binding.status == TokenBindingStatus::Present => {
                if binding.id.as_deref().map_or(true, str::is_empty) {
                    return Err(ClientDataMismatch::TokenBindingIdMissing.into());
                }
            }
            Some(_) => {}
            None if self.allow_missing_token_binding => {}
            None => return Err(ClientDataMismatch::TokenBindingMissing.into()),
        }

        Ok(())
    }
}

//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use dashmap::DashMap;
use keyward_core::{
    AssertionOptions, AttestationTrustResolver, CredentialCreationOptions, EmptyTrustResolver,
    InMemoryCredentialRepository, KeywardError, PendingRequestStore, RelyingParty,
    StaticTrustResolver, UserIdentity,
};

use crate::config::Config;

/// A registration awaiting `/register/finish`.
#[derive(Debug, Clone)]
pub struct PendingRegistration {
    pub username: String,
    pub nickname: Option<String>,
    pub options: CredentialCreationOptions,
}

/// An authentication awaiting `/authenticate/finish`.
#[derive(Debug, Clone)]
pub struct PendingAssertion {
    pub username: Option<String>,
    pub options: AssertionOptions,
}

/// Application state containing shared resources.
pub struct AppState {
    /// Ceremony verification engine
    pub relying_party: RelyingParty,
    /// Registered credentials, shared with the relying party
    pub credentials: Arc<InMemoryCredentialRepository>,
    /// Accounts by username
    pub users: DashMap<String, UserIdentity>,
    pub pending_registrations: PendingRequestStore<PendingRegistration>,
    pub pending_assertions: PendingRequestStore<PendingAssertion>,
}

impl AppState {
    /// Build state with in-memory storage from server configuration
    pub fn new(config: &Config) -> Result<Self, KeywardError> {
        let credentials = Arc::new(InMemoryCredentialRepository::new());
        let relying_party = RelyingParty::builder(config.relying_party()?, credentials.clone())
            .with_trust_resolver(trust_resolver(config)?)
            .build()?;

        Ok(Self {
            relying_party,
            credentials,
            users: DashMap::new(),
            pending_registrations: PendingRequestStore::new(config.ceremony_ttl()),
            pending_assertions: PendingRequestStore::new(config.ceremony_ttl()),
        })
    }

    /// Drop expired pending ceremonies. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        self.pending_registrations.cleanup_expired() + self.pending_assertions.cleanup_expired()
    }
}

/// Anchors from `WEBAUTHN_TRUST_ANCHORS` plus the built-in AAGUID table when
/// attestation is requested; otherwise nothing is trusted.
fn trust_resolver(config: &Config) -> Result<Arc<dyn AttestationTrustResolver>, KeywardError> {
    if !config.resolves_attestation_trust() {
        return Ok(Arc::new(EmptyTrustResolver));
    }

    let mut resolver = StaticTrustResolver::new();
    for path in &config.trust_anchor_paths {
        let der = std::fs::read(path).map_err(|e| {
            KeywardError::InvalidConfig(format!("trust anchor {}: {}", path, e))
        })?;
        resolver = resolver.with_anchor(der, None)?;
    }
    tracing::info!(
        anchors = resolver.anchor_count(),
        attestation = ?config.attestation,
        "Attestation trust resolution enabled"
    );
    Ok(Arc::new(resolver))
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("relying_party", &self.relying_party)
            .field("users", &self.users.len())
            .field("pending_registrations", &self.pending_registrations.len())
            .field("pending_assertions", &self.pending_assertions.len())
            .finish()
    }
}

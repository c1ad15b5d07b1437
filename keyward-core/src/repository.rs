//! Credential storage contract and an in-memory implementation.
//!
//! The ceremony pipeline only reads credentials and bumps signature
//! counters; persisting new registrations is left to the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::attestation::AttestationType;
use crate::bytes::ByteSequence;
use crate::error::{KeywardError, Result};
use crate::options::UserIdentity;
use crate::relying_party::RegistrationResult;
use crate::trust::AttestationMetadata;

/// What an assertion needs to know about a registered credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub credential_id: ByteSequence,
    pub public_key_cose: ByteSequence,
    pub user_handle: ByteSequence,
    pub signature_counter: u32,
}

/// A credential bound to a user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRegistration {
    pub user: UserIdentity,
    pub credential_id: ByteSequence,
    pub public_key_cose: ByteSequence,
    pub signature_counter: u32,
    pub registration_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    pub attestation_type: AttestationType,
    pub attestation_trusted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation_metadata: Option<AttestationMetadata>,
}

impl CredentialRegistration {
    pub fn new(user: UserIdentity, result: &RegistrationResult, nickname: Option<String>) -> Self {
        Self {
            user,
            credential_id: result.credential_id().clone(),
            public_key_cose: result.public_key_cose().clone(),
            signature_counter: result.signature_counter(),
            registration_time: Utc::now(),
            nickname,
            attestation_type: result.attestation_type(),
            attestation_trusted: result.attestation_trusted(),
            attestation_metadata: result.attestation_metadata().cloned(),
        }
    }

    pub fn to_stored(&self) -> StoredCredential {
        StoredCredential {
            credential_id: self.credential_id.clone(),
            public_key_cose: self.public_key_cose.clone(),
            user_handle: self.user.id.clone(),
            signature_counter: self.signature_counter,
        }
    }
}

/// Read access to registered credentials plus atomic counter updates.
///
/// `update_signature_counter` must be atomic per credential ID.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn lookup_credential(&self, credential_id: &ByteSequence)
        -> Result<Option<StoredCredential>>;

    async fn credential_id_exists(&self, credential_id: &ByteSequence) -> Result<bool>;

    async fn update_signature_counter(
        &self,
        credential_id: &ByteSequence,
        new_counter: u32,
    ) -> Result<()>;
}

/// DashMap-backed repository. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryCredentialRepository {
    credentials: DashMap<ByteSequence, CredentialRegistration>,
}

impl InMemoryCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a registration, refusing to overwrite an existing credential ID.
    pub fn add_registration(&self, registration: CredentialRegistration) -> Result<()> {
        match self.credentials.entry(registration.credential_id.clone()) {
            Entry::Occupied(_) => Err(KeywardError::CredentialIdInUse),
            Entry::Vacant(slot) => {
                slot.insert(registration);
                Ok(())
            }
        }
    }

    pub fn get(&self, credential_id: &ByteSequence) -> Option<CredentialRegistration> {
        self.credentials.get(credential_id).map(|r| r.value().clone())
    }

    pub fn registrations_for_user(&self, user_handle: &ByteSequence) -> Vec<CredentialRegistration> {
        let mut found: Vec<_> = self
            .credentials
            .iter()
            .filter(|r| &r.user.id == user_handle)
            .map(|r| r.value().clone())
            .collect();
        found.sort_by(|a, b| a.registration_time.cmp(&b.registration_time));
        found
    }

    pub fn remove(&self, credential_id: &ByteSequence) -> Option<CredentialRegistration> {
        self.credentials.remove(credential_id).map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

#[async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn lookup_credential(
        &self,
        credential_id: &ByteSequence,
    ) -> Result<Option<StoredCredential>> {
        Ok(self.credentials.get(credential_id).map(|r| r.to_stored()))
    }

    async fn credential_id_exists(&self, credential_id: &ByteSequence) -> Result<bool> {
        Ok(self.credentials.contains_key(credential_id))
    }

    async fn update_signature_counter(
        &self,
        credential_id: &ByteSequence,
        new_counter: u32,
    ) -> Result<()> {
        // get_mut holds the shard lock, so racing updates never lose the
        // higher value.
        let mut registration = self
            .credentials
            .get_mut(credential_id)
            .ok_or_else(|| KeywardError::UnknownCredential(credential_id.clone()))?;
        registration.signature_counter = registration.signature_counter.max(new_counter);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryCredentialRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCredentialRepository")
            .field("credentials", &self.credentials.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn registration(id: u8, user: u8) -> CredentialRegistration {
        CredentialRegistration {
            user: UserIdentity {
                id: ByteSequence::from([user; 16]),
                name: format!("user-{}", user),
                display_name: format!("User {}", user),
            },
            credential_id: ByteSequence::from([id; 16]),
            public_key_cose: ByteSequence::from([0xA5u8; 8]),
            signature_counter: 1,
            registration_time: Utc::now(),
            nickname: None,
            attestation_type: AttestationType::None,
            attestation_trusted: false,
            attestation_metadata: None,
        }
    }

    #[tokio::test]
    async fn test_lookup_and_exists() {
        let repo = InMemoryCredentialRepository::new();
        repo.add_registration(registration(1, 9)).unwrap();

        let id = ByteSequence::from([1u8; 16]);
        assert!(repo.credential_id_exists(&id).await.unwrap());
        let stored = repo.lookup_credential(&id).await.unwrap().unwrap();
        assert_eq!(stored.user_handle, ByteSequence::from([9u8; 16]));
        assert_eq!(stored.signature_counter, 1);

        let missing = ByteSequence::from([2u8; 16]);
        assert!(!repo.credential_id_exists(&missing).await.unwrap());
        assert!(repo.lookup_credential(&missing).await.unwrap().is_none());
    }

    #[test]
    fn test_duplicate_credential_rejected() {
        let repo = InMemoryCredentialRepository::new();
        repo.add_registration(registration(1, 1)).unwrap();
        assert_eq!(
            repo.add_registration(registration(1, 2)),
            Err(KeywardError::CredentialIdInUse)
        );
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_counter_update_is_monotonic_under_races() {
        let repo = Arc::new(InMemoryCredentialRepository::new());
        repo.add_registration(registration(1, 1)).unwrap();
        let id = ByteSequence::from([1u8; 16]);

        let handles: Vec<_> = (2..50u32)
            .map(|counter| {
                let repo = repo.clone();
                let id = id.clone();
                tokio::spawn(async move { repo.update_signature_counter(&id, counter).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(repo.get(&id).unwrap().signature_counter, 49);
    }

    #[tokio::test]
    async fn test_counter_update_unknown_credential() {
        let repo = InMemoryCredentialRepository::new();
        let id = ByteSequence::from([7u8; 16]);
        assert_eq!(
            repo.update_signature_counter(&id, 3).await,
            Err(KeywardError::UnknownCredential(id.clone()))
        );
    }

    #[test]
    fn test_registrations_for_user() {
        let repo = InMemoryCredentialRepository::new();
        repo.add_registration(registration(1, 1)).unwrap();
        repo.add_registration(registration(2, 1)).unwrap();
        repo.add_registration(registration(3, 2)).unwrap();
        assert_eq!(
            repo.registrations_for_user(&ByteSequence::from([1u8; 16])).len(),
            2
        );
    }
}

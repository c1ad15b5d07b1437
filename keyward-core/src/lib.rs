//! Keyward Core - WebAuthn relying party ceremony verification
//!
//! This crate verifies the two WebAuthn ceremonies on the relying party
//! side: registration (binding a new authenticator key to an account) and
//! assertion (proving possession of a registered key).
//!
//! # Features
//!
//! - ES256 (ECDSA P-256 / SHA-256) credential keys in COSE form
//! - `packed`, `fido-u2f` and `none` attestation statements
//! - Pluggable trust resolution, credential storage and challenge generation
//! - U2F AppID extension for credentials registered through the U2F API
//! - Signature counter policy with clone detection warnings
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use keyward_core::{
//!     InMemoryCredentialRepository, RelyingParty, RelyingPartyConfig, RelyingPartyIdentity,
//!     StartRegistrationOptions, UserIdentity,
//! };
//!
//! # async fn example(response: keyward_core::RegistrationCredential) -> keyward_core::Result<()> {
//! let identity = RelyingPartyIdentity {
//!     id: "example.com".into(),
//!     name: "Example".into(),
//! };
//! let config = RelyingPartyConfig::new(identity, ["https://example.com"]);
//! let repository = Arc::new(InMemoryCredentialRepository::new());
//! let rp = RelyingParty::builder(config, repository).build()?;
//!
//! let user = UserIdentity {
//!     id: rp.generate_user_handle()?,
//!     name: "alice".into(),
//!     display_name: "Alice".into(),
//! };
//! let options = rp.start_registration(StartRegistrationOptions::new(user))?;
//!
//! // Send `options` to the browser, receive `response` back
//! let result = rp.finish_registration(&options, &response).await?;
//! println!("registered {}", result.credential_id());
//! # Ok(())
//! # }
//! ```

pub mod appid;
pub mod attestation;
pub mod authenticator_data;
pub mod bytes;
pub mod challenge;
pub mod client_data;
pub mod cose;
pub mod counter;
pub mod crypto;
pub mod error;
pub mod extensions;
pub mod options;
pub mod relying_party;
pub mod repository;
pub mod request_store;
pub mod response;
pub mod trust;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// Re-export main types for convenience
pub use appid::AppId;
pub use attestation::{AttestationFormat, AttestationObject, AttestationType};
pub use authenticator_data::{AttestedCredentialData, AuthenticatorData, AuthenticatorFlags};
pub use bytes::ByteSequence;
pub use challenge::{ChallengeGenerator, RandomChallengeGenerator, SeededChallengeGenerator};
pub use client_data::{CeremonyType, CollectedClientData};
pub use cose::{CoseAlgorithm, CosePublicKey};
pub use counter::{CounterVerdict, SignatureCounterPolicy};
pub use crypto::{CryptoContext, PublicKeyHandle};
pub use error::{ClientDataMismatch, KeywardError, Result, MIN_CHALLENGE_LENGTH};
pub use extensions::ExtensionLocation;
pub use options::{
    AssertionOptions, AttestationConveyancePreference, AuthenticatorAttachment,
    AuthenticatorSelectionCriteria, AuthenticatorTransport, CredentialCreationOptions,
    ExtensionInputs, PublicKeyCredentialDescriptor, PublicKeyCredentialParameters,
    RelyingPartyIdentity, UserIdentity, UserVerificationRequirement,
};
pub use relying_party::{
    AssertionResult, RegistrationResult, RelyingParty, RelyingPartyBuilder, RelyingPartyConfig,
    StartAssertionOptions, StartRegistrationOptions,
};
pub use repository::{
    CredentialRegistration, CredentialRepository, InMemoryCredentialRepository, StoredCredential,
};
pub use request_store::{PendingRequestStore, RequestId, DEFAULT_REQUEST_TTL, MAX_REQUEST_TTL};
pub use response::{AssertionCredential, ClientExtensionOutputs, RegistrationCredential};
pub use trust::{
    AttestationMetadata, AttestationTrustResolver, EmptyTrustResolver, StaticTrustResolver,
    TrustVerdict,
};

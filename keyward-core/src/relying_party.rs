//! Registration and assertion ceremonies.
//!
//! A [`RelyingParty`] is stateless between calls: `start_*` returns options
//! the caller stores (see [`PendingRequestStore`](crate::PendingRequestStore))
//! and re-presents to `finish_*`. Each finish call runs its checks in a
//! fixed order and stops at the first failure.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::appid::AppId;
use crate::attestation::{AttestationObject, AttestationStatementVerifier, AttestationType};
use crate::authenticator_data::AuthenticatorData;
use crate::bytes::ByteSequence;
use crate::challenge::{ChallengeGenerator, RandomChallengeGenerator};
use crate::client_data::{CeremonyType, ClientData, ClientDataValidator};
use crate::cose::{CoseAlgorithm, CosePublicKey};
use crate::counter::{CounterVerdict, SignatureCounterPolicy};
use crate::crypto::CryptoContext;
use crate::error::{KeywardError, Result};
use crate::extensions::validate_extensions;
use crate::options::{
    AssertionOptions, AssertionParts, AttestationConveyancePreference,
    AuthenticatorSelectionCriteria, CreationParts, CredentialCreationOptions, ExtensionInputs,
    PublicKeyCredentialDescriptor, PublicKeyCredentialParameters, RelyingPartyIdentity,
    UserIdentity, UserVerificationRequirement,
};
use crate::repository::CredentialRepository;
use crate::response::{AssertionCredential, ClientExtensionOutputs, RegistrationCredential};
use crate::trust::{AttestationMetadata, AttestationTrustResolver, EmptyTrustResolver, TrustVerdict};

/// Relying party settings. Every optional behaviour has a documented default.
#[derive(Debug, Clone)]
pub struct RelyingPartyConfig {
    pub identity: RelyingPartyIdentity,
    /// Exact origins (scheme, host, port) accepted in client data.
    pub origins: BTreeSet<String>,
    /// Offered in `pubKeyCredParams`, in preference order. Default: ES256.
    pub allowed_algorithms: Vec<PublicKeyCredentialParameters>,
    /// Default: `none`.
    pub attestation_preference: AttestationConveyancePreference,
    /// U2F AppID offered to clients during assertion. Default: none.
    pub app_id: Option<AppId>,
    /// Ceremony timeout hint sent to clients. Default: none.
    pub timeout: Option<Duration>,
    /// Accept client data without token binding information. Default: false.
    pub allow_missing_token_binding: bool,
    /// Accept attestation the trust resolver does not vouch for. Default: true.
    pub allow_untrusted_attestation: bool,
    /// Downgrade unrequested extension outputs to warnings. Default: false.
    pub allow_unrequested_extensions: bool,
    /// Fail assertions whose signature counter regressed. Default: false.
    pub counter_regression_is_fatal: bool,
}

impl RelyingPartyConfig {
    pub fn new<I, S>(identity: RelyingPartyIdentity, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identity,
            origins: origins.into_iter().map(Into::into).collect(),
            allowed_algorithms: vec![PublicKeyCredentialParameters::es256()],
            attestation_preference: AttestationConveyancePreference::None,
            app_id: None,
            timeout: None,
            allow_missing_token_binding: false,
            allow_untrusted_attestation: true,
            allow_unrequested_extensions: false,
            counter_regression_is_fatal: false,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.identity.id.is_empty() {
            return Err(KeywardError::InvalidConfig("RP ID must not be empty".into()));
        }
        if self.origins.is_empty() {
            return Err(KeywardError::InvalidConfig(
                "at least one accepted origin is required".into(),
            ));
        }
        for origin in &self.origins {
            Url::parse(origin).map_err(|e| {
                KeywardError::InvalidConfig(format!("origin {} is not a valid URL: {}", origin, e))
            })?;
        }
        if self.allowed_algorithms.is_empty() {
            return Err(KeywardError::InvalidConfig(
                "at least one credential algorithm is required".into(),
            ));
        }
        for params in &self.allowed_algorithms {
            CoseAlgorithm::from_id(params.alg).map_err(|_| {
                KeywardError::InvalidConfig(format!("algorithm {} cannot be verified", params.alg))
            })?;
        }
        Ok(())
    }
}

/// Per-ceremony inputs to [`RelyingParty::start_registration`].
#[derive(Debug, Clone)]
pub struct StartRegistrationOptions {
    pub user: UserIdentity,
    /// Default: none, any authenticator with preferred user verification.
    pub authenticator_selection: Option<AuthenticatorSelectionCriteria>,
    /// Credentials the user already owns. Default: none.
    pub exclude_credentials: Option<BTreeSet<PublicKeyCredentialDescriptor>>,
    /// Default: no extensions.
    pub extensions: Option<ExtensionInputs>,
    /// Default: the relying party timeout.
    pub timeout: Option<Duration>,
}

impl StartRegistrationOptions {
    pub fn new(user: UserIdentity) -> Self {
        Self {
            user,
            authenticator_selection: None,
            exclude_credentials: None,
            extensions: None,
            timeout: None,
        }
    }
}

/// Per-ceremony inputs to [`RelyingParty::start_assertion`].
#[derive(Debug, Clone, Default)]
pub struct StartAssertionOptions {
    /// Account being authenticated, when known. Default: any account.
    pub user_handle: Option<ByteSequence>,
    /// Default: any credential the authenticator holds for this RP.
    pub allow_credentials: Option<BTreeSet<PublicKeyCredentialDescriptor>>,
    /// Default: preferred.
    pub user_verification: Option<UserVerificationRequirement>,
    /// Default: the AppID extension when an AppID is configured.
    pub extensions: Option<ExtensionInputs>,
    /// Default: the relying party timeout.
    pub timeout: Option<Duration>,
}

/// A verified registration. Only [`RelyingParty::finish_registration`]
/// produces these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationResult {
    key_id: PublicKeyCredentialDescriptor,
    public_key_cose: ByteSequence,
    aaguid: String,
    attestation_type: AttestationType,
    attestation_trusted: bool,
    attestation_metadata: Option<AttestationMetadata>,
    signature_counter: u32,
    warnings: Vec<String>,
}

impl RegistrationResult {
    pub fn key_id(&self) -> &PublicKeyCredentialDescriptor {
        &self.key_id
    }

    pub fn credential_id(&self) -> &ByteSequence {
        &self.key_id.id
    }

    pub fn public_key_cose(&self) -> &ByteSequence {
        &self.public_key_cose
    }

    pub fn aaguid(&self) -> &str {
        &self.aaguid
    }

    pub fn attestation_type(&self) -> AttestationType {
        self.attestation_type
    }

    pub fn attestation_trusted(&self) -> bool {
        self.attestation_trusted
    }

    pub fn attestation_metadata(&self) -> Option<&AttestationMetadata> {
        self.attestation_metadata.as_ref()
    }

    pub fn signature_counter(&self) -> u32 {
        self.signature_counter
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// A verified assertion. Only [`RelyingParty::finish_assertion`] produces these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionResult {
    success: bool,
    credential_id: ByteSequence,
    user_handle: ByteSequence,
    signature_counter: u32,
    signature_counter_valid: bool,
    warnings: Vec<String>,
}

impl AssertionResult {
    pub fn success(&self) -> bool {
        self.success
    }

    pub fn credential_id(&self) -> &ByteSequence {
        &self.credential_id
    }

    pub fn user_handle(&self) -> &ByteSequence {
        &self.user_handle
    }

    pub fn signature_counter(&self) -> u32 {
        self.signature_counter
    }

    /// False when the counter regressed and the policy only warned.
    pub fn signature_counter_valid(&self) -> bool {
        self.signature_counter_valid
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

pub struct RelyingPartyBuilder {
    config: RelyingPartyConfig,
    repository: Arc<dyn CredentialRepository>,
    crypto: CryptoContext,
    trust_resolver: Option<Arc<dyn AttestationTrustResolver>>,
    challenges: Option<Arc<dyn ChallengeGenerator>>,
}

impl RelyingPartyBuilder {
    pub fn with_crypto(mut self, crypto: CryptoContext) -> Self {
        self.crypto = crypto;
        self
    }

    /// Default: [`EmptyTrustResolver`].
    pub fn with_trust_resolver(mut self, resolver: Arc<dyn AttestationTrustResolver>) -> Self {
        self.trust_resolver = Some(resolver);
        self
    }

    /// Default: [`RandomChallengeGenerator`].
    pub fn with_challenge_generator(mut self, generator: Arc<dyn ChallengeGenerator>) -> Self {
        self.challenges = Some(generator);
        self
    }

    pub fn build(self) -> Result<RelyingParty> {
        self.config.validate()?;
        Ok(RelyingParty {
            counter_policy: SignatureCounterPolicy::new(self.config.counter_regression_is_fatal),
            attestation_verifier: AttestationStatementVerifier::new(self.crypto),
            crypto: self.crypto,
            repository: self.repository,
            trust_resolver: self
                .trust_resolver
                .unwrap_or_else(|| Arc::new(EmptyTrustResolver)),
            challenges: self
                .challenges
                .unwrap_or_else(|| Arc::new(RandomChallengeGenerator::new())),
            config: self.config,
        })
    }
}

pub struct RelyingParty {
    config: RelyingPartyConfig,
    crypto: CryptoContext,
    repository: Arc<dyn CredentialRepository>,
    trust_resolver: Arc<dyn AttestationTrustResolver>,
    challenges: Arc<dyn ChallengeGenerator>,
    counter_policy: SignatureCounterPolicy,
    attestation_verifier: AttestationStatementVerifier,
}

impl RelyingParty {
    pub fn builder(
        config: RelyingPartyConfig,
        repository: Arc<dyn CredentialRepository>,
    ) -> RelyingPartyBuilder {
        RelyingPartyBuilder {
            config,
            repository,
            crypto: CryptoContext::new(),
            trust_resolver: None,
            challenges: None,
        }
    }

    pub fn config(&self) -> &RelyingPartyConfig {
        &self.config
    }

    /// Fresh random user handle for a new account.
    pub fn generate_user_handle(&self) -> Result<ByteSequence> {
        self.challenges.generate_challenge()
    }

    pub fn start_registration(
        &self,
        options: StartRegistrationOptions,
    ) -> Result<CredentialCreationOptions> {
        let challenge = self.challenges.generate_challenge()?;
        CredentialCreationOptions::build(CreationParts {
            rp: self.config.identity.clone(),
            user: options.user,
            challenge,
            pub_key_cred_params: self.config.allowed_algorithms.clone(),
            timeout: options.timeout.or(self.config.timeout),
            exclude_credentials: options.exclude_credentials,
            authenticator_selection: options.authenticator_selection,
            attestation: self.config.attestation_preference,
            extensions: options.extensions.unwrap_or_default(),
        })
    }

    pub fn start_assertion(&self, options: StartAssertionOptions) -> Result<AssertionOptions> {
        let challenge = self.challenges.generate_challenge()?;
        let extensions = options.extensions.unwrap_or_else(|| match &self.config.app_id {
            Some(app_id) => ExtensionInputs::new().with_app_id(app_id),
            None => ExtensionInputs::new(),
        });
        AssertionOptions::build(AssertionParts {
            challenge,
            rp_id: self.config.identity.id.clone(),
            timeout: options.timeout.or(self.config.timeout),
            allow_credentials: options.allow_credentials,
            user_verification: options.user_verification.unwrap_or_default(),
            extensions,
            user_handle: options.user_handle,
        })
    }

    #[tracing::instrument(skip_all, fields(credential_id = %response.id))]
    pub async fn finish_registration(
        &self,
        options: &CredentialCreationOptions,
        response: &RegistrationCredential,
    ) -> Result<RegistrationResult> {
        let client_data = ClientData::parse(&response.response.client_data_json)?;
        let attestation =
            AttestationObject::from_cbor(response.response.attestation_object.as_bytes())?;

        self.client_data_validator(CeremonyType::Create, options.challenge())
            .validate(client_data.collected())?;
        tracing::debug!("Client data verified");

        let auth_data = AuthenticatorData::parse(attestation.authenticator_data().as_bytes())?;
        auth_data.verify_rp_id(&self.crypto, &options.rp().id)?;
        check_user_flags(&auth_data, options.user_verification())?;
        let attested = auth_data
            .attested_credential_data
            .as_ref()
            .ok_or(KeywardError::MissingAttestedCredentialData)?;
        if attested.credential_id != response.id {
            return Err(KeywardError::malformed(
                "credential ID does not match the attested credential data",
            ));
        }
        let credential_key = CosePublicKey::from_cbor(attested.public_key_cose.as_bytes())?;
        credential_key.to_public_key(&self.crypto)?;
        let alg = credential_key.algorithm().id();
        if !options.pub_key_cred_params().iter().any(|p| p.alg == alg) {
            return Err(KeywardError::AlgorithmNotRequested(alg));
        }

        if self
            .repository
            .credential_id_exists(&attested.credential_id)
            .await?
        {
            return Err(KeywardError::CredentialIdInUse);
        }

        let client_data_hash = self.crypto.hash(client_data.raw().as_bytes());
        let verified = self
            .attestation_verifier
            .verify(&attestation, &auth_data, &client_data_hash)?;

        let verdict = if verified.trust_path.is_empty()
            || verified.attestation_type == AttestationType::SelfAttestation
        {
            TrustVerdict::untrusted()
        } else {
            self.trust_resolver
                .resolve_trust(&verified.trust_path)
                .await?
        };
        let mut warnings = Vec::new();
        if !verdict.trusted {
            if !self.config.allow_untrusted_attestation {
                return Err(KeywardError::UntrustedAttestation);
            }
            tracing::warn!(
                attestation_type = ?verified.attestation_type,
                "Accepting untrusted attestation"
            );
        }

        self.check_extensions(
            options.extensions(),
            &response.client_extension_results,
            &auth_data,
            &mut warnings,
        )?;

        tracing::info!(
            attestation_type = ?verified.attestation_type,
            attestation_trusted = verdict.trusted,
            "Registration ceremony completed"
        );

        Ok(RegistrationResult {
            key_id: PublicKeyCredentialDescriptor::new(attested.credential_id.clone()),
            public_key_cose: attested.public_key_cose.clone(),
            aaguid: attested.aaguid_string(),
            attestation_type: verified.attestation_type,
            attestation_trusted: verdict.trusted,
            attestation_metadata: verdict.metadata,
            signature_counter: auth_data.signature_counter,
            warnings,
        })
    }

    #[tracing::instrument(skip_all, fields(credential_id = %response.id))]
    pub async fn finish_assertion(
        &self,
        options: &AssertionOptions,
        response: &AssertionCredential,
    ) -> Result<AssertionResult> {
        let client_data = ClientData::parse(&response.response.client_data_json)?;
        let auth_data_bytes = &response.response.authenticator_data;

        self.client_data_validator(CeremonyType::Get, options.challenge())
            .validate(client_data.collected())?;
        tracing::debug!("Client data verified");

        if let Some(allowed) = options.allow_credentials() {
            if !allowed.is_empty() && !allowed.iter().any(|d| d.id == response.id) {
                return Err(KeywardError::CredentialNotAllowed(response.id.clone()));
            }
        }
        let stored = self
            .repository
            .lookup_credential(&response.id)
            .await?
            .ok_or_else(|| KeywardError::UnknownCredential(response.id.clone()))?;
        let presented_handle = response
            .response
            .user_handle
            .as_ref()
            .filter(|handle| !handle.is_empty());
        for handle in [presented_handle, options.user_handle()].into_iter().flatten() {
            if handle != &stored.user_handle {
                return Err(KeywardError::UserHandleMismatch);
            }
        }

        let auth_data = AuthenticatorData::parse(auth_data_bytes.as_bytes())?;
        self.verify_assertion_rp_id(options, &response.client_extension_results, &auth_data)?;
        check_user_flags(&auth_data, options.user_verification())?;

        let public_key =
            CosePublicKey::from_cbor(stored.public_key_cose.as_bytes())?.to_public_key(&self.crypto)?;
        let client_data_hash = self.crypto.hash(client_data.raw().as_bytes());
        let signed = auth_data_bytes.concat(&client_data_hash);
        if !self.crypto.verify_signature(
            &public_key,
            signed.as_bytes(),
            response.response.signature.as_bytes(),
        ) {
            return Err(KeywardError::InvalidAssertionSignature);
        }
        tracing::debug!("Assertion signature verified");

        let mut warnings = Vec::new();
        let (counter_verdict, counter_warning) = self
            .counter_policy
            .enforce(stored.signature_counter, auth_data.signature_counter)?;
        warnings.extend(counter_warning);

        self.check_extensions(
            options.extensions(),
            &response.client_extension_results,
            &auth_data,
            &mut warnings,
        )?;

        if counter_verdict == CounterVerdict::Advanced {
            if let Err(e) = self
                .repository
                .update_signature_counter(&stored.credential_id, auth_data.signature_counter)
                .await
            {
                tracing::error!(error = %e, "Failed to update signature counter");
                warnings.push(format!("Failed to update signature counter: {}", e));
            }
        }

        tracing::info!(
            signature_counter = auth_data.signature_counter,
            warnings = warnings.len(),
            "Assertion ceremony completed"
        );

        Ok(AssertionResult {
            success: true,
            credential_id: stored.credential_id,
            user_handle: stored.user_handle,
            signature_counter: auth_data.signature_counter,
            signature_counter_valid: !matches!(counter_verdict, CounterVerdict::Regressed { .. }),
            warnings,
        })
    }

    fn client_data_validator<'a>(
        &'a self,
        expected_type: CeremonyType,
        expected_challenge: &'a ByteSequence,
    ) -> ClientDataValidator<'a> {
        ClientDataValidator {
            expected_type,
            expected_challenge,
            origins: &self.config.origins,
            allow_missing_token_binding: self.config.allow_missing_token_binding,
        }
    }

    /// With the AppID extension in use the authenticator scopes the
    /// credential to the AppID instead of the RP ID.
    fn verify_assertion_rp_id(
        &self,
        options: &AssertionOptions,
        client_outputs: &ClientExtensionOutputs,
        auth_data: &AuthenticatorData,
    ) -> Result<()> {
        match options.extensions().app_id() {
            Some(app_id) if client_outputs.app_id_used() => {
                if auth_data.rp_id_hash == self.crypto.hash(app_id.as_str().as_bytes()) {
                    Ok(())
                } else {
                    Err(KeywardError::RpIdMismatch)
                }
            }
            _ => auth_data.verify_rp_id(&self.crypto, options.rp_id()),
        }
    }

    fn check_extensions(
        &self,
        requested: &ExtensionInputs,
        client_outputs: &ClientExtensionOutputs,
        auth_data: &AuthenticatorData,
        warnings: &mut Vec<String>,
    ) -> Result<()> {
        match validate_extensions(&requested.ids(), &client_outputs.ids(), &auth_data.extension_ids()) {
            Err(err @ KeywardError::UnrequestedExtension { .. })
                if self.config.allow_unrequested_extensions =>
            {
                tracing::warn!(error = %err, "Ignoring unrequested extension outputs");
                warnings.push(err.to_string());
                Ok(())
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for RelyingParty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelyingParty")
            .field("rp_id", &self.config.identity.id)
            .field("origins", &self.config.origins)
            .finish()
    }
}

fn check_user_flags(
    auth_data: &AuthenticatorData,
    requirement: UserVerificationRequirement,
) -> Result<()> {
    if !auth_data.flags.user_present {
        return Err(KeywardError::UserNotPresent);
    }
    if requirement == UserVerificationRequirement::Required && !auth_data.flags.user_verified {
        return Err(KeywardError::UserNotVerified);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryCredentialRepository;
    use crate::testing::{SoftAttestation, SoftAuthenticator};

    const ORIGIN: &str = "https://example.com";

    fn config() -> RelyingPartyConfig {
        RelyingPartyConfig::new(
            RelyingPartyIdentity {
                id: "example.com".into(),
                name: "Example".into(),
            },
            [ORIGIN],
        )
    }

    fn build(config: RelyingPartyConfig) -> Result<RelyingParty> {
        RelyingParty::builder(config, Arc::new(InMemoryCredentialRepository::new())).build()
    }

    fn user() -> UserIdentity {
        UserIdentity {
            id: ByteSequence::from([7u8; 16]),
            name: "alice".into(),
            display_name: "Alice".into(),
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = config();
        assert_eq!(config.allowed_algorithms, vec![PublicKeyCredentialParameters::es256()]);
        assert!(config.allow_untrusted_attestation);
        assert!(!config.allow_missing_token_binding);
        assert!(!config.allow_unrequested_extensions);
        assert!(!config.counter_regression_is_fatal);
    }

    #[test]
    fn test_invalid_config_rejected_at_build() {
        let mut no_origins = config();
        no_origins.origins.clear();
        assert!(matches!(build(no_origins), Err(KeywardError::InvalidConfig(_))));

        let mut bad_origin = config();
        bad_origin.origins.insert("not a url".into());
        assert!(matches!(build(bad_origin), Err(KeywardError::InvalidConfig(_))));

        let mut unknown_alg = config();
        unknown_alg.allowed_algorithms = vec![PublicKeyCredentialParameters {
            credential_type: "public-key".into(),
            alg: -257,
        }];
        assert!(matches!(build(unknown_alg), Err(KeywardError::InvalidConfig(_))));
    }

    #[test]
    fn test_start_registration_fills_relying_party_settings() {
        let mut config = config();
        config.timeout = Some(Duration::from_secs(60));
        let rp = build(config).unwrap();

        let options = rp.start_registration(StartRegistrationOptions::new(user())).unwrap();
        assert_eq!(options.rp().id, "example.com");
        assert_eq!(options.pub_key_cred_params()[0].alg, -7);
        assert_eq!(options.timeout(), Some(Duration::from_secs(60)));
        assert!(options.challenge().len() >= crate::error::MIN_CHALLENGE_LENGTH);

        let other = rp.start_registration(StartRegistrationOptions::new(user())).unwrap();
        assert_ne!(options.challenge(), other.challenge(), "Challenges must be fresh");
    }

    #[test]
    fn test_start_assertion_offers_app_id() {
        let mut config = config();
        config.app_id = Some(AppId::new("https://example.com/app-id.json").unwrap());
        let rp = build(config).unwrap();

        let options = rp.start_assertion(StartAssertionOptions::default()).unwrap();
        assert_eq!(
            options.extensions().app_id().unwrap().as_str(),
            "https://example.com/app-id.json"
        );
        assert_eq!(options.rp_id(), "example.com");
    }

    #[tokio::test]
    async fn test_required_user_verification_enforced() {
        let rp = build(config()).unwrap();
        let mut options = StartRegistrationOptions::new(user());
        options.authenticator_selection = Some(AuthenticatorSelectionCriteria {
            user_verification: UserVerificationRequirement::Required,
            ..Default::default()
        });
        let creation = rp.start_registration(options).unwrap();

        let mut authenticator = SoftAuthenticator::new(b"uv");
        let response = authenticator.make_credential(&creation, ORIGIN, &SoftAttestation::None);
        assert_eq!(
            rp.finish_registration(&creation, &response).await,
            Err(KeywardError::UserNotVerified)
        );

        authenticator.set_user_verified(true);
        let response = authenticator.make_credential(&creation, ORIGIN, &SoftAttestation::None);
        assert!(rp.finish_registration(&creation, &response).await.is_ok());
    }

    #[tokio::test]
    async fn test_user_presence_required() {
        let rp = build(config()).unwrap();
        let creation = rp.start_registration(StartRegistrationOptions::new(user())).unwrap();

        let mut authenticator = SoftAuthenticator::new(b"up");
        authenticator.set_user_present(false);
        let response = authenticator.make_credential(&creation, ORIGIN, &SoftAttestation::None);
        assert_eq!(
            rp.finish_registration(&creation, &response).await,
            Err(KeywardError::UserNotPresent)
        );
    }

    #[tokio::test]
    async fn test_unrequested_extension_downgraded_when_allowed() {
        let rp = build(config()).unwrap();
        let creation = rp.start_registration(StartRegistrationOptions::new(user())).unwrap();
        let mut authenticator = SoftAuthenticator::new(b"ext");
        let mut response = authenticator.make_credential(&creation, ORIGIN, &SoftAttestation::None);
        response
            .client_extension_results
            .insert("credProps", serde_json::json!({ "rk": true }));

        assert!(matches!(
            rp.finish_registration(&creation, &response).await,
            Err(KeywardError::UnrequestedExtension {
                location: crate::extensions::ExtensionLocation::Client,
                ..
            })
        ));

        let mut lenient = config();
        lenient.allow_unrequested_extensions = true;
        let rp = build(lenient).unwrap();
        let creation = rp.start_registration(StartRegistrationOptions::new(user())).unwrap();
        let mut response = authenticator.make_credential(&creation, ORIGIN, &SoftAttestation::None);
        response
            .client_extension_results
            .insert("credProps", serde_json::json!({ "rk": true }));
        let result = rp.finish_registration(&creation, &response).await.unwrap();
        assert_eq!(result.warnings().len(), 1);
    }
}

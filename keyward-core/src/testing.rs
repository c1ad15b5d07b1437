//! Software authenticator for tests.
//!
//! Produces registration and assertion responses the way a CTAP2
//! authenticator plus browser would, with deterministic keys derived from
//! a seed. Enabled for this crate's tests and, via the `test-util`
//! feature, for downstream crates.

use ciborium::value::Value;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use sha2::{Digest, Sha256};

use crate::attestation::AttestationObject;
use crate::authenticator_data::{
    AttestedCredentialData, AuthenticatorData, AuthenticatorFlags, AAGUID_LEN,
};
use crate::bytes::ByteSequence;
use crate::client_data::{CeremonyType, CollectedClientData, TokenBinding, TokenBindingStatus};
use crate::cose::{self, COSE_ALG_ES256};
use crate::crypto::CryptoContext;
use crate::options::{AssertionOptions, CredentialCreationOptions};
use crate::response::{
    AssertionCredential, AuthenticatorAssertionResponse, AuthenticatorAttestationResponse,
    ClientExtensionOutputs, RegistrationCredential,
};

/// P-256 signing key derived from `sha256(seed)`.
pub fn signing_key_from_seed(seed: &[u8]) -> SigningKey {
    let mut scalar: [u8; 32] = Sha256::digest(seed).into();
    // Keeps the scalar below the group order.
    scalar[0] &= 0x7f;
    SigningKey::from_slice(&scalar).expect("derived scalar is a valid P-256 key")
}

/// DER-encoded ES256 signature.
pub fn sign_der(key: &SigningKey, message: &[u8]) -> Vec<u8> {
    let signature: Signature = key.sign(message);
    signature.to_der().as_bytes().to_vec()
}

/// Client data JSON with token binding status `supported`.
pub fn client_data_json(
    ceremony: CeremonyType,
    challenge: &ByteSequence,
    origin: &str,
) -> ByteSequence {
    let collected = CollectedClientData {
        ceremony_type: ceremony.as_str().to_string(),
        challenge: challenge.to_base64url(),
        origin: origin.to_string(),
        token_binding: Some(TokenBinding {
            status: TokenBindingStatus::Supported,
            id: None,
        }),
        cross_origin: None,
    };
    ByteSequence::from(serde_json::to_vec(&collected).expect("client data serializes"))
}

/// Attestation statement the authenticator emits at registration.
#[derive(Debug, Clone)]
pub enum SoftAttestation {
    None,
    /// `packed` signed by the credential key itself.
    PackedSelf,
    /// `packed` with an x5c chain signed by `key`.
    Packed {
        x5c: Vec<ByteSequence>,
        key: SigningKey,
    },
    /// `fido-u2f` with a single certificate whose key is `key`.
    FidoU2f {
        certificate: ByteSequence,
        key: SigningKey,
    },
}

#[derive(Debug, Clone)]
pub struct SoftAuthenticator {
    signing_key: SigningKey,
    credential_id: ByteSequence,
    aaguid: [u8; AAGUID_LEN],
    counter: u32,
    static_counter: bool,
    user_present: bool,
    user_verified: bool,
    user_handle: Option<ByteSequence>,
}

impl SoftAuthenticator {
    pub fn new(seed: &[u8]) -> Self {
        let mut id_seed = b"credential-id:".to_vec();
        id_seed.extend_from_slice(seed);
        Self {
            signing_key: signing_key_from_seed(seed),
            credential_id: ByteSequence::from(Sha256::digest(&id_seed).to_vec()),
            aaguid: [0u8; AAGUID_LEN],
            counter: 0,
            static_counter: false,
            user_present: true,
            user_verified: false,
            user_handle: None,
        }
    }

    pub fn with_aaguid(mut self, aaguid: [u8; AAGUID_LEN]) -> Self {
        self.aaguid = aaguid;
        self
    }

    pub fn credential_id(&self) -> &ByteSequence {
        &self.credential_id
    }

    pub fn raw_public_key(&self) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    pub fn public_key_cose(&self) -> ByteSequence {
        cose::raw_ec_key_to_cose(&self.raw_public_key()).expect("P-256 point encodes as COSE")
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn set_counter(&mut self, counter: u32) {
        self.counter = counter;
    }

    /// Model an authenticator without counter support: assertions keep
    /// reporting the current value.
    pub fn set_static_counter(&mut self, fixed: bool) {
        self.static_counter = fixed;
    }

    pub fn set_user_present(&mut self, present: bool) {
        self.user_present = present;
    }

    pub fn set_user_verified(&mut self, verified: bool) {
        self.user_verified = verified;
    }

    /// Handle returned with assertions, as a resident credential would.
    pub fn set_user_handle(&mut self, handle: Option<ByteSequence>) {
        self.user_handle = handle;
    }

    /// Raw authenticator data for `rp_id` at the current counter.
    pub fn authenticator_data(&self, rp_id: &str, include_credential: bool) -> Vec<u8> {
        let crypto = CryptoContext::new();
        let attested_credential_data = include_credential.then(|| AttestedCredentialData {
            aaguid: self.aaguid,
            credential_id: self.credential_id.clone(),
            public_key_cose: self.public_key_cose(),
        });
        AuthenticatorData {
            rp_id_hash: crypto.hash(rp_id.as_bytes()),
            flags: AuthenticatorFlags {
                user_present: self.user_present,
                user_verified: self.user_verified,
                attested_data_included: include_credential,
                ..Default::default()
            },
            signature_counter: self.counter,
            attested_credential_data,
            extensions: None,
        }
        .to_bytes()
        .expect("authenticator data encodes")
    }

    pub fn make_credential(
        &mut self,
        options: &CredentialCreationOptions,
        origin: &str,
        attestation: &SoftAttestation,
    ) -> RegistrationCredential {
        let client_data = client_data_json(CeremonyType::Create, options.challenge(), origin);
        self.make_credential_with(&options.rp().id, client_data, attestation)
    }

    /// Registration over caller-supplied client data.
    pub fn make_credential_with(
        &mut self,
        rp_id: &str,
        client_data: ByteSequence,
        attestation: &SoftAttestation,
    ) -> RegistrationCredential {
        let crypto = CryptoContext::new();
        let auth_data = self.authenticator_data(rp_id, true);
        let client_data_hash = crypto.hash(client_data.as_bytes());
        let mut signed = auth_data.clone();
        signed.extend_from_slice(&client_data_hash);

        let text = |s: &str| Value::Text(s.to_string());
        let x5c = |certs: &[ByteSequence]| {
            Value::Array(
                certs
                    .iter()
                    .map(|c| Value::Bytes(c.as_bytes().to_vec()))
                    .collect(),
            )
        };
        let (format, statement) = match attestation {
            SoftAttestation::None => ("none", Vec::new()),
            SoftAttestation::PackedSelf => (
                "packed",
                vec![
                    (text("alg"), Value::Integer(COSE_ALG_ES256.into())),
                    (text("sig"), Value::Bytes(sign_der(&self.signing_key, &signed))),
                ],
            ),
            SoftAttestation::Packed { x5c: chain, key } => (
                "packed",
                vec![
                    (text("alg"), Value::Integer(COSE_ALG_ES256.into())),
                    (text("sig"), Value::Bytes(sign_der(key, &signed))),
                    (text("x5c"), x5c(chain)),
                ],
            ),
            SoftAttestation::FidoU2f { certificate, key } => {
                let mut u2f_signed = vec![0x00];
                u2f_signed.extend_from_slice(&crypto.hash(rp_id.as_bytes()));
                u2f_signed.extend_from_slice(&client_data_hash);
                u2f_signed.extend_from_slice(self.credential_id.as_bytes());
                u2f_signed.extend_from_slice(&self.raw_public_key());
                (
                    "fido-u2f",
                    vec![
                        (text("sig"), Value::Bytes(sign_der(key, &u2f_signed))),
                        (text("x5c"), x5c(std::slice::from_ref(certificate))),
                    ],
                )
            }
        };

        let object = AttestationObject::new(format, statement, ByteSequence::from(auth_data));
        RegistrationCredential {
            id: self.credential_id.clone(),
            credential_type: "public-key".to_string(),
            response: AuthenticatorAttestationResponse {
                client_data_json: client_data,
                attestation_object: ByteSequence::from(
                    object.to_cbor().expect("attestation object encodes"),
                ),
            },
            client_extension_results: ClientExtensionOutputs::new(),
        }
    }

    /// Increments the counter (unless static), then signs.
    pub fn get_assertion(&mut self, options: &AssertionOptions, origin: &str) -> AssertionCredential {
        let client_data = client_data_json(CeremonyType::Get, options.challenge(), origin);
        self.get_assertion_with(options.rp_id(), client_data)
    }

    pub fn get_assertion_with(&mut self, rp_id: &str, client_data: ByteSequence) -> AssertionCredential {
        if !self.static_counter {
            self.counter = self.counter.wrapping_add(1);
        }
        let auth_data = self.authenticator_data(rp_id, false);
        let mut signed = auth_data.clone();
        signed.extend_from_slice(&CryptoContext::new().hash(client_data.as_bytes()));

        AssertionCredential {
            id: self.credential_id.clone(),
            credential_type: "public-key".to_string(),
            response: AuthenticatorAssertionResponse {
                client_data_json: client_data,
                authenticator_data: ByteSequence::from(auth_data),
                signature: ByteSequence::from(sign_der(&self.signing_key, &signed)),
                user_handle: self.user_handle.clone(),
            },
            client_extension_results: ClientExtensionOutputs::new(),
        }
    }
}

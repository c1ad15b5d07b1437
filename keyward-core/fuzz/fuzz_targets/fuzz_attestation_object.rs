#![no_main]

//! Fuzz target for attestation object decoding and statement verification
//!
//! Run with: cargo +nightly fuzz run fuzz_attestation_object

use keyward_core::attestation::AttestationStatementVerifier;
use keyward_core::{AttestationObject, AuthenticatorData, CryptoContext};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(object) = AttestationObject::from_cbor(data) else {
        return;
    };
    let Ok(auth_data) = AuthenticatorData::parse(object.authenticator_data().as_bytes()) else {
        return;
    };
    let crypto = CryptoContext::new();
    let client_data_hash = crypto.hash(data);
    let _ = AttestationStatementVerifier::new(crypto).verify(&object, &auth_data, &client_data_hash);
});

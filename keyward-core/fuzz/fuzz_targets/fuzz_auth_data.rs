#![no_main]

//! Fuzz target for AuthenticatorData::parse()
//!
//! Exercises the bounds-checked reader and the embedded COSE/extension
//! CBOR decoding. Any input must produce Ok or Err, never a panic.
//!
//! Run with: cargo +nightly fuzz run fuzz_auth_data

use keyward_core::{AuthenticatorData, CosePublicKey};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(auth_data) = AuthenticatorData::parse(data) {
        if let Some(attested) = &auth_data.attested_credential_data {
            let _ = CosePublicKey::from_cbor(attested.public_key_cose.as_bytes());
        }
        // Re-encoding a parsed value must not panic either
        let _ = auth_data.to_bytes();
    }
});

#![no_main]

//! Fuzz target for collected client data parsing
//!
//! Run with: cargo +nightly fuzz run fuzz_client_data

use keyward_core::client_data::ClientData;
use keyward_core::ByteSequence;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = ByteSequence::from(data);
    if let Ok(client_data) = ClientData::parse(&raw) {
        let _ = ByteSequence::from_base64url(&client_data.collected().challenge);
    }
});

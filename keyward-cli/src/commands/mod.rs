pub mod challenge;
pub mod cose_key;
pub mod inspect_attestation;
pub mod inspect_auth_data;

//! Registration ceremony endpoints

use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use keyward_core::{
    AttestationMetadata, AttestationType, AuthenticatorSelectionCriteria, ByteSequence,
    CredentialCreationOptions, CredentialRegistration, RegistrationCredential, RequestId,
    StartRegistrationOptions, UserIdentity, UserVerificationRequirement,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::{AppState, PendingRegistration};

const NO_SUCH_REGISTRATION: &str = "No such registration in progress";

#[derive(Debug, Deserialize)]
pub struct StartRegistrationRequest {
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Label for the credential, shown in credential lists
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub require_resident_key: bool,
    #[serde(default)]
    pub user_verification: Option<UserVerificationRequirement>,
}

#[derive(Debug, Serialize)]
pub struct StartRegistrationResponse {
    pub request_id: RequestId,
    pub public_key: CredentialCreationOptions,
}

/// POST /register/start
///
/// Start registration of a new account. Returns the options to pass to
/// `navigator.credentials.create()` and a request ID for the finish call.
pub async fn start_registration(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartRegistrationRequest>,
) -> Result<Json<StartRegistrationResponse>, ApiError> {
    let username = req.username.trim().to_string();
    if username.is_empty() {
        return Err(ApiError::bad_request("Username must not be empty"));
    }
    if state.users.contains_key(&username) {
        return Err(ApiError::conflict("Username is already registered"));
    }

    let user = UserIdentity {
        id: state.relying_party.generate_user_handle()?,
        name: username.clone(),
        display_name: req
            .display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| username.clone()),
    };
    let mut start = StartRegistrationOptions::new(user);
    start.authenticator_selection = Some(AuthenticatorSelectionCriteria {
        require_resident_key: req.require_resident_key,
        user_verification: req.user_verification.unwrap_or_default(),
        ..Default::default()
    });
    let options = state.relying_party.start_registration(start)?;

    let request_id = state.pending_registrations.insert(PendingRegistration {
        username: username.clone(),
        nickname: req.nickname,
        options: options.clone(),
    });

    tracing::info!(request_id = %request_id, username = %username, "Registration started");

    Ok(Json(StartRegistrationResponse {
        request_id,
        public_key: options,
    }))
}

#[derive(Debug, Deserialize)]
pub struct FinishRegistrationRequest {
    pub request_id: String,
    pub credential: RegistrationCredential,
}

#[derive(Debug, Serialize)]
pub struct FinishRegistrationResponse {
    pub success: bool,
    pub username: String,
    pub credential_id: ByteSequence,
    pub aaguid: String,
    pub attestation_type: AttestationType,
    pub attestation_trusted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attestation_metadata: Option<AttestationMetadata>,
    pub registered_at: DateTime<Utc>,
    pub warnings: Vec<String>,
}

/// POST /register/finish
///
/// Verify the authenticator's response and persist the new credential.
/// The request ID is consumed whether or not verification succeeds.
pub async fn finish_registration(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FinishRegistrationRequest>,
) -> Result<Json<FinishRegistrationResponse>, ApiError> {
    let request_id: RequestId = req
        .request_id
        .parse()
        .map_err(|_| ApiError::bad_request(NO_SUCH_REGISTRATION))?;
    let pending = state
        .pending_registrations
        .take_if_present(&request_id)
        .ok_or_else(|| ApiError::bad_request(NO_SUCH_REGISTRATION))?;

    let result = state
        .relying_party
        .finish_registration(&pending.options, &req.credential)
        .await?;

    let user = pending.options.user().clone();
    // A concurrent registration may have claimed the username meanwhile
    match state.users.entry(pending.username.clone()) {
        Entry::Occupied(_) => return Err(ApiError::conflict("Username is already registered")),
        Entry::Vacant(slot) => {
            slot.insert(user.clone());
        }
    }

    let registration = CredentialRegistration::new(user, &result, pending.nickname);
    let registered_at = registration.registration_time;
    if let Err(e) = state.credentials.add_registration(registration) {
        state.users.remove(&pending.username);
        return Err(e.into());
    }

    tracing::info!(
        request_id = %request_id,
        username = %pending.username,
        credential_id = %result.credential_id(),
        "Registration completed"
    );

    Ok(Json(FinishRegistrationResponse {
        success: true,
        username: pending.username,
        credential_id: result.credential_id().clone(),
        aaguid: result.aaguid().to_string(),
        attestation_type: result.attestation_type(),
        attestation_trusted: result.attestation_trusted(),
        attestation_metadata: result.attestation_metadata().cloned(),
        registered_at,
        warnings: result.warnings().to_vec(),
    }))
}

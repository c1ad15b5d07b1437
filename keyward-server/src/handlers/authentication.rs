//! Authentication (assertion) ceremony endpoints

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{extract::State, Json};
use keyward_core::{
    AssertionCredential, AssertionOptions, ByteSequence, PublicKeyCredentialDescriptor, RequestId,
    StartAssertionOptions, UserVerificationRequirement,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::{AppState, PendingAssertion};

const NO_SUCH_ASSERTION: &str = "No such assertion in progress";

#[derive(Debug, Default, Deserialize)]
pub struct StartAuthenticationRequest {
    /// Restricts the ceremony to this account's credentials. Without it
    /// any discoverable credential may answer.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub user_verification: Option<UserVerificationRequirement>,
}

#[derive(Debug, Serialize)]
pub struct StartAuthenticationResponse {
    pub request_id: RequestId,
    pub public_key: AssertionOptions,
}

/// POST /authenticate/start
///
/// Returns the options to pass to `navigator.credentials.get()`.
pub async fn start_authentication(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartAuthenticationRequest>,
) -> Result<Json<StartAuthenticationResponse>, ApiError> {
    let username = req
        .username
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    let mut start = StartAssertionOptions {
        user_verification: req.user_verification,
        ..Default::default()
    };
    if let Some(name) = &username {
        let user = state
            .users
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ApiError::not_found(format!("Unknown username: {}", name)))?;
        let allowed: BTreeSet<_> = state
            .credentials
            .registrations_for_user(&user.id)
            .into_iter()
            .map(|registration| PublicKeyCredentialDescriptor::new(registration.credential_id))
            .collect();
        start.user_handle = Some(user.id);
        start.allow_credentials = Some(allowed);
    }

    let options = state.relying_party.start_assertion(start)?;
    let request_id = state.pending_assertions.insert(PendingAssertion {
        username: username.clone(),
        options: options.clone(),
    });

    tracing::info!(
        request_id = %request_id,
        username = username.as_deref().unwrap_or("<discoverable>"),
        "Authentication started"
    );

    Ok(Json(StartAuthenticationResponse {
        request_id,
        public_key: options,
    }))
}

#[derive(Debug, Deserialize)]
pub struct FinishAuthenticationRequest {
    pub request_id: String,
    pub credential: AssertionCredential,
}

#[derive(Debug, Serialize)]
pub struct FinishAuthenticationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub user_handle: ByteSequence,
    pub credential_id: ByteSequence,
    pub signature_counter: u32,
    pub signature_counter_valid: bool,
    pub warnings: Vec<String>,
}

/// POST /authenticate/finish
///
/// Verify the assertion. Counter updates and warnings are reported back.
pub async fn finish_authentication(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FinishAuthenticationRequest>,
) -> Result<Json<FinishAuthenticationResponse>, ApiError> {
    let request_id: RequestId = req
        .request_id
        .parse()
        .map_err(|_| ApiError::bad_request(NO_SUCH_ASSERTION))?;
    let pending = state
        .pending_assertions
        .take_if_present(&request_id)
        .ok_or_else(|| ApiError::bad_request(NO_SUCH_ASSERTION))?;

    let result = state
        .relying_party
        .finish_assertion(&pending.options, &req.credential)
        .await?;

    let username = pending.username.or_else(|| {
        state
            .users
            .iter()
            .find(|entry| &entry.value().id == result.user_handle())
            .map(|entry| entry.key().clone())
    });

    tracing::info!(
        request_id = %request_id,
        credential_id = %result.credential_id(),
        signature_counter = result.signature_counter(),
        "Authentication completed"
    );

    Ok(Json(FinishAuthenticationResponse {
        success: result.success(),
        username,
        user_handle: result.user_handle().clone(),
        credential_id: result.credential_id().clone(),
        signature_counter: result.signature_counter(),
        signature_counter_valid: result.signature_counter_valid(),
        warnings: result.warnings().to_vec(),
    }))
}

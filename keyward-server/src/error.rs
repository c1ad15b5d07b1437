//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use keyward_core::KeywardError;
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Not found - requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict - resource already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Ceremony error - error from the verification engine
    #[error("Ceremony error: {0}")]
    Ceremony(#[from] KeywardError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Ceremony(ref e) => match e {
                // Undecodable input or stale request → 400
                KeywardError::MalformedResponse(_)
                | KeywardError::TruncatedAuthenticatorData { .. }
                | KeywardError::MalformedKey(_)
                | KeywardError::NoSuchCeremony
                | KeywardError::InvalidAppId(_) => StatusCode::BAD_REQUEST,

                // Verification failures → 422 Unprocessable Entity
                KeywardError::ClientDataMismatch(_)
                | KeywardError::RpIdMismatch
                | KeywardError::UnsupportedAlgorithm(_)
                | KeywardError::AlgorithmNotRequested(_)
                | KeywardError::UnsupportedAttestationFormat(_)
                | KeywardError::InvalidAttestationSignature(_)
                | KeywardError::InvalidAttestationCertificate(_)
                | KeywardError::InvalidAssertionSignature
                | KeywardError::UnknownCredential(_)
                | KeywardError::CredentialNotAllowed(_)
                | KeywardError::CredentialIdInUse
                | KeywardError::UserHandleMismatch
                | KeywardError::MissingAttestedCredentialData
                | KeywardError::UserNotPresent
                | KeywardError::UserNotVerified
                | KeywardError::UnrequestedExtension { .. }
                | KeywardError::CounterRegression { .. }
                | KeywardError::UntrustedAttestation => StatusCode::UNPROCESSABLE_ENTITY,

                // Collaborator failures → 503
                KeywardError::Repository(_) | KeywardError::TrustResolution(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }

                // Environment or setup failures → 500
                KeywardError::Entropy(_) | KeywardError::InvalidConfig(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Get the error code for programmatic error handling
    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Ceremony(ref e) => match e {
                KeywardError::MalformedResponse(_) => "MALFORMED_RESPONSE",
                KeywardError::ClientDataMismatch(_) => "CLIENT_DATA_MISMATCH",
                KeywardError::RpIdMismatch => "RP_ID_MISMATCH",
                KeywardError::TruncatedAuthenticatorData { .. } => "TRUNCATED_AUTHENTICATOR_DATA",
                KeywardError::MalformedKey(_) => "MALFORMED_KEY",
                KeywardError::UnsupportedAlgorithm(_) => "UNSUPPORTED_ALGORITHM",
                KeywardError::AlgorithmNotRequested(_) => "ALGORITHM_NOT_REQUESTED",
                KeywardError::UnsupportedAttestationFormat(_) => "UNSUPPORTED_ATTESTATION_FORMAT",
                KeywardError::InvalidAttestationSignature(_) => "INVALID_ATTESTATION_SIGNATURE",
                KeywardError::InvalidAttestationCertificate(_) => {
                    "INVALID_ATTESTATION_CERTIFICATE"
                }
                KeywardError::InvalidAssertionSignature => "INVALID_ASSERTION_SIGNATURE",
                KeywardError::UnknownCredential(_) => "UNKNOWN_CREDENTIAL",
                KeywardError::CredentialNotAllowed(_) => "CREDENTIAL_NOT_ALLOWED",
                KeywardError::CredentialIdInUse => "CREDENTIAL_ID_IN_USE",
                KeywardError::UserHandleMismatch => "USER_HANDLE_MISMATCH",
                KeywardError::MissingAttestedCredentialData => "MISSING_ATTESTED_CREDENTIAL_DATA",
                KeywardError::UserNotPresent => "USER_NOT_PRESENT",
                KeywardError::UserNotVerified => "USER_NOT_VERIFIED",
                KeywardError::UnrequestedExtension { .. } => "UNREQUESTED_EXTENSION",
                KeywardError::CounterRegression { .. } => "COUNTER_REGRESSION",
                KeywardError::UntrustedAttestation => "UNTRUSTED_ATTESTATION",
                KeywardError::NoSuchCeremony => "NO_SUCH_CEREMONY",
                KeywardError::InvalidAppId(_) => "INVALID_APP_ID",
                KeywardError::InvalidConfig(_) => "INVALID_CONFIG",
                KeywardError::Repository(_) => "REPOSITORY_UNAVAILABLE",
                KeywardError::TrustResolution(_) => "TRUST_RESOLUTION_UNAVAILABLE",
                KeywardError::Entropy(_) => "ENTROPY_UNAVAILABLE",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            // Server-side failures never leak internal details
            Self::Internal(_) => "Internal server error".to_string(),
            Self::Ceremony(ref e) => match e {
                KeywardError::Repository(_) => "Credential storage unavailable".to_string(),
                KeywardError::TrustResolution(_) => "Attestation trust service unavailable".to_string(),
                KeywardError::Entropy(_) | KeywardError::InvalidConfig(_) => {
                    "Internal server error".to_string()
                }
                other => other.to_string(),
            },
            // For other errors, use the Display message
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal",
            Self::Ceremony(_) => "ceremony",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        if status.is_server_error() {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Server error"
            );
        } else {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Client error"
            );
        }

        // All error responses include a `code` field for programmatic error handling
        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

//! API integration tests for keyward-server.
//!
//! These tests drive the full registration and authentication ceremonies
//! through the REST endpoints with a software authenticator.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use keyward_core::testing::{SoftAttestation, SoftAuthenticator};
use keyward_core::{
    AssertionOptions, AttestationConveyancePreference, ByteSequence, CredentialCreationOptions,
};
use keyward_server::{create_router, AppState, Config};
use serde_json::{json, Value};
use tower::ServiceExt;

const ORIGIN: &str = "https://localhost:8443";

/// Build the test router with default config and fresh in-memory state
fn create_test_app() -> (Router, Arc<AppState>) {
    create_test_app_with(Config::default())
}

fn create_test_app_with(config: Config) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(&config).unwrap());
    (create_router(state.clone(), &config), state)
}

/// Client data as current browsers send it: no tokenBinding member
fn browser_client_data(ceremony: &str, challenge: &ByteSequence) -> ByteSequence {
    ByteSequence::from(
        serde_json::to_vec(&json!({
            "type": ceremony,
            "challenge": challenge.to_base64url(),
            "origin": ORIGIN,
            "crossOrigin": false,
        }))
        .unwrap(),
    )
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

/// Run start + finish registration, returning the finish response
async fn register(
    app: &Router,
    username: &str,
    authenticator: &mut SoftAuthenticator,
) -> (StatusCode, Value) {
    let (status, start) = post_json(app, "/register/start", json!({ "username": username })).await;
    assert_eq!(status, StatusCode::OK, "start failed: {}", start);

    let options: CredentialCreationOptions =
        serde_json::from_value(start["public_key"].clone()).unwrap();
    let credential = authenticator.make_credential(&options, ORIGIN, &SoftAttestation::PackedSelf);

    post_json(
        app,
        "/register/finish",
        json!({
            "request_id": start["request_id"],
            "credential": credential,
        }),
    )
    .await
}

async fn authenticate(
    app: &Router,
    username: Option<&str>,
    authenticator: &mut SoftAuthenticator,
) -> (StatusCode, Value) {
    let (status, start) =
        post_json(app, "/authenticate/start", json!({ "username": username })).await;
    assert_eq!(status, StatusCode::OK, "start failed: {}", start);

    let options: AssertionOptions = serde_json::from_value(start["public_key"].clone()).unwrap();
    let credential = authenticator.get_assertion(&options, ORIGIN);

    post_json(
        app,
        "/authenticate/finish",
        json!({
            "request_id": start["request_id"],
            "credential": credential,
        }),
    )
    .await
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], "healthy");
    assert_eq!(json["rp_id"], "localhost");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ready_endpoint_returns_ok() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/ready")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Registration Tests
// ============================================================================

#[tokio::test]
async fn test_start_registration_returns_webauthn_options() {
    let (app, state) = create_test_app();

    let (status, json) = post_json(
        &app,
        "/register/start",
        json!({ "username": "alice", "display_name": "Alice A." }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["request_id"].is_string());
    let options = &json["public_key"];
    assert_eq!(options["rp"]["id"], "localhost");
    assert_eq!(options["user"]["name"], "alice");
    assert_eq!(options["user"]["displayName"], "Alice A.");
    assert_eq!(options["pubKeyCredParams"][0]["alg"], -7);
    assert!(options["challenge"].as_str().unwrap().len() >= 22);
    assert_eq!(state.pending_registrations.len(), 1);
}

#[tokio::test]
async fn test_registration_completes_and_persists() {
    let (app, state) = create_test_app();
    let mut authenticator = SoftAuthenticator::new(b"alice-key");

    let (status, json) = register(&app, "alice", &mut authenticator).await;

    assert_eq!(status, StatusCode::OK, "finish failed: {}", json);
    assert_eq!(json["success"], true);
    assert_eq!(json["username"], "alice");
    assert_eq!(json["attestation_type"], "self");
    assert_eq!(json["attestation_trusted"], false);
    assert_eq!(
        json["credential_id"],
        authenticator.credential_id().to_base64url()
    );
    assert!(state.credentials.get(authenticator.credential_id()).is_some());
    assert!(state.users.contains_key("alice"));
    assert!(state.pending_registrations.is_empty());
}

#[tokio::test]
async fn test_registration_rejects_taken_username() {
    let (app, _) = create_test_app();
    let mut authenticator = SoftAuthenticator::new(b"first");
    let (status, _) = register(&app, "bob", &mut authenticator).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = post_json(&app, "/register/start", json!({ "username": "bob" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
}

#[tokio::test]
async fn test_registration_rejects_empty_username() {
    let (app, _) = create_test_app();
    let (status, json) = post_json(&app, "/register/start", json!({ "username": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_registration_request_id_is_single_use() {
    let (app, _) = create_test_app();
    let mut authenticator = SoftAuthenticator::new(b"replay");

    let (_, start) = post_json(&app, "/register/start", json!({ "username": "carol" })).await;
    let options: CredentialCreationOptions =
        serde_json::from_value(start["public_key"].clone()).unwrap();
    let credential = authenticator.make_credential(&options, ORIGIN, &SoftAttestation::None);
    let body = json!({ "request_id": start["request_id"], "credential": credential });

    let (status, _) = post_json(&app, "/register/finish", body.clone()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = post_json(&app, "/register/finish", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("No such registration in progress"));
}

#[tokio::test]
async fn test_registration_unknown_request_id() {
    let (app, _) = create_test_app();
    let mut authenticator = SoftAuthenticator::new(b"unknown-request");
    let (_, start) = post_json(&app, "/register/start", json!({ "username": "dave" })).await;
    let options: CredentialCreationOptions =
        serde_json::from_value(start["public_key"].clone()).unwrap();
    let credential = authenticator.make_credential(&options, ORIGIN, &SoftAttestation::None);

    for request_id in ["not-a-uuid", "6f1c2a9e-1d0b-4f43-9d65-2f5f3f0f9a11"] {
        let (status, _) = post_json(
            &app,
            "/register/finish",
            json!({ "request_id": request_id, "credential": credential }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_registration_wrong_origin_is_unprocessable() {
    let (app, state) = create_test_app();
    let mut authenticator = SoftAuthenticator::new(b"phished");

    let (_, start) = post_json(&app, "/register/start", json!({ "username": "erin" })).await;
    let options: CredentialCreationOptions =
        serde_json::from_value(start["public_key"].clone()).unwrap();
    let credential =
        authenticator.make_credential(&options, "https://evil.example", &SoftAttestation::None);

    let (status, json) = post_json(
        &app,
        "/register/finish",
        json!({ "request_id": start["request_id"], "credential": credential }),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "CLIENT_DATA_MISMATCH");
    assert!(state.credentials.is_empty());
    assert!(!state.users.contains_key("erin"));
}

// ============================================================================
// Authentication Tests
// ============================================================================

#[tokio::test]
async fn test_authentication_with_username() {
    let (app, state) = create_test_app();
    let mut authenticator = SoftAuthenticator::new(b"frank-key");
    register(&app, "frank", &mut authenticator).await;

    let (status, json) = authenticate(&app, Some("frank"), &mut authenticator).await;

    assert_eq!(status, StatusCode::OK, "finish failed: {}", json);
    assert_eq!(json["success"], true);
    assert_eq!(json["username"], "frank");
    assert_eq!(json["signature_counter"], 1);
    assert_eq!(json["signature_counter_valid"], true);
    assert_eq!(
        state
            .credentials
            .get(authenticator.credential_id())
            .unwrap()
            .signature_counter,
        1
    );
}

#[tokio::test]
async fn test_authentication_lists_allowed_credentials() {
    let (app, _) = create_test_app();
    let mut authenticator = SoftAuthenticator::new(b"grace-key");
    register(&app, "grace", &mut authenticator).await;

    let (status, json) =
        post_json(&app, "/authenticate/start", json!({ "username": "grace" })).await;
    assert_eq!(status, StatusCode::OK);
    let allowed = json["public_key"]["allowCredentials"].as_array().unwrap();
    assert_eq!(allowed.len(), 1);
    assert_eq!(allowed[0]["id"], authenticator.credential_id().to_base64url());
    assert_eq!(json["public_key"]["rpId"], "localhost");
}

#[tokio::test]
async fn test_authentication_discoverable_credential() {
    let (app, _) = create_test_app();
    let mut authenticator = SoftAuthenticator::new(b"heidi-key");
    register(&app, "heidi", &mut authenticator).await;

    let (status, json) = authenticate(&app, None, &mut authenticator).await;
    assert_eq!(status, StatusCode::OK, "finish failed: {}", json);
    assert_eq!(json["username"], "heidi");
}

#[tokio::test]
async fn test_authentication_unknown_username() {
    let (app, _) = create_test_app();
    let (status, json) =
        post_json(&app, "/authenticate/start", json!({ "username": "nobody" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_authentication_unregistered_credential() {
    let (app, _) = create_test_app();
    let mut stranger = SoftAuthenticator::new(b"stranger");

    let (status, json) = authenticate(&app, None, &mut stranger).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "UNKNOWN_CREDENTIAL");
}

#[tokio::test]
async fn test_authentication_counter_regression_reported() {
    let (app, _) = create_test_app();
    let mut authenticator = SoftAuthenticator::new(b"ivan-key");
    register(&app, "ivan", &mut authenticator).await;

    authenticator.set_counter(10);
    let (status, _) = authenticate(&app, Some("ivan"), &mut authenticator).await;
    assert_eq!(status, StatusCode::OK);

    authenticator.set_counter(2);
    let (status, json) = authenticate(&app, Some("ivan"), &mut authenticator).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["signature_counter_valid"], false);
    assert_eq!(json["warnings"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_browser_client_data_without_token_binding_accepted() {
    let (app, _) = create_test_app();
    let mut authenticator = SoftAuthenticator::new(b"judy-key");

    let (_, start) = post_json(&app, "/register/start", json!({ "username": "judy" })).await;
    let options: CredentialCreationOptions =
        serde_json::from_value(start["public_key"].clone()).unwrap();
    let client_data = browser_client_data("webauthn.create", options.challenge());
    let credential =
        authenticator.make_credential_with(&options.rp().id, client_data, &SoftAttestation::None);
    let (status, json) = post_json(
        &app,
        "/register/finish",
        json!({ "request_id": start["request_id"], "credential": credential }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "finish failed: {}", json);

    let (_, start) = post_json(&app, "/authenticate/start", json!({ "username": "judy" })).await;
    let options: AssertionOptions = serde_json::from_value(start["public_key"].clone()).unwrap();
    let client_data = browser_client_data("webauthn.get", options.challenge());
    let credential = authenticator.get_assertion_with(options.rp_id(), client_data);
    let (status, json) = post_json(
        &app,
        "/authenticate/finish",
        json!({ "request_id": start["request_id"], "credential": credential }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "finish failed: {}", json);
    assert_eq!(json["username"], "judy");
}

#[tokio::test]
async fn test_strict_token_binding_rejects_browser_client_data() {
    let (app, _) = create_test_app_with(Config {
        allow_missing_token_binding: false,
        ..Config::default()
    });
    let mut authenticator = SoftAuthenticator::new(b"mallory-key");

    let (_, start) = post_json(&app, "/register/start", json!({ "username": "mallory" })).await;
    let options: CredentialCreationOptions =
        serde_json::from_value(start["public_key"].clone()).unwrap();
    let client_data = browser_client_data("webauthn.create", options.challenge());
    let credential =
        authenticator.make_credential_with(&options.rp().id, client_data, &SoftAttestation::None);
    let (status, json) = post_json(
        &app,
        "/register/finish",
        json!({ "request_id": start["request_id"], "credential": credential }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "CLIENT_DATA_MISMATCH");
}

#[tokio::test]
async fn test_direct_attestation_requested_when_configured() {
    let (app, _) = create_test_app_with(Config {
        attestation: AttestationConveyancePreference::Direct,
        ..Config::default()
    });

    let (status, json) = post_json(&app, "/register/start", json!({ "username": "niaj" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["public_key"]["attestation"], "direct");

    // Self attestation stays untrusted through the metadata resolver
    let mut authenticator = SoftAuthenticator::new(b"olivia-key");
    let (status, json) = register(&app, "olivia", &mut authenticator).await;
    assert_eq!(status, StatusCode::OK, "finish failed: {}", json);
    assert_eq!(json["attestation_type"], "self");
    assert_eq!(json["attestation_trusted"], false);
}

#[test]
fn test_missing_trust_anchor_file_is_config_error() {
    let config = Config {
        trust_anchor_paths: vec!["/nonexistent/keyward/root.der".into()],
        ..Config::default()
    };
    assert!(matches!(
        AppState::new(&config),
        Err(keyward_core::KeywardError::InvalidConfig(_))
    ));
}

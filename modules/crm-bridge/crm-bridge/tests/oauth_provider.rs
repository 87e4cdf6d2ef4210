#![allow(clippy::unwrap_used, clippy::expect_used)]

//! OAuth2 credential provider against a mock token endpoint.

mod common;

use std::sync::Arc;
use std::time::Duration;

use crm_bridge::infra::memory_store::MemoryStore;
use crm_bridge::infra::oauth::OAuthCredentialProvider;
use crm_bridge_sdk::{AuthMode, AuthModeKind, CredentialError, CredentialProvider};
use crm_security::SecurityContext;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/tenant/oauth2/v2.0/token";
const SCOPE: &str = "scope=https%3A%2F%2Forg.crm.example.com%2F.default";

fn endpoint() -> Url {
    Url::parse("https://org.crm.example.com").unwrap()
}

fn provider(server: &MockServer) -> OAuthCredentialProvider {
    let authority = Url::parse(&format!("{}/tenant", server.uri())).unwrap();
    OAuthCredentialProvider::new(
        &authority,
        "client",
        Some(SecretString::from("s3cret")),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn token_response(token: &str, expires_in: u64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "token_type": "Bearer",
        "expires_in": expires_in,
        "access_token": token,
    }))
}

#[tokio::test]
async fn application_token_is_requested_once_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=client"))
        .and(body_string_contains("client_secret=s3cret"))
        .and(body_string_contains(SCOPE))
        .respond_with(token_response("app-token", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    let first = provider
        .acquire_token(&endpoint(), &AuthMode::Application)
        .await
        .unwrap();
    let second = provider
        .acquire_token(&endpoint(), &AuthMode::Application)
        .await
        .unwrap();

    assert_eq!(first.expose(), "app-token");
    assert_eq!(second.expose(), "app-token");
}

#[tokio::test]
async fn nearly_expired_tokens_are_not_reused() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(token_response("short-lived", 30))
        .expect(2)
        .mount(&server)
        .await;

    let provider = provider(&server);
    for _ in 0..2 {
        provider
            .acquire_token(&endpoint(), &AuthMode::Application)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn delegated_tokens_use_on_behalf_of_and_are_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .and(body_string_contains("assertion=user-jwt"))
        .and(body_string_contains("requested_token_use=on_behalf_of"))
        .respond_with(token_response("obo-token", 3600))
        .expect(2)
        .mount(&server)
        .await;

    let provider = provider(&server);
    let mode = AuthMode::Delegated {
        user_assertion: SecretString::from("user-jwt"),
    };
    for _ in 0..2 {
        let token = provider.acquire_token(&endpoint(), &mode).await.unwrap();
        assert_eq!(token.expose(), "obo-token");
    }
}

#[tokio::test]
async fn service_identity_uses_password_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("username=svc"))
        .and(body_string_contains("password=pw"))
        .respond_with(token_response("svc-token", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let mode = AuthMode::ServiceIdentity {
        username: "svc".to_owned(),
        password: SecretString::from("pw"),
    };
    let token = provider(&server)
        .acquire_token(&endpoint(), &mode)
        .await
        .unwrap();
    assert_eq!(token.expose(), "svc-token");
}

#[tokio::test]
async fn rejected_request_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "bad secret",
        })))
        .mount(&server)
        .await;

    let err = provider(&server)
        .acquire_token(&endpoint(), &AuthMode::Application)
        .await
        .unwrap_err();
    match err {
        CredentialError::Unauthorized(reason) => {
            assert_eq!(reason, "invalid_client: bad secret");
        }
        other => panic!("expected Unauthorized, got {other}"),
    }
}

#[tokio::test]
async fn server_errors_are_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = provider(&server)
        .acquire_token(&endpoint(), &AuthMode::Application)
        .await
        .unwrap_err();
    assert!(matches!(err, CredentialError::Unavailable(_)));
}

#[tokio::test]
async fn failed_requests_are_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(token_response("app-token", 3600))
        .mount(&server)
        .await;

    let provider = provider(&server);
    assert!(
        provider
            .acquire_token(&endpoint(), &AuthMode::Application)
            .await
            .is_err()
    );
    let token = provider
        .acquire_token(&endpoint(), &AuthMode::Application)
        .await
        .unwrap();
    assert_eq!(token.expose(), "app-token");
}

#[tokio::test]
async fn bridge_opens_store_sessions_with_provider_tokens() {
    use common::{CONTACT, Contact, ContactMapper};
    use crm_bridge::{CrmBridge, CrmBridgeConfig, MappingRegistry};

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(token_response("app-token", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let config = CrmBridgeConfig {
        endpoint: endpoint().to_string(),
        authority: format!("{}/tenant", server.uri()),
        client_id: "client".to_owned(),
        client_secret: Some(SecretString::from("s3cret")),
        auth_mode: AuthModeKind::Application,
        ..Default::default()
    };
    let registry = MappingRegistry::new()
        .with::<Contact>(CONTACT, Arc::new(ContactMapper))
        .unwrap();
    let store = MemoryStore::new();
    let bridge = CrmBridge::with_oauth(&config, registry, Arc::new(store.clone())).unwrap();

    let client = bridge.client::<Contact>().unwrap();
    let ctx = SecurityContext::anonymous();
    client.insert(&ctx, Contact::new("Ada", "London")).await.unwrap();
    client.insert(&ctx, Contact::new("Alan", "Wilmslow")).await.unwrap();

    assert_eq!(store.tokens_seen(), vec!["app-token"; 2]);
}

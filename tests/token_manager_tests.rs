/// Token manager tests against a mocked issuance API
/// Covers staleness checks, probe ordering and graceful degradation
use chrono::{Duration, Utc};
use serde_json::json;
use soat_quote_gateway::config::Credentials;
use soat_quote_gateway::token_manager::{Token, TokenManager, TokenProvenance};
use soat_quote_gateway::upstream_client::UpstreamClient;
use std::sync::Arc;
use wiremock::matchers::{any, body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FALLBACK: &str = "fallback-token-value";

fn credentials() -> Credentials {
    Credentials {
        api_key: "key-123".to_string(),
        secret_key: "secret-456".to_string(),
        auth_token: FALLBACK.to_string(),
        product_code: 63,
    }
}

fn manager(server: &MockServer, issued_at: chrono::DateTime<Utc>) -> TokenManager {
    let client = UpstreamClient::new(&server.uri()).unwrap();
    TokenManager::with_state(
        client,
        credentials(),
        Duration::hours(1),
        Token::fallback(FALLBACK, issued_at),
    )
}

#[tokio::test]
async fn test_fresh_fallback_token_skips_issuance() {
    let mock_server = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "never"})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = UpstreamClient::new(&mock_server.uri()).unwrap();
    let tokens = TokenManager::new(client, credentials(), Duration::hours(1));

    let token = tokens.get_valid_token().await;

    assert_eq!(token.value, FALLBACK);
    assert_eq!(token.provenance, TokenProvenance::Fallback);
}

#[tokio::test]
async fn test_stale_fallback_token_is_replaced() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/token"))
        .and(header("secretkey", "secret-456"))
        .and(header("apikey", "key-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"AuthToken": "issued-1"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let tokens = manager(&mock_server, Utc::now() - Duration::hours(2));

    let token = tokens.get_valid_token().await;
    assert_eq!(token.value, "issued-1");
    assert_eq!(token.provenance, TokenProvenance::Issued);

    // Issued tokens are not subject to the staleness check
    let again = tokens.get_valid_token().await;
    assert_eq!(again.value, "issued-1");
    assert_eq!(tokens.snapshot().await, token);
}

#[tokio::test]
async fn test_probes_fall_through_endpoints_and_methods() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Success without a token field is not accepted
    Mock::given(method("GET"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(body_json(json!({"secretkey": "secret-456", "apikey": "key-123"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"authToken": "from-post"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(path("/authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "too-late"})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let tokens = manager(&mock_server, Utc::now());

    let token = tokens.issue_new_token().await;

    assert_eq!(token.value, "from-post");
    assert_eq!(token.provenance, TokenProvenance::Issued);
}

#[tokio::test]
async fn test_exhausted_issuance_keeps_fallback_state() {
    let mock_server = MockServer::start().await;
    let issued_at = Utc::now() - Duration::minutes(5);
    let tokens = manager(&mock_server, issued_at);

    let token = tokens.issue_new_token().await;

    assert_eq!(token.value, FALLBACK);
    assert!(token.is_fallback());
    assert_eq!(tokens.snapshot().await, Token::fallback(FALLBACK, issued_at));

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 8);
    let probed: Vec<_> = requests
        .iter()
        .map(|r| format!("{} {}", r.method, r.url.path()))
        .collect();
    assert_eq!(
        probed,
        [
            "GET /token",
            "POST /token",
            "GET /auth/token",
            "POST /auth/token",
            "GET /authenticate",
            "POST /authenticate",
            "GET /login",
            "POST /login",
        ]
    );
}

#[tokio::test]
async fn test_stale_fallback_reprobes_until_issuance_succeeds() {
    let mock_server = MockServer::start().await;
    let tokens = manager(&mock_server, Utc::now() - Duration::hours(2));

    assert_eq!(tokens.get_valid_token().await.value, FALLBACK);
    assert_eq!(tokens.get_valid_token().await.value, FALLBACK);

    assert_eq!(mock_server.received_requests().await.unwrap().len(), 16);
}

#[tokio::test]
async fn test_non_json_success_is_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("token=abc"))
        .mount(&mock_server)
        .await;

    let tokens = manager(&mock_server, Utc::now());

    assert!(tokens.issue_new_token().await.is_fallback());
}

#[tokio::test]
async fn test_concurrent_issuance_last_writer_wins() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "shared"})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let tokens = Arc::new(manager(&mock_server, Utc::now() - Duration::hours(2)));

    let (a, b) = tokio::join!(tokens.get_valid_token(), tokens.get_valid_token());

    assert_eq!(a.provenance, TokenProvenance::Issued);
    assert_eq!(b.provenance, TokenProvenance::Issued);
    let current = tokens.snapshot().await;
    assert!(current == a || current == b);
}

#[tokio::test]
async fn test_failed_issuance_over_issued_token_returns_startup_fallback() {
    let mock_server = MockServer::start().await;
    let client = UpstreamClient::new(&mock_server.uri()).unwrap();
    let issued = Token {
        value: "issued-earlier".to_string(),
        issued_at: Utc::now() - Duration::hours(3),
        provenance: TokenProvenance::Issued,
    };
    let tokens = TokenManager::with_state(client, credentials(), Duration::hours(1), issued.clone());

    let token = tokens.issue_new_token().await;

    assert_eq!(token.value, FALLBACK);
    assert!(token.is_fallback());
    assert!(token.issued_at > issued.issued_at);
    assert_eq!(token.age_minutes(), 0);
    assert_eq!(tokens.snapshot().await, issued);
}

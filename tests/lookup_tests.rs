// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the ean-search.org lookup client

use barcode_scanner::config::Credential;
use barcode_scanner::scanner::{LookupClient, LookupOutcome, LookupResult};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CODE: &str = "4006381333931";

fn client(base_url: &str, credential: &Credential) -> LookupClient {
    LookupClient::new(base_url, Duration::from_secs(5), credential.clone()).unwrap()
}

async fn mock_body(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("ean", CODE))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_found_product() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("token", "secret"))
        .and(query_param("format", "json"))
        .and(query_param("op", "barcode-lookup"))
        .and(query_param("ean", CODE))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"[{"ean":"4006381333931","name":"Example Product"}]"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let credential = Credential::new("secret");
    let client = client(&server.uri(), &credential);
    let outcome = client.lookup(&client.request(CODE)).await;

    assert_eq!(outcome, LookupOutcome::Found("Example Product".into()));
    assert_eq!(credential.get(), "secret");
}

#[tokio::test]
async fn test_no_credential_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(0)
        .mount(&server)
        .await;

    let credential = Credential::default();
    let client = client(&server.uri(), &credential);
    let outcome = client.lookup(&client.request(CODE)).await;

    assert_eq!(outcome, LookupOutcome::NoCredential);
}

#[tokio::test]
async fn test_invalid_token_clears_credential() {
    let server = MockServer::start().await;
    mock_body(&server, r#"[{"error":"Invalid token"}]"#).await;

    let credential = Credential::new("revoked");
    let client = client(&server.uri(), &credential);
    let outcome = client.lookup(&client.request(CODE)).await;

    assert_eq!(outcome, LookupOutcome::InvalidCredential);
    assert!(credential.is_empty());
}

#[tokio::test]
async fn test_replaced_token_survives_rejection_of_old_one() {
    let server = MockServer::start().await;
    mock_body(&server, r#"[{"error":"Invalid token"}]"#).await;

    let credential = Credential::new("old");
    let client = client(&server.uri(), &credential);
    let request = client.request(CODE);
    // User enters a new token while the request is in flight
    credential.set("new");

    assert_eq!(client.lookup(&request).await, LookupOutcome::InvalidCredential);
    assert_eq!(credential.get(), "new");
}

#[tokio::test]
async fn test_empty_answer_is_not_found() {
    let server = MockServer::start().await;
    mock_body(&server, "[]").await;

    let credential = Credential::new("secret");
    let client = client(&server.uri(), &credential);

    assert_eq!(
        client.lookup(&client.request(CODE)).await,
        LookupOutcome::NotFound
    );
}

#[tokio::test]
async fn test_server_error_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let credential = Credential::new("secret");
    let client = client(&server.uri(), &credential);

    match client.lookup(&client.request(CODE)).await {
        LookupOutcome::TransportError(message) => assert!(message.starts_with("HTTP 502")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(credential.get(), "secret");
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Reserve a port, then free it so nothing listens there
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let credential = Credential::new("secret");
    let client = client(&format!("http://127.0.0.1:{}", port), &credential);

    match client.lookup(&client.request(CODE)).await {
        LookupOutcome::TransportError(message) => {
            assert!(!message.is_empty());
            assert!(!message.contains("secret"), "token leaked: {}", message);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(credential.get(), "secret");
}

#[tokio::test]
async fn test_spawned_lookup_reports_once() {
    let server = MockServer::start().await;
    mock_body(&server, r#"[{"name":"Example Product"}]"#).await;

    let credential = Credential::new("secret");
    let client = client(&server.uri(), &credential);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    client.spawn(&tokio::runtime::Handle::current(), client.request(CODE), tx);

    let result = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap();
    assert_eq!(
        result,
        Some(LookupResult {
            code: CODE.into(),
            outcome: LookupOutcome::Found("Example Product".into()),
        })
    );
    // Sender dropped after the single result
    assert_eq!(rx.recv().await, None);
}

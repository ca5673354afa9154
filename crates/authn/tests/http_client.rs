//! `HttpIdentityClient` against a mock Kratos server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::{sync::Arc, time::Duration};

use kratos_guard_authn::{
    ClientError, DefaultUserFactory, GuardConfig, GuardError, HttpIdentityClient, IdentityClient,
    InfrastructureError, KratosAuth, assert_guard_error,
    testutil::{RecordingReporter, request_with_cookie, sample_whoami_json},
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

const IDENTITY_ID: &str = "5b6f3a1c-0000-4000-8000-000000000002";
const COOKIE_HEADER: &str = "ory_kratos_session=MTcwMDAwMDAwMA";

fn kratos_error(code: u16, message: &str) -> serde_json::Value {
    json!({"error": {"code": code, "status": "error", "reason": "", "message": message}})
}

async fn mount_whoami(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/sessions/whoami"))
        .and(header("cookie", COOKIE_HEADER))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_resolve_session_success() {
    let server = MockServer::start().await;
    let body = sample_whoami_json(IDENTITY_ID);
    mount_whoami(&server, ResponseTemplate::new(200).set_body_json(body)).await;

    let client = HttpIdentityClient::new(&server.uri()).unwrap();
    let session = client.resolve_session(COOKIE_HEADER).await.unwrap();

    assert_eq!(session.identity_id(), IDENTITY_ID);
    assert_eq!(session.active, Some(true));
    assert_eq!(session.authenticator_assurance_level.as_deref(), Some("aal1"));
}

#[tokio::test]
async fn test_resolve_session_unauthorized() {
    let server = MockServer::start().await;
    mount_whoami(
        &server,
        ResponseTemplate::new(401)
            .set_body_json(kratos_error(401, "No valid session credentials found in the request.")),
    )
    .await;

    let client = HttpIdentityClient::new(&server.uri()).unwrap();
    let err = client.resolve_session(COOKIE_HEADER).await.unwrap_err();

    assert_eq!(err.status_code(), Some(401));
    assert_eq!(
        err.to_string(),
        "Identity provider responded with status 401: No valid session credentials found in the request."
    );
}

#[tokio::test]
async fn test_resolve_session_server_error_without_json() {
    let server = MockServer::start().await;
    mount_whoami(&server, ResponseTemplate::new(500).set_body_string("upstream exploded")).await;

    let client = HttpIdentityClient::new(&server.uri()).unwrap();
    let err = client.resolve_session(COOKIE_HEADER).await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::Status { status: 500, ref message } if message == "Internal Server Error"
    ));
}

#[tokio::test]
async fn test_resolve_session_invalid_body() {
    let server = MockServer::start().await;
    let body = json!({"unexpected": true});
    mount_whoami(&server, ResponseTemplate::new(200).set_body_json(body)).await;

    let client = HttpIdentityClient::new(&server.uri()).unwrap();
    let err = client.resolve_session(COOKIE_HEADER).await.unwrap_err();

    assert!(matches!(err, ClientError::Decode { .. }));
}

#[tokio::test]
async fn test_resolve_session_timeout() {
    let server = MockServer::start().await;
    mount_whoami(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(sample_whoami_json(IDENTITY_ID))
            .set_delay(Duration::from_secs(2)),
    )
    .await;

    let http = reqwest::Client::builder().timeout(Duration::from_millis(200)).build().unwrap();
    let client =
        HttpIdentityClient::with_http_client(http, &server.uri(), &server.uri(), false).unwrap();
    let err = client.resolve_session(COOKIE_HEADER).await.unwrap_err();

    assert!(matches!(err, ClientError::Timeout));
}

#[tokio::test]
async fn test_unreachable_provider_is_transport_error() {
    let client = HttpIdentityClient::new("http://127.0.0.1:9/").unwrap();
    let err = client.resolve_session(COOKIE_HEADER).await.unwrap_err();

    assert!(matches!(err, ClientError::Transport { .. } | ClientError::Timeout));
    assert_eq!(err.status_code(), None);
}

#[tokio::test]
async fn test_base_url_path_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/kratos/public/sessions/whoami"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_whoami_json(IDENTITY_ID)))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpIdentityClient::new(&format!("{}/kratos/public", server.uri())).unwrap();
    assert!(client.resolve_session(COOKIE_HEADER).await.is_ok());
}

#[tokio::test]
async fn test_create_logout_flow_with_return_to() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/self-service/logout/browser"))
        .and(query_param("return_to", "https://app.example.com/bye"))
        .and(header("cookie", COOKIE_HEADER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "logout_url": "http://kratos.test/self-service/logout?token=abc",
            "logout_token": "abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpIdentityClient::new(&server.uri()).unwrap();
    let flow = client
        .create_logout_flow(COOKIE_HEADER, Some("https://app.example.com/bye"))
        .await
        .unwrap();

    assert_eq!(flow.logout_url, "http://kratos.test/self-service/logout?token=abc");
    assert_eq!(flow.logout_token.as_deref(), Some("abc"));
}

#[tokio::test]
async fn test_create_logout_flow_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/self-service/logout/browser"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(kratos_error(401, "No active session")),
        )
        .mount(&server)
        .await;

    let client = HttpIdentityClient::new(&server.uri()).unwrap();
    let err = client.create_logout_flow(COOKIE_HEADER, None).await.unwrap_err();

    assert_eq!(err.status_code(), Some(401));
}

#[tokio::test]
async fn test_check_ready() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health/ready"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let client = HttpIdentityClient::new(&server.uri()).unwrap();
    client.check_ready().await.unwrap();
}

#[tokio::test]
async fn test_check_ready_not_ready() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health/ready"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_json(json!({"errors": {"database": "not migrated"}})),
        )
        .mount(&server)
        .await;

    let client = HttpIdentityClient::new(&server.uri()).unwrap();
    let err = client.check_ready().await.unwrap_err();

    match err {
        ClientError::NotReady(detail) => assert!(detail.contains("not migrated")),
        other => panic!("expected NotReady, got {other:?}"),
    }
}

#[tokio::test]
async fn test_check_ready_uses_admin_url() {
    let public = MockServer::start().await;
    let admin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health/ready"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&admin)
        .await;

    let config = GuardConfig::builder().url(public.uri()).admin_url(admin.uri()).build().unwrap();
    let client = HttpIdentityClient::from_config(&config).unwrap();

    client.check_ready().await.unwrap();
}

// ---------------------------------------------------------------------------
// Guard over HTTP
// ---------------------------------------------------------------------------

fn auth_for(server: &MockServer, reporter: Arc<RecordingReporter>) -> KratosAuth {
    let config = GuardConfig::builder()
        .url(server.uri())
        .logout_return_to("https://app.example.com/")
        .build()
        .unwrap();

    KratosAuth::builder()
        .config(config)
        .reporter(reporter)
        .user_factory(Arc::new(DefaultUserFactory))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_guard_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions/whoami"))
        .and(header("cookie", "ory_kratos_session=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_whoami_json(IDENTITY_ID)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/self-service/logout/browser"))
        .and(query_param("return_to", "https://app.example.com/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "logout_url": "http://kratos.test/self-service/logout?token=t"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reporter = Arc::new(RecordingReporter::new());
    let auth = auth_for(&server, Arc::clone(&reporter));
    let mut guard = auth.guard(request_with_cookie("ory_kratos_session", "abc"));

    assert!(guard.check().await.unwrap());
    assert_eq!(guard.user().await.unwrap().id(), Some(IDENTITY_ID));

    let redirect = guard.logout().await.unwrap();
    assert_eq!(redirect.location(), "http://kratos.test/self-service/logout?token=t");
    assert_eq!(reporter.count(), 0);
}

#[tokio::test]
async fn test_guard_provider_outage_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions/whoami"))
        .respond_with(ResponseTemplate::new(503).set_body_json(kratos_error(503, "maintenance")))
        .mount(&server)
        .await;

    let reporter = Arc::new(RecordingReporter::new());
    let auth = auth_for(&server, Arc::clone(&reporter));
    let mut guard = auth.guard(request_with_cookie("ory_kratos_session", "abc"));

    assert_guard_error!(
        guard.user().await,
        GuardError::Infrastructure(InfrastructureError::Provider(ClientError::Status {
            status: 503,
            ..
        }))
    );
    assert!(guard.check().await.is_err());
    assert_eq!(reporter.count(), 1);
    assert!(reporter.messages()[0].contains("maintenance"));
}

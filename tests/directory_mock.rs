//! Directory client tests against a mocked QRZ.com XML endpoint.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use qso_relay::{DirectoryClient, DirectoryConfig, LookupError, LookupState};
use tokio::net::TcpListener;

const SESSION_KEY: &str = "f894c4bd29f3923f3bacf02c532d7bd9";

const LOGIN_OK: &str = r#"<?xml version="1.0" ?>
<QRZDatabase version="1.34" xmlns="http://xmldata.qrz.com">
  <Session>
    <Key>f894c4bd29f3923f3bacf02c532d7bd9</Key>
    <Count>12</Count>
  </Session>
</QRZDatabase>"#;

const LOGIN_REJECTED: &str = r#"<?xml version="1.0" ?>
<QRZDatabase version="1.34" xmlns="http://xmldata.qrz.com">
  <Session>
    <Error>Username/password incorrect</Error>
  </Session>
</QRZDatabase>"#;

const W1AW: &str = r#"<?xml version="1.0" ?>
<QRZDatabase version="1.34" xmlns="http://xmldata.qrz.com">
  <Callsign>
    <call>W1AW</call>
    <fname>ARRL</fname>
    <name>HQ</name>
    <country>United States</country>
    <grid>FN31pr</grid>
  </Callsign>
  <Session>
    <Key>f894c4bd29f3923f3bacf02c532d7bd9</Key>
  </Session>
</QRZDatabase>"#;

const NOT_FOUND: &str = r#"<?xml version="1.0" ?>
<QRZDatabase version="1.34" xmlns="http://xmldata.qrz.com">
  <Session>
    <Error>Not found: XX9XX</Error>
    <Key>f894c4bd29f3923f3bacf02c532d7bd9</Key>
  </Session>
</QRZDatabase>"#;

/// Canned responses for the two request kinds.
struct MockQrz {
    login: (StatusCode, &'static str),
    query: (StatusCode, &'static str),
    delay: Duration,
    logins: AtomicUsize,
    queries: AtomicUsize,
    requests: Mutex<Vec<HashMap<String, String>>>,
}

impl MockQrz {
    fn new(login: &'static str, query: &'static str) -> Self {
        Self {
            login: (StatusCode::OK, login),
            query: (StatusCode::OK, query),
            delay: Duration::ZERO,
            logins: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }
}

async fn xml_handler(
    State(mock): State<Arc<MockQrz>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, &'static str) {
    mock.requests.lock().unwrap().push(params.clone());
    if !mock.delay.is_zero() {
        tokio::time::sleep(mock.delay).await;
    }

    if params.contains_key("username") {
        mock.logins.fetch_add(1, Ordering::SeqCst);
        mock.login
    } else {
        mock.queries.fetch_add(1, Ordering::SeqCst);
        mock.query
    }
}

/// Serve `mock` on an ephemeral port and return the endpoint URL.
async fn serve(mock: Arc<MockQrz>) -> String {
    let app = Router::new()
        .route("/xml/current/", get(xml_handler))
        .with_state(mock);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/xml/current/", addr)
}

fn client(url: String) -> DirectoryClient {
    let config = DirectoryConfig::with_credentials("w1aw", "secret").with_base_url(url);
    DirectoryClient::new(config).unwrap()
}

#[tokio::test]
async fn test_lookup_success() {
    let mock = Arc::new(MockQrz::new(LOGIN_OK, W1AW));
    let client = client(serve(Arc::clone(&mock)).await);

    let mut states = Vec::new();
    let record = client
        .lookup_observed("w1aw", |state| states.push(state))
        .await
        .unwrap();

    assert_eq!(
        states,
        [
            LookupState::Authenticating,
            LookupState::Querying,
            LookupState::Succeeded
        ]
    );
    assert_eq!(record.get("call"), Some("W1AW"));
    assert_eq!(record.name().as_deref(), Some("ARRL HQ"));
    assert_eq!(record.grid(), Some("FN31pr"));

    let requests = mock.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0]["username"], "w1aw");
    assert_eq!(requests[0]["password"], "secret");
    assert!(requests[0]["agent"].starts_with("qso-relay-"));
    assert_eq!(requests[1]["s"], SESSION_KEY);
    assert_eq!(requests[1]["callsign"], "W1AW");
}

#[tokio::test]
async fn test_rejected_login_never_queries() {
    let mock = Arc::new(MockQrz::new(LOGIN_REJECTED, W1AW));
    let client = client(serve(Arc::clone(&mock)).await);

    let mut states = Vec::new();
    let err = client
        .lookup_observed("W1AW", |state| states.push(state))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        LookupError::Authentication("Username/password incorrect".to_string())
    );
    assert_eq!(states, [LookupState::Authenticating, LookupState::Failed]);
    assert_eq!(mock.logins.load(Ordering::SeqCst), 1);
    assert_eq!(mock.queries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_callsign() {
    let mock = Arc::new(MockQrz::new(LOGIN_OK, NOT_FOUND));
    let client = client(serve(mock).await);

    let err = client.lookup_observed("XX9XX", |_| {}).await.unwrap_err();
    assert_eq!(err, LookupError::NotFound("Not found: XX9XX".to_string()));
}

#[tokio::test]
async fn test_http_error_status() {
    let mut mock = MockQrz::new(LOGIN_OK, W1AW);
    mock.login = (StatusCode::SERVICE_UNAVAILABLE, "down for maintenance");
    let client = client(serve(Arc::new(mock)).await);

    let err = client.authenticate().await.unwrap_err();
    assert!(matches!(
        err,
        LookupError::Transport {
            status: Some(503),
            ..
        }
    ));
}

#[tokio::test]
async fn test_malformed_query_response() {
    let mock = Arc::new(MockQrz::new(LOGIN_OK, "<QRZDatabase><Callsign><call>W1AW"));
    let client = client(serve(mock).await);

    let err = client.lookup_observed("W1AW", |_| {}).await.unwrap_err();
    assert!(matches!(err, LookupError::Protocol(_)));
}

#[tokio::test]
async fn test_request_timeout() {
    let mut mock = MockQrz::new(LOGIN_OK, W1AW);
    mock.delay = Duration::from_secs(5);
    let url = serve(Arc::new(mock)).await;

    let mut config = DirectoryConfig::with_credentials("w1aw", "secret").with_base_url(url);
    config.request_timeout = Duration::from_millis(200);
    let client = DirectoryClient::new(config).unwrap();

    let err = client.authenticate().await.unwrap_err();
    assert_eq!(
        err,
        LookupError::Transport {
            status: None,
            message: "Request timed out".to_string(),
        }
    );
}

#[tokio::test]
async fn test_unreachable_endpoint() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(format!("http://{}/xml/current/", addr));
    let err = client.authenticate().await.unwrap_err();
    assert!(matches!(err, LookupError::Transport { status: None, .. }));
    assert!(!err.to_string().contains("secret"));
}

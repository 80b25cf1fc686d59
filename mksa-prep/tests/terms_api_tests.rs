//! Terms API client tests against a local HTTP stub

use serial_test::serial;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use mksa_common::config::TermsApiConfig;
use mksa_common::terms::load_terms_csv;
use mksa_prep::pipeline::fetch_and_save_terms;
use mksa_prep::{ApiCredentials, PrepError, TermsClient};

const FALL_2023: &str = r#"{"response":{"terms":[{"name":"2023 Fall","sessions":[{"beginDate":"2023-08-16"}],"fullyGradedDeadline":"2024-01-03"}]}}"#;
const SPRING_2024: &str = r#"{"response":{"terms":[{"name":"2024 Spring","sessions":[{"beginDate":"2024-01-09"}],"fullyGradedDeadline":"2024-05-24"}]}}"#;
const NO_DEADLINE: &str = r#"{"response":{"terms":[{"name":"2024 Summer","sessions":[{"beginDate":"2024-05-28"}]}]}}"#;

fn route(request: &str) -> (&'static str, &'static str) {
    let request_line = request.lines().next().unwrap_or_default();
    let authorized = request.contains("app_id: test-id") && request.contains("app_key: test-key");
    if !authorized {
        return ("401 Unauthorized", "{}");
    }
    if !request_line.contains("career-code=ugrd") {
        return ("400 Bad Request", "{}");
    }
    if request_line.starts_with("GET /terms/2238?") {
        ("200 OK", FALL_2023)
    } else if request_line.starts_with("GET /terms/2242?") {
        ("200 OK", SPRING_2024)
    } else if request_line.starts_with("GET /terms/2245?") {
        ("200 OK", NO_DEADLINE)
    } else {
        ("404 Not Found", "{}")
    }
}

/// Serve canned term responses; returns the base URL
async fn spawn_stub() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let (status, body) = route(&request);
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{}/terms", addr)
}

fn api_config(base_url: String) -> TermsApiConfig {
    TermsApiConfig {
        base_url,
        timeout_secs: 5,
        ..TermsApiConfig::default()
    }
}

fn credentials() -> ApiCredentials {
    ApiCredentials {
        app_id: Some("test-id".to_string()),
        app_key: Some("test-key".to_string()),
    }
}

#[tokio::test]
async fn test_fetch_terms_skips_failures() {
    let config = api_config(spawn_stub().await);
    let client = TermsClient::new(&config, "test-id".to_string(), "test-key".to_string()).unwrap();

    let terms = client.fetch_terms(&[2238, 9999, 2245, 2242]).await;
    let names: Vec<&str> = terms.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["2023 Fall", "2024 Spring"]);
}

#[tokio::test]
async fn test_fetch_term_reports_status() {
    let config = api_config(spawn_stub().await);
    let client = TermsClient::new(&config, "wrong".to_string(), "test-key".to_string()).unwrap();

    let err = client.fetch_term(2238).await.unwrap_err();
    assert!(matches!(err, mksa_prep::TermsApiError::ApiError(401, _)));
}

#[tokio::test]
async fn test_fetch_and_save_terms_writes_cache() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("data").join("terms.csv");
    let config = api_config(spawn_stub().await);

    let terms = fetch_and_save_terms(&config, &credentials(), &[2242, 2238], &path)
        .await
        .unwrap();
    assert_eq!(terms.len(), 2);

    let calendar = load_terms_csv(&path).unwrap();
    assert_eq!(calendar.terms()[0].name, "2023 Fall");
    assert_eq!(calendar.terms()[1].name, "2024 Spring");
}

#[tokio::test]
async fn test_fetch_with_nothing_returned_is_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("terms.csv");
    let config = api_config(spawn_stub().await);

    let err = fetch_and_save_terms(&config, &credentials(), &[1111], &path)
        .await
        .unwrap_err();
    assert!(matches!(err, PrepError::NoTerms(_)));
    assert!(!path.exists());
}

#[tokio::test]
async fn test_missing_credentials() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = api_config("http://127.0.0.1:9/terms".to_string());
    let creds = ApiCredentials {
        app_id: Some("test-id".to_string()),
        app_key: None,
    };
    let err = fetch_and_save_terms(&config, &creds, &[2238], &dir.path().join("t.csv"))
        .await
        .unwrap_err();
    assert!(matches!(err, PrepError::NoTerms(_)));
}

#[test]
#[serial]
fn test_credentials_resolution_order() {
    std::env::remove_var("MKSA_APP_ID");
    std::env::set_var("APP_ID", "from-env");
    std::env::remove_var("MKSA_APP_KEY");
    std::env::remove_var("API_KEY");

    let config = TermsApiConfig {
        app_id: Some("from-config".to_string()),
        app_key: Some("key-from-config".to_string()),
        ..TermsApiConfig::default()
    };

    let creds = ApiCredentials::resolve(None, None, &config);
    assert_eq!(creds.app_id.as_deref(), Some("from-env"));
    assert_eq!(creds.app_key.as_deref(), Some("key-from-config"));

    let creds = ApiCredentials::resolve(Some("from-cli"), None, &config);
    assert_eq!(creds.app_id.as_deref(), Some("from-cli"));

    std::env::remove_var("APP_ID");
}

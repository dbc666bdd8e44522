use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use platewatch::source::{HttpSampleSource, SampleSource};
use platewatch::Error;

const ENDPOINT: &str = "/api/metrics/realtime";

async fn source_for(server: &MockServer, timeout: Duration) -> HttpSampleSource {
    HttpSampleSource::new(&format!("{}{ENDPOINT}", server.uri()), timeout).unwrap()
}

#[tokio::test]
async fn polls_first_record_of_data_array() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": [
                {"temperature": "TEMP_55.0C", "voltage": "VOLTAGE_30.0V"},
                {"temperature": "TEMP_20.0C"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sample = source_for(&server, Duration::from_secs(3))
        .await
        .poll()
        .await
        .unwrap();

    assert_eq!(sample.get("temperature"), Some(&json!("TEMP_55.0C")));
    assert_eq!(sample.len(), 2);
}

#[tokio::test]
async fn unwraps_broker_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "offset": 42,
                "partition": 0,
                "value": {"ph_level": "PH_2.0"}
            }]
        })))
        .mount(&server)
        .await;

    let sample = source_for(&server, Duration::from_secs(3))
        .await
        .poll()
        .await
        .unwrap();

    assert_eq!(sample.get("ph_level"), Some(&json!("PH_2.0")));
    assert!(sample.get("offset").is_none());
}

#[tokio::test]
async fn empty_data_is_empty_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let err = source_for(&server, Duration::from_secs(3))
        .await
        .poll()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::EmptyPayload));
}

#[tokio::test]
async fn server_error_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = source_for(&server, Duration::from_secs(3))
        .await
        .poll()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Http(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": [{"voltage": 12.0}]}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = source_for(&server, Duration::from_millis(200))
        .await
        .poll()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout(t) if t == Duration::from_millis(200)));
}

#[tokio::test]
async fn non_json_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = source_for(&server, Duration::from_secs(3)).await.poll().await;
    assert!(result.is_err());
}

#[test]
fn rejects_invalid_url() {
    let err = HttpSampleSource::new("not a url", Duration::from_secs(3)).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#![allow(clippy::unwrap_used)]
// Integration tests for the blocking facade. The blocking client owns its
// own runtime, so it runs on a plain thread next to the mock server.

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use isapi_api::blocking;
use isapi_api::{AuthScheme, Error, Method, RequestOptions, ReturnType};

async fn setup() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ISAPI/System/status"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    server
}

fn on_thread<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    std::thread::spawn(f).join().unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_get_and_auth() {
    let server = setup().await;
    Mock::given(method("GET"))
        .and(path("/ISAPI/System/deviceInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<DeviceInfo version="1.0"><deviceName>HIKVISION</deviceName></DeviceInfo>"#,
        ))
        .mount(&server)
        .await;

    let uri = server.uri();
    let (value, scheme) = on_thread(move || {
        let client = blocking::Client::new(uri, "admin", "12345").unwrap();
        let value = client.at("System/deviceInfo").get().unwrap().into_value();
        (value, client.auth_scheme())
    });

    assert_eq!(
        value,
        json!({"DeviceInfo": {"@version": "1.0", "deviceName": "HIKVISION"}})
    );
    assert_eq!(scheme, Some(AuthScheme::Basic));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_event_iterator() {
    let server = setup().await;
    let body: String = (1..=3)
        .map(|i| format!("--boundary\r\nContent-Type: application/xml\r\n\r\n<Event><id>{i}</id></Event>\r\n"))
        .collect::<String>()
        + "--boundary--\r\n";
    Mock::given(method("GET"))
        .and(path("/ISAPI/Event/notification/alertStream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "multipart/mixed; boundary=boundary"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let ids = on_thread(move || {
        let client = blocking::Client::new(uri, "admin", "12345").unwrap();
        client
            .at("Event/notification/alertStream")
            .stream()
            .unwrap()
            .map(|event| event.unwrap().into_value()["Event"]["id"].clone())
            .collect::<Vec<_>>()
    });

    assert_eq!(ids, vec![json!("1"), json!("2"), json!("3")]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_opaque_and_fallback() {
    let server = setup().await;
    let payload: Vec<u8> = (0..=255u8).collect();
    Mock::given(method("GET"))
        .and(path("/ISAPI/ContentMgmt/download"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(payload.clone(), "application/octet-stream"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ISAPI/ContentMgmt/download"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<ok/>"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let (bytes, fallback) = on_thread(move || {
        let client = blocking::Client::new(uri, "admin", "12345").unwrap();
        let handle = client.at("ContentMgmt/download");
        let bytes = handle.opaque().unwrap().collect_bytes().unwrap();
        let fallback = handle
            .invoke(RequestOptions::new(Method::POST).return_type(ReturnType::OpaqueData))
            .unwrap();
        (bytes, matches!(fallback, blocking::Reply::Body(_)))
    });

    assert_eq!(bytes.as_ref(), payload.as_slice());
    assert!(fallback);
}

#[test]
fn test_blocking_missing_method() {
    let client = blocking::Client::new("http://127.0.0.1:9", "admin", "12345").unwrap();
    let err = client.root().invoke(RequestOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

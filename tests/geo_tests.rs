/// Integration tests for the geolocation service with a mocked ip-api server
/// Exercises the success, failure and short-circuit paths without real network calls
use lead_intake_api::geo::GeoService;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_successful_lookup() {
    let mock_server = MockServer::start().await;

    let mock_response = serde_json::json!({
        "status": "success",
        "country": "United States",
        "countryCode": "US"
    });

    Mock::given(method("GET"))
        .and(path("/json/8.8.8.8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .mount(&mock_server)
        .await;

    let geo = GeoService::new(mock_server.uri());
    let info = geo.lookup("8.8.8.8").await;

    assert_eq!(info.country, "United States");
    assert_eq!(info.country_code, "US");
}

#[tokio::test]
async fn test_lookup_is_cached() {
    let mock_server = MockServer::start().await;

    let mock_response = serde_json::json!({
        "status": "success",
        "country": "Germany",
        "countryCode": "DE"
    });

    // The upstream must be hit exactly once; the second lookup comes from cache
    Mock::given(method("GET"))
        .and(path("/json/93.184.216.34"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .expect(1)
        .mount(&mock_server)
        .await;

    let geo = GeoService::new(mock_server.uri());

    let first = geo.lookup("93.184.216.34").await;
    let second = geo.lookup("93.184.216.34").await;

    assert_eq!(first.country, "Germany");
    assert_eq!(second.country, "Germany");
}

#[tokio::test]
async fn test_fail_status_degrades_to_unknown() {
    let mock_server = MockServer::start().await;

    // ip-api reports reserved addresses with status "fail"
    let mock_response = serde_json::json!({
        "status": "fail",
        "message": "reserved range"
    });

    Mock::given(method("GET"))
        .and(path("/json/203.0.113.9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .mount(&mock_server)
        .await;

    let geo = GeoService::new(mock_server.uri());
    let info = geo.lookup("203.0.113.9").await;

    assert_eq!(info.country, "Unknown");
    assert_eq!(info.country_code, "UNK");
}

#[tokio::test]
async fn test_http_error_degrades_to_unknown() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/json/198.51.100.7"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let geo = GeoService::new(mock_server.uri());
    let info = geo.lookup("198.51.100.7").await;

    assert_eq!(info.country, "Unknown");
    assert_eq!(info.country_code, "UNK");
}

#[tokio::test]
async fn test_private_ip_never_hits_upstream() {
    let mock_server = MockServer::start().await;

    // Zero expected requests: private ranges short-circuit locally
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let geo = GeoService::new(mock_server.uri());
    let info = geo.lookup("192.168.1.50").await;

    assert_eq!(info.country, "Local");
    assert_eq!(info.country_code, "LOC");
}

//! Integration tests for CensusGeocoder using wiremock.

use forecast_core::{CensusGeocoder, GeocoderError, GeocodingClient};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ADDRESS: &str = "4600 Silver Hill Rd, Washington, DC";
const GEOCODE_PATH: &str = "/geocoder/locations/onelineaddress";

fn address_match(zip: Option<&str>) -> serde_json::Value {
    let mut components = serde_json::json!({
        "streetName": "SILVER HILL",
        "city": "WASHINGTON",
        "state": "DC",
        "fromAddress": "4600",
        "toAddress": "4700"
    });
    if let Some(zip) = zip {
        components["zip"] = serde_json::json!(zip);
    }

    serde_json::json!({
        "tigerLine": { "side": "L", "tigerLineId": "76355984" },
        "coordinates": { "x": -76.927487242301, "y": 38.846016223866 },
        "addressComponents": components,
        "matchedAddress": "4600 SILVER HILL RD, WASHINGTON, DC, 20233"
    })
}

fn census_body(matches: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({
        "result": {
            "input": {
                "address": { "address": ADDRESS },
                "benchmark": { "isDefault": true, "id": "4", "benchmarkName": "Public_AR_Current" }
            },
            "addressMatches": matches
        }
    })
}

fn geocoder(server: &MockServer) -> CensusGeocoder {
    CensusGeocoder::new().with_base_url(server.uri())
}

#[tokio::test]
async fn test_geocode_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(GEOCODE_PATH))
        .and(query_param("address", ADDRESS))
        .and(query_param("benchmark", "Public_AR_Current"))
        .and(query_param("format", "json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(census_body(vec![address_match(Some("20233"))])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let location = geocoder(&mock_server).geocode(ADDRESS).await.unwrap();

    assert_eq!(location.latitude, 38.8460162);
    assert_eq!(location.longitude, -76.9274872);
    assert_eq!(location.postal_code.as_deref(), Some("20233"));
}

#[tokio::test]
async fn test_geocode_match_without_zip() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(GEOCODE_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(census_body(vec![address_match(None)])),
        )
        .mount(&mock_server)
        .await;

    let location = geocoder(&mock_server).geocode(ADDRESS).await.unwrap();
    assert_eq!(location.postal_code, None);
}

#[tokio::test]
async fn test_geocode_no_matches() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(GEOCODE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(census_body(vec![])))
        .mount(&mock_server)
        .await;

    let err = geocoder(&mock_server).geocode(ADDRESS).await.unwrap_err();

    assert_eq!(err, GeocoderError::AddressNotFound);
    assert_eq!(err.code(), Some("address_not_found"));
    assert_eq!(err.to_string(), "No matches found for address");
}

#[tokio::test]
async fn test_geocode_upstream_validation_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(GEOCODE_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "errors": ["Address cannot be empty and cannot exceed 100 characters"],
            "status": "400"
        })))
        .mount(&mock_server)
        .await;

    let err = geocoder(&mock_server).geocode(ADDRESS).await.unwrap_err();

    assert_eq!(err.to_string(), "Failed to geocode address");
    assert_eq!(err.code(), None);
    assert_eq!(
        err.reasons(),
        ["Address cannot be empty and cannot exceed 100 characters".to_string()]
    );
}

#[tokio::test]
async fn test_geocode_error_without_reasons_is_unknown() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(GEOCODE_PATH))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(serde_json::json!({ "status": "500" })),
        )
        .mount(&mock_server)
        .await;

    let err = geocoder(&mock_server).geocode(ADDRESS).await.unwrap_err();
    assert!(matches!(err, GeocoderError::Unknown { .. }), "unexpected error: {err:?}");
}

#[tokio::test]
async fn test_geocode_unparseable_error_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(GEOCODE_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&mock_server)
        .await;

    let err = geocoder(&mock_server).geocode(ADDRESS).await.unwrap_err();
    assert_eq!(err.code(), Some("parse_failure"));
}

#[tokio::test]
async fn test_geocode_unexpected_success_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(GEOCODE_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "unexpected": true })),
        )
        .mount(&mock_server)
        .await;

    let err = geocoder(&mock_server).geocode(ADDRESS).await.unwrap_err();
    assert!(matches!(err, GeocoderError::ParseFailure { .. }), "unexpected error: {err:?}");
}

#[tokio::test]
async fn test_geocode_transport_failure_is_unknown() {
    // Nothing listens on the discard port.
    let geocoder = CensusGeocoder::new().with_base_url("http://127.0.0.1:9");

    let err = geocoder.geocode(ADDRESS).await.unwrap_err();
    assert_eq!(err.code(), Some("unknown_error"));
}

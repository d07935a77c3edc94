//! HTTP lookup clients against a mock server

use serde_json::json;
use std::time::Duration;
use walks_geocode::models::Coordinate;
use walks_geocode::services::{CoordinateLookup, CoordinateLookupClient, NominatimClient, PlaceSearch};
use walks_geocode::LocationError;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER_AGENT: &str = "walks-geocode-tests";
const CANTERBURY: Coordinate = Coordinate { lat: 51.2798, lng: 1.0828 };

fn lookup_client(server: &MockServer) -> CoordinateLookupClient {
    CoordinateLookupClient::new(format!("{}/api/addresses/reverse-geocode", server.uri()), USER_AGENT, Duration::from_secs(5))
        .unwrap()
}

fn search_client(server: &MockServer) -> NominatimClient {
    NominatimClient::new(format!("{}/search", server.uri()), USER_AGENT, Duration::from_secs(5), 5, 0).unwrap()
}

#[tokio::test]
async fn test_reverse_geocode_array_takes_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/addresses/reverse-geocode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"postcode": "CT1 2EH", "gridReference6": "TR 150 577", "distance": 0.02},
            {"postcode": "CT1 2EG", "distance": 0.04}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let result = lookup_client(&server).reverse_geocode(CANTERBURY).await.unwrap();

    assert_eq!(result.postcode, "CT1 2EH");
    assert_eq!(result.grid_reference_6.as_deref(), Some("TR 150 577"));
    assert_eq!(result.distance_miles, Some(0.02));
}

#[tokio::test]
async fn test_grid_reference_lookup_single_object() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/addresses/reverse-geocode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "postcode": "CT5 1AB",
            "gridReference8": "TR 1066 6656",
            "latitude": 51.3607,
            "longitude": 1.0254
        })))
        .mount(&server)
        .await;

    let result = lookup_client(&server).grid_reference_lookup(CANTERBURY).await.unwrap();

    assert_eq!(result.postcode, "CT5 1AB");
    assert_eq!(result.grid_reference_8.as_deref(), Some("TR 1066 6656"));
    assert_eq!(result.coordinate, Some(Coordinate::new(51.3607, 1.0254)));
}

#[tokio::test]
async fn test_reverse_geocode_soft_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/error-field"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "No addresses within range"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/server-error"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/not-json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let client = |route: &str| {
        CoordinateLookupClient::new(format!("{}{}", server.uri(), route), USER_AGENT, Duration::from_secs(5)).unwrap()
    };

    // The service answered, but with nothing usable
    let answered = client("/error-field").reverse_geocode(CANTERBURY).await;
    assert!(matches!(answered, Err(LocationError::NoMatchFound(ref m)) if m.contains("No addresses within range")));

    // The service could not be asked
    for route in ["/server-error", "/not-json"] {
        let failure = client(route).reverse_geocode(CANTERBURY).await;
        assert!(matches!(failure, Err(LocationError::NetworkFailure(_))), "{} gave {:?}", route, failure);
    }
}

#[tokio::test]
async fn test_place_search_query_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Canterbury, Whitstable"))
        .and(query_param("format", "json"))
        .and(query_param("addressdetails", "1"))
        .and(query_param("countrycodes", "gb"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "lat": "51.3607",
                "lon": "1.0254",
                "display_name": "Whitstable, Canterbury, Kent, England, United Kingdom",
                "type": "town",
                "importance": 0.52,
                "address": {"town": "Whitstable", "county": "Kent", "country_code": "gb", "postcode": "CT5 1AB"}
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let results = search_client(&server).search("Canterbury, Whitstable").await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].coordinate(), Coordinate::new(51.3607, 1.0254));
    assert_eq!(results[0].address.postcode.as_deref(), Some("CT5 1AB"));
    assert_eq!(results[0].place_type_score(), 2);
}

#[tokio::test]
async fn test_place_search_error_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503).set_body_string("rate limited"))
        .mount(&server)
        .await;

    assert!(search_client(&server).search("Wye").await.is_empty());
}

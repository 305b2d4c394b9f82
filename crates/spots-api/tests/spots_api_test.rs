//! HTTP tests for the spots endpoints.
//!
//! Each test serves the full application on an ephemeral port, backed by the
//! in-memory store seeded with [`sample_spots`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};

use spots_api::config::RateLimitConfig;
use spots_api::{build_app, ServerConfig};
use spots_db::test_fixtures::sample_spots;
use spots_db::{MemorySpotRepository, Spot};

fn test_config() -> ServerConfig {
    ServerConfig {
        rate_limit: None,
        ..ServerConfig::default()
    }
}

/// Serve the app and return its base URL (e.g., "http://127.0.0.1:PORT").
async fn spawn_app_with(spots: Vec<Spot>, config: ServerConfig) -> String {
    let repo = Arc::new(MemorySpotRepository::with_spots(spots));
    let app = build_app(repo, &config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

async fn spawn_app() -> String {
    spawn_app_with(sample_spots(), test_config()).await
}

async fn get_json(url: &str) -> (StatusCode, Value) {
    let response = reqwest::get(url).await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

fn feature_ids(collection: &Value) -> Vec<i64> {
    collection["features"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["properties"]["spot_id"].as_i64().unwrap())
        .collect()
}

fn square(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Value {
    json!({
        "type": "Polygon",
        "coordinates": [[
            [min_lng, min_lat],
            [max_lng, min_lat],
            [max_lng, max_lat],
            [min_lng, max_lat],
            [min_lng, min_lat]
        ]]
    })
}

async fn post_within(base: &str, body: Value) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(format!("{}/api/spots/within/", base))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

// =============================================================================
// LIST / FILTER / ORDER / PAGINATE
// =============================================================================

#[tokio::test]
async fn test_list_spots_paginated() {
    let base = spawn_app().await;
    let (status, body) = get_json(&format!("{}/api/spots/", base)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 4);
    assert!(body["next"].is_null());
    assert!(body["previous"].is_null());
    assert_eq!(body["results"]["type"], "FeatureCollection");
    assert_eq!(feature_ids(&body["results"]), [101, 102, 103, 104]);
}

#[tokio::test]
async fn test_filter_by_sector() {
    let base = spawn_app().await;
    let (status, body) = get_json(&format!("{}/api/spots/?sector=9", base)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(feature_ids(&body["results"]), [101, 103]);
}

#[tokio::test]
async fn test_filter_by_municipality_is_case_insensitive() {
    let base = spawn_app().await;
    let (status, body) = get_json(&format!("{}/api/spots/?municipality=test%20a", base)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(feature_ids(&body["results"]), [101, 103]);
}

#[tokio::test]
async fn test_filter_combined() {
    let base = spawn_app().await;
    let (_, body) = get_json(&format!("{}/api/spots/?sector=9&type=1", base)).await;

    assert_eq!(body["count"], 1);
    assert_eq!(feature_ids(&body["results"]), [101]);
}

#[tokio::test]
async fn test_blank_filter_values_are_ignored() {
    let base = spawn_app().await;
    let (status, body) = get_json(&format!("{}/api/spots/?sector=&municipality=", base)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 4);
}

#[tokio::test]
async fn test_non_integer_sector_is_bad_request() {
    let base = spawn_app().await;
    let (status, body) = get_json(&format!("{}/api/spots/?sector=nine", base)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "sector: Enter a number.");
}

#[tokio::test]
async fn test_ordering_by_rent_desc_puts_missing_prices_last() {
    let base = spawn_app().await;
    let (_, body) = get_json(&format!(
        "{}/api/spots/?ordering=-spot_price_total_mxn_rent",
        base
    ))
    .await;

    assert_eq!(feature_ids(&body["results"]), [102, 101, 103, 104]);
}

#[tokio::test]
async fn test_ordering_by_area_asc() {
    let base = spawn_app().await;
    let (_, body) = get_json(&format!("{}/api/spots/?ordering=spot_area_in_sqm", base)).await;

    assert_eq!(feature_ids(&body["results"]), [103, 101, 102, 104]);
}

#[tokio::test]
async fn test_unknown_ordering_key_is_ignored() {
    let base = spawn_app().await;
    let (status, body) = get_json(&format!("{}/api/spots/?ordering=-location", base)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(feature_ids(&body["results"]), [101, 102, 103, 104]);
}

#[tokio::test]
async fn test_pagination_links_preserve_filters() {
    let base = spawn_app().await;
    let (_, first) = get_json(&format!("{}/api/spots/?page_size=2&type=1", base)).await;

    assert_eq!(first["count"], 3);
    assert_eq!(feature_ids(&first["results"]), [101, 102]);
    assert!(first["previous"].is_null());
    let next = first["next"].as_str().unwrap();
    assert_eq!(next, "/api/spots/?page_size=2&type=1&page=2");

    let (_, second) = get_json(&format!("{}{}", base, next)).await;
    assert_eq!(feature_ids(&second["results"]), [104]);
    assert!(second["next"].is_null());
    assert_eq!(second["previous"], "/api/spots/?page_size=2&type=1");
}

#[tokio::test]
async fn test_last_page_selector() {
    let base = spawn_app().await;
    let (status, body) = get_json(&format!("{}/api/spots/?page_size=3&page=last", base)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(feature_ids(&body["results"]), [104]);
}

#[tokio::test]
async fn test_invalid_page_is_not_found() {
    let base = spawn_app().await;
    for page in ["0", "abc", "3"] {
        let (status, body) =
            get_json(&format!("{}/api/spots/?page_size=2&page={}", base, page)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "page={}", page);
        assert_eq!(body["error"], "Invalid page.");
    }
}

#[tokio::test]
async fn test_page_beyond_any_offset_is_not_found() {
    let base = spawn_app().await;
    for page in ["9223372036854775807", "400000000000000000"] {
        let (status, body) = get_json(&format!("{}/api/spots/?page={}", base, page)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "page={}", page);
        assert_eq!(body["error"], "Invalid page.");
    }

    // Beyond i64 the number no longer parses.
    let (status, _) = get_json(&format!("{}/api/spots/?page=9223372036854775808", base)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_store_lists_an_empty_first_page() {
    let base = spawn_app_with(Vec::new(), test_config()).await;
    let (status, body) = get_json(&format!("{}/api/spots/", base)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
    assert!(feature_ids(&body["results"]).is_empty());
}

// =============================================================================
// DETAIL
// =============================================================================

#[tokio::test]
async fn test_spot_detail_found() {
    let base = spawn_app().await;
    let (status, body) = get_json(&format!("{}/api/spots/101/", base)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "Feature");
    assert_eq!(body["id"], 101);
    assert_eq!(body["geometry"]["type"], "Point");
    assert_eq!(body["geometry"]["coordinates"], json!([-99.1, 19.1]));
    assert_eq!(body["properties"]["spot_municipality"], "Test A");
    assert_eq!(body["properties"]["spot_latitude"], 19.1);
    assert_eq!(body["properties"]["spot_longitude"], -99.1);
    assert_eq!(body["properties"]["spot_created_date"], "2024-01-15");
    assert!(body["properties"]["public_id"].is_null());
}

#[tokio::test]
async fn test_spot_detail_without_location_has_null_geometry() {
    let base = spawn_app_with(vec![Spot::new(7)], test_config()).await;
    let (status, body) = get_json(&format!("{}/api/spots/7/", base)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["geometry"].is_null());
    assert!(body["properties"]["spot_latitude"].is_null());
}

#[tokio::test]
async fn test_spot_detail_not_found() {
    let base = spawn_app().await;
    let (status, body) = get_json(&format!("{}/api/spots/9999/", base)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = get_json(&format!("{}/api/spots/abc/", base)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// NEARBY
// =============================================================================

#[tokio::test]
async fn test_nearby_spots() {
    let base = spawn_app().await;
    let (status, body) = get_json(&format!(
        "{}/api/spots/nearby/?lng=-99.151&lat=19.151&radius=6000",
        base
    ))
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(feature_ids(&body), [103]);
}

#[tokio::test]
async fn test_nearby_spots_finds_multiple_nearest_first() {
    let base = spawn_app().await;
    let (_, body) = get_json(&format!(
        "{}/api/spots/nearby/?lng=-99.12&lat=19.12&radius=50000",
        base
    ))
    .await;

    assert_eq!(feature_ids(&body), [101, 103, 102, 104]);
}

#[tokio::test]
async fn test_nearby_with_incomplete_parameters_is_empty() {
    let base = spawn_app().await;
    for query in [
        "lng=-99.12&lat=19.12",
        "lat=19.12&radius=5000",
        "lng=abc&lat=19.12&radius=5000",
        "lng=-99.12&lat=19.12&radius=",
        "lng=-99&lat=95&radius=10",
        "lng=-181&lat=19.12&radius=10",
        "",
    ] {
        let (status, body) = get_json(&format!("{}/api/spots/nearby/?{}", base, query)).await;
        assert_eq!(status, StatusCode::OK, "query={}", query);
        assert_eq!(body, json!({"type": "FeatureCollection", "features": []}));
    }
}

// =============================================================================
// WITHIN POLYGON
// =============================================================================

#[tokio::test]
async fn test_within_polygon() {
    let base = spawn_app().await;
    let (status, body) = post_within(
        &base,
        json!({"polygon": square(-99.11, 19.09, -99.09, 19.11)}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(feature_ids(&body), [101]);
}

#[tokio::test]
async fn test_within_polygon_empty() {
    let base = spawn_app().await;
    let (status, body) =
        post_within(&base, json!({"polygon": square(-100.1, 20.0, -100.0, 20.1)})).await;

    assert_eq!(status, StatusCode::OK);
    assert!(feature_ids(&body).is_empty());
}

#[tokio::test]
async fn test_within_polygon_accepts_string_geometry() {
    let base = spawn_app().await;
    let polygon = square(-99.11, 19.09, -99.09, 19.11).to_string();
    let (status, body) = post_within(&base, json!({ "polygon": polygon })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(feature_ids(&body), [101]);
}

#[tokio::test]
async fn test_within_missing_polygon() {
    let base = spawn_app().await;
    let (status, body) = post_within(&base, json!({"shape": {}})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing 'polygon' in request body.");
}

#[tokio::test]
async fn test_within_rejects_non_polygon_geometry() {
    let base = spawn_app().await;
    let (status, body) = post_within(
        &base,
        json!({"polygon": {"type": "Point", "coordinates": [-99.1, 19.1]}}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Geometry type must be 'Polygon'.");
}

#[tokio::test]
async fn test_within_rejects_malformed_polygon() {
    let base = spawn_app().await;
    let unclosed = json!({
        "type": "Polygon",
        "coordinates": [[[-99.0, 19.0], [-98.0, 19.0], [-98.0, 20.0], [-99.0, 20.0]]]
    });
    let (status, body) = post_within(&base, json!({ "polygon": unclosed })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid polygon data provided."));
}

#[tokio::test]
async fn test_within_rejects_malformed_json_body() {
    let base = spawn_app().await;
    let response = reqwest::Client::new()
        .post(format!("{}/api/spots/within/", base))
        .header("content-type", "application/json")
        .body("{\"polygon\": ")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

// =============================================================================
// AGGREGATES
// =============================================================================

#[tokio::test]
async fn test_average_price_by_sector() {
    let base = spawn_app().await;
    let (status, body) = get_json(&format!("{}/api/spots/average-price-by-sector/", base)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            {"sector_id": 9, "average_price": 12500.0},
            {"sector_id": 11, "average_price": 25000.0}
        ])
    );
}

#[tokio::test]
async fn test_top_rent() {
    let base = spawn_app().await;
    let (status, body) = get_json(&format!("{}/api/spots/top-rent/?limit=2", base)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(feature_ids(&body), [102, 101]);
}

#[tokio::test]
async fn test_top_rent_invalid_limit_falls_back_to_default() {
    let base = spawn_app().await;
    for limit in ["0", "-5", "ten"] {
        let (status, body) =
            get_json(&format!("{}/api/spots/top-rent/?limit={}", base, limit)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(feature_ids(&body), [102, 101, 103], "limit={}", limit);
    }
}

// =============================================================================
// AMBIENT
// =============================================================================

#[tokio::test]
async fn test_health_check_is_unprefixed() {
    let base = spawn_app().await;
    let (status, body) = get_json(&format!("{}/health", base)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let base = spawn_app().await;
    let response = reqwest::get(format!("{}/api/spots/top-rent/", base))
        .await
        .unwrap();

    let id = response.headers().get("x-request-id").unwrap();
    assert!(uuid_like(id.to_str().unwrap()));
}

fn uuid_like(s: &str) -> bool {
    s.len() == 36 && s.chars().filter(|c| *c == '-').count() == 4
}

#[tokio::test]
async fn test_custom_prefix() {
    let config = ServerConfig {
        api_prefix: "/v2".to_string(),
        ..test_config()
    };
    let base = spawn_app_with(sample_spots(), config).await;

    let (status, _) = get_json(&format!("{}/v2/spots/101/", base)).await;
    assert_eq!(status, StatusCode::OK);
    let response = reqwest::get(format!("{}/api/spots/101/", base)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rate_limit_rejects_excess_requests() {
    let config = ServerConfig {
        rate_limit: Some(RateLimitConfig {
            requests: 2,
            period: Duration::from_secs(3600),
        }),
        ..ServerConfig::default()
    };
    let base = spawn_app_with(sample_spots(), config).await;
    let url = format!("{}/health", base);

    assert_eq!(reqwest::get(&url).await.unwrap().status(), StatusCode::OK);
    assert_eq!(reqwest::get(&url).await.unwrap().status(), StatusCode::OK);
    assert_eq!(
        reqwest::get(&url).await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

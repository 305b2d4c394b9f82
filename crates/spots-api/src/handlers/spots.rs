//! Spot HTTP handlers.
//!
//! Every endpoint returns GeoJSON except the sector averages, which are a
//! flat list of `{sector_id, average_price}` pairs.

use axum::{
    extract::{rejection::JsonRejection, OriginalUri, Path, Query, State},
    Json,
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use spots_core::{
    top_rent_limit, Feature, FeatureCollection, ListSpotsRequest, PolygonBoundary,
    SectorAveragePrice,
};

use crate::query_types::{
    page_link, ListSpotsQuery, NearbyQuery, PageSelector, TopRentQuery, INVALID_PAGE,
};
use crate::{ApiError, AppState};

/// One page of a spot listing.
#[derive(Debug, Serialize)]
pub struct PaginatedSpots {
    /// Total matches across all pages.
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: FeatureCollection,
}

fn page_count(total: i64, page_size: i64) -> i64 {
    if total == 0 {
        1
    } else {
        (total + page_size - 1) / page_size
    }
}

/// List spots, filtered and ordered, one page at a time.
///
/// # Query Parameters
/// - `sector`, `type`: exact ids (400 if not integers)
/// - `municipality`: case-insensitive substring
/// - `ordering`: `field` or `-field`
/// - `page`, `page_size`
///
/// # Returns
/// - 200 OK with `{count, next, previous, results}`
/// - 404 Not Found for a page outside the listing
pub async fn list_spots(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<ListSpotsQuery>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<PaginatedSpots>, ApiError> {
    let page_size = query.page_size();
    let mut req = ListSpotsRequest {
        filter: query.filter()?,
        ordering: query.ordering(),
        page: 1,
        page_size,
    };

    let mut response = match query.page()? {
        PageSelector::Number(page) => {
            req.page = page;
            state.spots.list(req.clone()).await?
        }
        PageSelector::Last => {
            let first = state.spots.list(req.clone()).await?;
            req.page = page_count(first.total, page_size);
            if req.page == 1 {
                first
            } else {
                state.spots.list(req.clone()).await?
            }
        }
    };

    let pages = page_count(response.total, page_size);
    if req.page > pages {
        return Err(ApiError::NotFound(INVALID_PAGE.to_string()));
    }

    let path = uri.path();
    let next = (req.page < pages).then(|| page_link(path, &params, req.page + 1));
    let previous = (req.page > 1).then(|| page_link(path, &params, req.page - 1));

    debug!(
        page = req.page,
        page_size,
        count = response.total,
        result_count = response.spots.len(),
        "Listed spots"
    );

    let spots = std::mem::take(&mut response.spots);
    Ok(Json(PaginatedSpots {
        count: response.total,
        next,
        previous,
        results: FeatureCollection::from_spots(&spots),
    }))
}

/// Fetch one spot as a feature.
///
/// # Returns
/// - 200 OK with the feature
/// - 404 Not Found if the id is unknown or not an integer
pub async fn get_spot(
    State(state): State<AppState>,
    Path(spot_id): Path<String>,
) -> Result<Json<Feature>, ApiError> {
    let spot_id: i32 = spot_id
        .parse()
        .map_err(|_| ApiError::NotFound("Not found.".to_string()))?;
    let spot = state.spots.fetch(spot_id).await?;
    Ok(Json(Feature::from(&spot)))
}

/// Spots within `radius` meters of (`lat`, `lng`), nearest first.
///
/// Missing or non-numeric parameters yield an empty collection.
pub async fn nearby_spots(
    State(state): State<AppState>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<FeatureCollection>, ApiError> {
    let Some(req) = query.request() else {
        debug!("Incomplete nearby search, returning no spots");
        return Ok(Json(FeatureCollection::default()));
    };
    let spots = state.spots.nearby(req).await?;
    Ok(Json(FeatureCollection::from_spots(&spots)))
}

/// Spots inside or on the boundary of the polygon in the request body.
///
/// # Request Body
/// `{"polygon": <GeoJSON Polygon>}`; the polygon may also be a JSON string.
///
/// # Returns
/// - 200 OK with the matching features
/// - 400 Bad Request for a missing, malformed, or non-polygon geometry
pub async fn spots_within(
    State(state): State<AppState>,
    body: Result<Json<JsonValue>, JsonRejection>,
) -> Result<Json<FeatureCollection>, ApiError> {
    let Json(body) = body?;
    let polygon = polygon_member(&body)?;
    let boundary = PolygonBoundary::from_value(polygon)?;
    let spots = state.spots.within(&boundary).await?;
    Ok(Json(FeatureCollection::from_spots(&spots)))
}

/// The `polygon` member, treating null and empty values as absent.
fn polygon_member(body: &JsonValue) -> Result<&JsonValue, ApiError> {
    let missing = || ApiError::BadRequest("Missing 'polygon' in request body.".to_string());
    let value = body.get("polygon").ok_or_else(missing)?;
    let empty = match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.is_empty(),
        JsonValue::Object(o) => o.is_empty(),
        JsonValue::Array(a) => a.is_empty(),
        JsonValue::Bool(b) => !b,
        JsonValue::Number(_) => false,
    };
    if empty {
        return Err(missing());
    }
    Ok(value)
}

/// Mean total rent price per sector, sector ascending.
pub async fn average_price_by_sector(
    State(state): State<AppState>,
) -> Result<Json<Vec<SectorAveragePrice>>, ApiError> {
    Ok(Json(state.spots.average_price_by_sector().await?))
}

/// The most expensive spots by total rent.
///
/// `limit` defaults to 10; non-positive or unparsable values also mean 10.
pub async fn top_rent(
    State(state): State<AppState>,
    Query(query): Query<TopRentQuery>,
) -> Result<Json<FeatureCollection>, ApiError> {
    let limit = top_rent_limit(query.limit.as_deref());
    let spots = state.spots.top_rent(limit).await?;
    Ok(Json(FeatureCollection::from_spots(&spots)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_count_treats_empty_listing_as_one_page() {
        assert_eq!(page_count(0, 25), 1);
        assert_eq!(page_count(25, 25), 1);
        assert_eq!(page_count(26, 25), 2);
    }

    #[test]
    fn polygon_member_rejects_absent_or_empty_values() {
        for body in [
            json!({}),
            json!({"polygon": null}),
            json!({"polygon": ""}),
            json!({"polygon": {}}),
        ] {
            let err = polygon_member(&body).unwrap_err();
            assert_eq!(err.to_string(), "Missing 'polygon' in request body.");
        }
        assert!(polygon_member(&json!({"polygon": {"type": "Polygon"}})).is_ok());
    }
}

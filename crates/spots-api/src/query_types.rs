//! Query parameter types for the spots endpoints.
//!
//! Every parameter is accepted as a raw string so that malformed values can
//! be reported (or tolerated) with the behaviour each endpoint defines,
//! instead of axum's generic deserialization rejection.

use serde::Deserialize;

use spots_core::{clamp_page_size, NearbyRequest, SpotFilter, SpotOrdering};

use crate::error::ApiError;

/// Message returned for any unusable page number.
pub const INVALID_PAGE: &str = "Invalid page.";

/// Query parameters for `GET /spots/`.
#[derive(Debug, Default, Deserialize)]
pub struct ListSpotsQuery {
    /// Exact sector id.
    pub sector: Option<String>,
    /// Exact type id.
    #[serde(rename = "type")]
    pub type_id: Option<String>,
    /// Case-insensitive municipality substring.
    pub municipality: Option<String>,
    /// `field` or `-field`.
    pub ordering: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// A requested page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSelector {
    Number(i64),
    Last,
}

impl ListSpotsQuery {
    /// Attribute filter. Blank values are ignored; non-integer ids are
    /// rejected.
    pub fn filter(&self) -> Result<SpotFilter, ApiError> {
        Ok(SpotFilter {
            sector_id: parse_id("sector", self.sector.as_deref())?,
            type_id: parse_id("type", self.type_id.as_deref())?,
            municipality: non_blank(self.municipality.as_deref()).map(str::to_string),
        })
    }

    /// Requested ordering; unknown keys fall back to the default order.
    pub fn ordering(&self) -> Option<SpotOrdering> {
        non_blank(self.ordering.as_deref()).and_then(SpotOrdering::parse)
    }

    /// Page size, clamped. An unparsable value uses the default.
    pub fn page_size(&self) -> i64 {
        clamp_page_size(
            non_blank(self.page_size.as_deref()).and_then(|s| s.parse::<i64>().ok()),
        )
    }

    /// Requested page: a positive integer or `last`.
    pub fn page(&self) -> Result<PageSelector, ApiError> {
        match non_blank(self.page.as_deref()) {
            None => Ok(PageSelector::Number(1)),
            Some("last") => Ok(PageSelector::Last),
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if n >= 1 => Ok(PageSelector::Number(n)),
                _ => Err(ApiError::NotFound(INVALID_PAGE.to_string())),
            },
        }
    }
}

/// Query parameters for `GET /spots/nearby/`.
#[derive(Debug, Default, Deserialize)]
pub struct NearbyQuery {
    pub lat: Option<String>,
    pub lng: Option<String>,
    /// Meters.
    pub radius: Option<String>,
}

impl NearbyQuery {
    /// `None` when the search is incomplete; the endpoint answers with an
    /// empty collection.
    pub fn request(&self) -> Option<NearbyRequest> {
        NearbyRequest::parse(
            self.lat.as_deref(),
            self.lng.as_deref(),
            self.radius.as_deref(),
        )
    }
}

/// Query parameters for `GET /spots/top-rent/`.
#[derive(Debug, Default, Deserialize)]
pub struct TopRentQuery {
    pub limit: Option<String>,
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_id(name: &str, raw: Option<&str>) -> Result<Option<i32>, ApiError> {
    match non_blank(raw) {
        None => Ok(None),
        Some(value) => value
            .parse::<i32>()
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("{}: Enter a number.", name))),
    }
}

// =============================================================================
// PAGINATION LINKS
// =============================================================================

/// Relative link to `page` of the same listing, keeping every other query
/// parameter in its original position. Page 1 is linked without a `page`
/// parameter.
pub fn page_link(path: &str, params: &[(String, String)], page: i64) -> String {
    let mut pairs: Vec<(String, String)> = Vec::with_capacity(params.len() + 1);
    let mut replaced = false;

    for (key, value) in params {
        if key == "page" {
            if !replaced && page > 1 {
                pairs.push((key.clone(), page.to_string()));
            }
            replaced = true;
        } else {
            pairs.push((key.clone(), value.clone()));
        }
    }
    if !replaced && page > 1 {
        pairs.push(("page".to_string(), page.to_string()));
    }

    if pairs.is_empty() {
        return path.to_string();
    }

    let query = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", path, query)
}

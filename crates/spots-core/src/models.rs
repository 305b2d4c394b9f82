//! Core data models for the spots API.
//!
//! A `Spot` is a single commercial real-estate listing with an optional
//! geographic location and optional descriptive and pricing attributes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Spatial reference system of every stored geometry (WGS84).
pub const SRID: i32 = 4326;

/// Data source tag applied when none is given.
pub const DEFAULT_DATA_SOURCE: &str = "csv";

/// Maximum length of `public_id`.
pub const PUBLIC_ID_MAX_LEN: usize = 50;

/// Maximum length of `data_source`.
pub const DATA_SOURCE_MAX_LEN: usize = 10;

// =============================================================================
// LOCATION
// =============================================================================

/// A WGS84 point. Longitude first, as in GeoJSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub longitude: f64,
    pub latitude: f64,
}

impl Location {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// GeoJSON position (`[lng, lat]`).
    pub fn coordinates(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

// =============================================================================
// SPOT
// =============================================================================

/// A spot record as held by the store.
///
/// The scalar latitude/longitude exposed to clients are derived from
/// `location`; there is no separate storage for them.
#[derive(Debug, Clone, PartialEq)]
pub struct Spot {
    pub spot_id: i32,
    /// External identifier (e.g. `EB-PV4135`), unique when present.
    pub public_id: Option<String>,
    pub location: Option<Location>,

    pub spot_sector_id: Option<i32>,
    pub spot_type_id: Option<i32>,
    /// Rent, Sale, or both. Free text as delivered by the source.
    pub spot_modality: Option<String>,

    pub spot_settlement: Option<String>,
    pub spot_municipality: Option<String>,
    pub spot_state: Option<String>,
    pub spot_region: Option<String>,
    pub spot_corridor: Option<String>,
    pub spot_address: Option<String>,

    pub spot_title: Option<String>,
    pub spot_description: Option<String>,

    pub spot_area_in_sqm: Option<f64>,
    pub spot_price_sqm_mxn_rent: Option<f64>,
    pub spot_price_total_mxn_rent: Option<f64>,
    pub spot_price_sqm_mxn_sale: Option<f64>,
    pub spot_price_total_mxn_sale: Option<f64>,
    pub spot_maintenance_cost: Option<f64>,

    pub user_id: Option<i32>,
    pub spot_created_date: Option<NaiveDate>,
    /// Batch origin of the record ("csv", "json", ...).
    pub data_source: String,
}

impl Spot {
    /// A spot with only its identifier set.
    pub fn new(spot_id: i32) -> Self {
        Self {
            spot_id,
            public_id: None,
            location: None,
            spot_sector_id: None,
            spot_type_id: None,
            spot_modality: None,
            spot_settlement: None,
            spot_municipality: None,
            spot_state: None,
            spot_region: None,
            spot_corridor: None,
            spot_address: None,
            spot_title: None,
            spot_description: None,
            spot_area_in_sqm: None,
            spot_price_sqm_mxn_rent: None,
            spot_price_total_mxn_rent: None,
            spot_price_sqm_mxn_sale: None,
            spot_price_total_mxn_sale: None,
            spot_maintenance_cost: None,
            user_id: None,
            spot_created_date: None,
            data_source: DEFAULT_DATA_SOURCE.to_string(),
        }
    }

    pub fn latitude(&self) -> Option<f64> {
        self.location.map(|l| l.latitude)
    }

    pub fn longitude(&self) -> Option<f64> {
        self.location.map(|l| l.longitude)
    }

    /// Builder-style setter for the location.
    pub fn at(mut self, longitude: f64, latitude: f64) -> Self {
        self.location = Some(Location::new(longitude, latitude));
        self
    }
}

// =============================================================================
// AGGREGATES
// =============================================================================

/// Mean total rent price of one sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorAveragePrice {
    /// `None` groups spots that have a rent price but no sector.
    pub sector_id: Option<i32>,
    pub average_price: f64,
}

/// Result of a store write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

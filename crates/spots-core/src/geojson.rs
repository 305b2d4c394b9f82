//! GeoJSON representation of spots and query geometries.
//!
//! Spots serialize as `Feature` objects whose `geometry` is the spot location
//! (or `null`) and whose `properties` carry every other attribute. Absent
//! attributes serialize as `null` rather than being omitted, since absence
//! means "unknown" and clients rely on a stable key set.
//!
//! Polygon input is validated here, before it reaches any store, so malformed
//! geometry is always reported as a client error.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::models::{Location, Spot, DEFAULT_DATA_SOURCE};

/// Every geometry type name defined by RFC 7946.
const GEOMETRY_TYPES: &[&str] = &[
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

/// Minimum positions in a closed linear ring.
const MIN_RING_POSITIONS: usize = 4;

const INVALID_POLYGON_PREFIX: &str = "Invalid polygon data provided.";

// =============================================================================
// FEATURE TYPES
// =============================================================================

/// The `"type": "Feature"` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FeatureType {
    #[default]
    Feature,
}

/// The `"type": "FeatureCollection"` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FeatureCollectionType {
    #[default]
    FeatureCollection,
}

/// Point geometry of a spot feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PointGeometry {
    Point { coordinates: [f64; 2] },
}

impl From<Location> for PointGeometry {
    fn from(location: Location) -> Self {
        PointGeometry::Point {
            coordinates: location.coordinates(),
        }
    }
}

impl From<PointGeometry> for Location {
    fn from(geometry: PointGeometry) -> Self {
        match geometry {
            PointGeometry::Point {
                coordinates: [longitude, latitude],
            } => Location::new(longitude, latitude),
        }
    }
}

/// Non-geometry attributes of a spot, in wire order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotProperties {
    pub spot_id: i32,
    pub public_id: Option<String>,
    pub spot_sector_id: Option<i32>,
    pub spot_type_id: Option<i32>,
    pub spot_settlement: Option<String>,
    pub spot_municipality: Option<String>,
    pub spot_state: Option<String>,
    pub spot_region: Option<String>,
    pub spot_corridor: Option<String>,
    pub spot_address: Option<String>,
    pub spot_title: Option<String>,
    pub spot_description: Option<String>,
    pub spot_latitude: Option<f64>,
    pub spot_longitude: Option<f64>,
    pub spot_area_in_sqm: Option<f64>,
    pub spot_price_sqm_mxn_rent: Option<f64>,
    pub spot_price_total_mxn_rent: Option<f64>,
    pub spot_price_sqm_mxn_sale: Option<f64>,
    pub spot_price_total_mxn_sale: Option<f64>,
    pub spot_maintenance_cost: Option<f64>,
    pub spot_modality: Option<String>,
    pub user_id: Option<i32>,
    pub spot_created_date: Option<NaiveDate>,
    #[serde(default = "default_data_source")]
    pub data_source: String,
}

fn default_data_source() -> String {
    DEFAULT_DATA_SOURCE.to_string()
}

impl From<&Spot> for SpotProperties {
    fn from(spot: &Spot) -> Self {
        Self {
            spot_id: spot.spot_id,
            public_id: spot.public_id.clone(),
            spot_sector_id: spot.spot_sector_id,
            spot_type_id: spot.spot_type_id,
            spot_settlement: spot.spot_settlement.clone(),
            spot_municipality: spot.spot_municipality.clone(),
            spot_state: spot.spot_state.clone(),
            spot_region: spot.spot_region.clone(),
            spot_corridor: spot.spot_corridor.clone(),
            spot_address: spot.spot_address.clone(),
            spot_title: spot.spot_title.clone(),
            spot_description: spot.spot_description.clone(),
            spot_latitude: spot.latitude(),
            spot_longitude: spot.longitude(),
            spot_area_in_sqm: spot.spot_area_in_sqm,
            spot_price_sqm_mxn_rent: spot.spot_price_sqm_mxn_rent,
            spot_price_total_mxn_rent: spot.spot_price_total_mxn_rent,
            spot_price_sqm_mxn_sale: spot.spot_price_sqm_mxn_sale,
            spot_price_total_mxn_sale: spot.spot_price_total_mxn_sale,
            spot_maintenance_cost: spot.spot_maintenance_cost,
            spot_modality: spot.spot_modality.clone(),
            user_id: spot.user_id,
            spot_created_date: spot.spot_created_date,
            data_source: spot.data_source.clone(),
        }
    }
}

/// A single spot as a GeoJSON feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: FeatureType,
    pub id: i32,
    pub geometry: Option<PointGeometry>,
    pub properties: SpotProperties,
}

impl From<&Spot> for Feature {
    fn from(spot: &Spot) -> Self {
        Self {
            kind: FeatureType::Feature,
            id: spot.spot_id,
            geometry: spot.location.map(PointGeometry::from),
            properties: SpotProperties::from(spot),
        }
    }
}

/// Read a feature back into a spot.
///
/// The geometry is authoritative for the location; the scalar
/// `spot_latitude`/`spot_longitude` properties are ignored.
impl From<Feature> for Spot {
    fn from(feature: Feature) -> Self {
        let p = feature.properties;
        Spot {
            spot_id: p.spot_id,
            public_id: p.public_id,
            location: feature.geometry.map(Location::from),
            spot_sector_id: p.spot_sector_id,
            spot_type_id: p.spot_type_id,
            spot_modality: p.spot_modality,
            spot_settlement: p.spot_settlement,
            spot_municipality: p.spot_municipality,
            spot_state: p.spot_state,
            spot_region: p.spot_region,
            spot_corridor: p.spot_corridor,
            spot_address: p.spot_address,
            spot_title: p.spot_title,
            spot_description: p.spot_description,
            spot_area_in_sqm: p.spot_area_in_sqm,
            spot_price_sqm_mxn_rent: p.spot_price_sqm_mxn_rent,
            spot_price_total_mxn_rent: p.spot_price_total_mxn_rent,
            spot_price_sqm_mxn_sale: p.spot_price_sqm_mxn_sale,
            spot_price_total_mxn_sale: p.spot_price_total_mxn_sale,
            spot_maintenance_cost: p.spot_maintenance_cost,
            user_id: p.user_id,
            spot_created_date: p.spot_created_date,
            data_source: p.data_source,
        }
    }
}

/// A list of spots as a GeoJSON feature collection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: FeatureCollectionType,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: FeatureCollectionType::FeatureCollection,
            features,
        }
    }

    pub fn from_spots(spots: &[Spot]) -> Self {
        spots.iter().map(Feature::from).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// =============================================================================
// POLYGON INPUT
// =============================================================================

/// A validated GeoJSON polygon: one exterior ring followed by zero or more
/// holes. Every ring is closed and has at least four positions.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonBoundary {
    rings: Vec<Vec<[f64; 2]>>,
}

impl PolygonBoundary {
    /// Validate raw rings of `[lng, lat]` positions.
    pub fn from_rings(rings: Vec<Vec<[f64; 2]>>) -> Result<Self> {
        if rings.is_empty() {
            return Err(invalid_polygon("A polygon needs at least one ring."));
        }
        for (idx, ring) in rings.iter().enumerate() {
            if ring.len() < MIN_RING_POSITIONS {
                return Err(invalid_polygon(&format!(
                    "Ring {} has {} positions; at least {} are required.",
                    idx,
                    ring.len(),
                    MIN_RING_POSITIONS
                )));
            }
            for position in ring {
                check_position(position)?;
            }
            if ring.first() != ring.last() {
                return Err(invalid_polygon(&format!(
                    "Ring {} is not closed; the first and last positions must be equal.",
                    idx
                )));
            }
        }
        Ok(Self { rings })
    }

    /// Parse the `polygon` member of a request body.
    ///
    /// Accepts a GeoJSON geometry object, or a string containing one.
    pub fn from_value(value: &JsonValue) -> Result<Self> {
        if let JsonValue::String(raw) = value {
            let parsed: JsonValue = serde_json::from_str(raw)
                .map_err(|e| invalid_polygon(&e.to_string()))?;
            return Self::from_value(&parsed);
        }

        let object = value
            .as_object()
            .ok_or_else(|| invalid_polygon("Expected a GeoJSON geometry object."))?;

        let geometry_type = object
            .get("type")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| invalid_polygon("Geometry object is missing a 'type' member."))?;

        if geometry_type != "Polygon" {
            if GEOMETRY_TYPES.contains(&geometry_type) {
                return Err(Error::InvalidGeometry(
                    "Geometry type must be 'Polygon'.".to_string(),
                ));
            }
            return Err(invalid_polygon(&format!(
                "Unknown geometry type '{}'.",
                geometry_type
            )));
        }

        let coordinates = object
            .get("coordinates")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| invalid_polygon("Polygon 'coordinates' must be an array of rings."))?;

        let rings = coordinates
            .iter()
            .enumerate()
            .map(|(idx, ring)| parse_ring(idx, ring))
            .collect::<Result<Vec<_>>>()?;

        Self::from_rings(rings)
    }

    pub fn exterior(&self) -> &[[f64; 2]] {
        &self.rings[0]
    }

    pub fn interiors(&self) -> &[Vec<[f64; 2]>] {
        &self.rings[1..]
    }

    pub fn rings(&self) -> &[Vec<[f64; 2]>] {
        &self.rings
    }

    /// The polygon as a GeoJSON geometry object.
    pub fn to_geojson(&self) -> JsonValue {
        serde_json::json!({
            "type": "Polygon",
            "coordinates": self.rings,
        })
    }
}

fn invalid_polygon(detail: &str) -> Error {
    Error::InvalidGeometry(format!("{} {}", INVALID_POLYGON_PREFIX, detail))
}

fn parse_ring(idx: usize, ring: &JsonValue) -> Result<Vec<[f64; 2]>> {
    let positions = ring
        .as_array()
        .ok_or_else(|| invalid_polygon(&format!("Ring {} must be an array of positions.", idx)))?;

    positions
        .iter()
        .map(|position| {
            let parts = position.as_array().filter(|p| p.len() >= 2).ok_or_else(|| {
                invalid_polygon(&format!(
                    "Ring {} contains a position that is not a [longitude, latitude] pair.",
                    idx
                ))
            })?;
            let lng = parts[0].as_f64();
            let lat = parts[1].as_f64();
            match (lng, lat) {
                (Some(lng), Some(lat)) => Ok([lng, lat]),
                _ => Err(invalid_polygon(&format!(
                    "Ring {} contains a non-numeric coordinate.",
                    idx
                ))),
            }
        })
        .collect()
}

fn check_position(position: &[f64; 2]) -> Result<()> {
    let [lng, lat] = *position;
    if !lng.is_finite() || !lat.is_finite() {
        return Err(invalid_polygon("Coordinates must be finite numbers."));
    }
    if !(-180.0..=180.0).contains(&lng) || !(-90.0..=90.0).contains(&lat) {
        return Err(invalid_polygon(&format!(
            "Position [{}, {}] is outside WGS84 bounds.",
            lng, lat
        )));
    }
    Ok(())
}

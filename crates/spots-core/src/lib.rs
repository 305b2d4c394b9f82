//! # spots-core
//!
//! Core types, traits, and abstractions for the spots geospatial API.
//!
//! This crate provides the domain model (`Spot`), the GeoJSON feature
//! representation, the query request types with their parameter rules, and
//! the `SpotRepository` trait that storage backends implement.

pub mod error;
pub mod geojson;
pub mod logging;
pub mod models;
pub mod query;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use geojson::{
    Feature, FeatureCollection, FeatureCollectionType, FeatureType, PointGeometry,
    PolygonBoundary, SpotProperties,
};
pub use models::*;
pub use query::*;
pub use traits::*;

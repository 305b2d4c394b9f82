//! Core traits for spot store abstractions.
//!
//! The HTTP layer depends only on [`SpotRepository`], so the PostGIS store
//! and the in-memory store are interchangeable behind it.

use async_trait::async_trait;

use crate::error::Result;
use crate::geojson::PolygonBoundary;
use crate::models::{SectorAveragePrice, Spot, UpsertOutcome};
use crate::query::{ListSpotsRequest, ListSpotsResponse, NearbyRequest};

/// Read queries over the spot store, plus the single write used by loaders.
///
/// Every query is read-only and safe to run concurrently.
#[async_trait]
pub trait SpotRepository: Send + Sync {
    /// One page of spots matching the filter, in the requested order.
    async fn list(&self, req: ListSpotsRequest) -> Result<ListSpotsResponse>;

    /// Fetch a spot by id. Fails with `Error::SpotNotFound` if absent.
    async fn fetch(&self, spot_id: i32) -> Result<Spot>;

    /// Spots within `radius_m` meters of the reference point, nearest first.
    /// Spots without a location never match.
    async fn nearby(&self, req: NearbyRequest) -> Result<Vec<Spot>>;

    /// Spots located inside or on the boundary of the polygon.
    async fn within(&self, polygon: &PolygonBoundary) -> Result<Vec<Spot>>;

    /// Mean total rent price per sector, sector ascending.
    async fn average_price_by_sector(&self) -> Result<Vec<SectorAveragePrice>>;

    /// Up to `limit` spots with a total rent price, most expensive first.
    async fn top_rent(&self, limit: i64) -> Result<Vec<Spot>>;

    /// Insert a spot, or replace every attribute of the spot with the same id.
    async fn upsert(&self, spot: &Spot) -> Result<UpsertOutcome>;
}

//! In-process spot store.
//!
//! Answers the same queries as [`PgSpotRepository`](crate::PgSpotRepository)
//! without a database. Distances are great-circle (haversine) meters and
//! polygon containment includes the boundary, matching the PostGIS queries.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use geo::{HaversineDistance, Intersects, LineString, Point, Polygon};
use tokio::sync::RwLock;
use tracing::debug;

use spots_core::{
    Error, ListSpotsRequest, ListSpotsResponse, NearbyRequest, PolygonBoundary, Result,
    SectorAveragePrice, Spot, SpotRepository, UpsertOutcome,
};

/// Spot store held in memory, keyed by `spot_id`.
#[derive(Debug, Default)]
pub struct MemorySpotRepository {
    spots: RwLock<BTreeMap<i32, Spot>>,
}

impl MemorySpotRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store preloaded with `spots`. Later entries replace earlier ones
    /// with the same id.
    pub fn with_spots(spots: impl IntoIterator<Item = Spot>) -> Self {
        let map = spots.into_iter().map(|s| (s.spot_id, s)).collect();
        Self {
            spots: RwLock::new(map),
        }
    }

    pub async fn len(&self) -> usize {
        self.spots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.spots.read().await.is_empty()
    }
}

fn to_polygon(boundary: &PolygonBoundary) -> Polygon<f64> {
    let exterior = LineString::from(boundary.exterior().to_vec());
    let interiors = boundary
        .interiors()
        .iter()
        .map(|ring| LineString::from(ring.clone()))
        .collect();
    Polygon::new(exterior, interiors)
}

#[async_trait]
impl SpotRepository for MemorySpotRepository {
    async fn list(&self, req: ListSpotsRequest) -> Result<ListSpotsResponse> {
        let spots = self.spots.read().await;
        let mut matched: Vec<Spot> = spots
            .values()
            .filter(|s| req.filter.matches(s))
            .cloned()
            .collect();

        // BTreeMap iteration already yields spot_id order.
        if let Some(ordering) = &req.ordering {
            matched.sort_by(|a, b| ordering.compare(a, b));
        }

        let total = matched.len() as i64;
        let page: Vec<Spot> = matched
            .into_iter()
            .skip(usize::try_from(req.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(req.page_size).unwrap_or(0))
            .collect();

        Ok(ListSpotsResponse { spots: page, total })
    }

    async fn fetch(&self, spot_id: i32) -> Result<Spot> {
        self.spots
            .read()
            .await
            .get(&spot_id)
            .cloned()
            .ok_or(Error::SpotNotFound(spot_id))
    }

    async fn nearby(&self, req: NearbyRequest) -> Result<Vec<Spot>> {
        let reference = Point::new(req.longitude, req.latitude);
        let spots = self.spots.read().await;

        let mut hits: Vec<(f64, Spot)> = spots
            .values()
            .filter_map(|s| {
                let loc = s.location?;
                let distance =
                    Point::new(loc.longitude, loc.latitude).haversine_distance(&reference);
                (distance <= req.radius_m).then(|| (distance, s.clone()))
            })
            .collect();

        hits.sort_by(|(da, a), (db, b)| da.total_cmp(db).then(a.spot_id.cmp(&b.spot_id)));

        debug!(
            subsystem = "database",
            component = "memory_store",
            op = "nearby",
            radius_m = req.radius_m,
            result_count = hits.len(),
            "Nearby search complete"
        );
        Ok(hits.into_iter().map(|(_, s)| s).collect())
    }

    async fn within(&self, boundary: &PolygonBoundary) -> Result<Vec<Spot>> {
        let polygon = to_polygon(boundary);
        let spots = self.spots.read().await;

        Ok(spots
            .values()
            .filter(|s| {
                s.location
                    .map(|loc| polygon.intersects(&Point::new(loc.longitude, loc.latitude)))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn average_price_by_sector(&self) -> Result<Vec<SectorAveragePrice>> {
        let spots = self.spots.read().await;
        let mut groups: HashMap<Option<i32>, (f64, u32)> = HashMap::new();
        for spot in spots.values() {
            if let Some(price) = spot.spot_price_total_mxn_rent {
                let entry = groups.entry(spot.spot_sector_id).or_insert((0.0, 0));
                entry.0 += price;
                entry.1 += 1;
            }
        }

        let mut averages: Vec<SectorAveragePrice> = groups
            .into_iter()
            .map(|(sector_id, (sum, count))| SectorAveragePrice {
                sector_id,
                average_price: sum / f64::from(count),
            })
            .collect();
        // Sector ascending, the sector-less group last.
        averages.sort_by_key(|a| (a.sector_id.is_none(), a.sector_id));
        Ok(averages)
    }

    async fn top_rent(&self, limit: i64) -> Result<Vec<Spot>> {
        let spots = self.spots.read().await;
        let mut priced: Vec<(f64, Spot)> = spots
            .values()
            .filter_map(|s| s.spot_price_total_mxn_rent.map(|p| (p, s.clone())))
            .collect();

        priced.sort_by(|(pa, a), (pb, b)| pb.total_cmp(pa).then(a.spot_id.cmp(&b.spot_id)));
        Ok(priced
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|(_, s)| s)
            .collect())
    }

    async fn upsert(&self, spot: &Spot) -> Result<UpsertOutcome> {
        let mut spots = self.spots.write().await;

        if let Some(public_id) = &spot.public_id {
            let taken = spots
                .values()
                .any(|s| s.spot_id != spot.spot_id && s.public_id.as_ref() == Some(public_id));
            if taken {
                return Err(Error::Conflict(format!(
                    "public_id {} is already assigned to another spot",
                    public_id
                )));
            }
        }

        let outcome = match spots.insert(spot.spot_id, spot.clone()) {
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Created,
        };
        Ok(outcome)
    }
}

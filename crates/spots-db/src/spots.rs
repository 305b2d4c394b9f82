//! PostGIS spot repository.
//!
//! All geometric work happens in the database:
//! - Nearby search uses `ST_DWithin` / `ST_Distance` on the geography cast of
//!   the stored point, so radii and distances are in meters.
//! - Polygon search uses `ST_Covers`, which includes points on the boundary.
//!
//! Scalar `spot_latitude` / `spot_longitude` are generated columns derived
//! from `location` and are never written directly.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, warn};

use spots_core::logging::is_slow;
use spots_core::{
    Error, ListSpotsRequest, ListSpotsResponse, Location, NearbyRequest, PolygonBoundary,
    Result, SectorAveragePrice, Spot, SpotFilter, SpotOrdering, SpotRepository, UpsertOutcome,
};

use crate::escape_like;

/// Columns selected for every spot read, in [`map_row_to_spot`] order.
const SPOT_COLUMNS: &str = r#"
    spot_id, public_id, spot_longitude, spot_latitude,
    spot_sector_id, spot_type_id, spot_modality,
    spot_settlement, spot_municipality, spot_state, spot_region, spot_corridor, spot_address,
    spot_title, spot_description,
    spot_area_in_sqm, spot_price_sqm_mxn_rent, spot_price_total_mxn_rent,
    spot_price_sqm_mxn_sale, spot_price_total_mxn_sale, spot_maintenance_cost,
    user_id, spot_created_date, data_source
"#;

/// Reference point for nearby queries; `$1` = longitude, `$2` = latitude.
const REFERENCE_POINT: &str = "ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography";

/// PostgreSQL implementation of [`SpotRepository`].
#[derive(Clone)]
pub struct PgSpotRepository {
    pool: Pool<Postgres>,
}

impl PgSpotRepository {
    /// Create a new spot repository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

// =============================================================================
// HELPER FUNCTIONS FOR LIST QUERY BUILDING
// =============================================================================

/// Bind filter parameters in the order [`build_where_clause`] numbers them.
macro_rules! bind_filter_params {
    ($query:expr, $filter:expr, $pattern:expr) => {{
        let mut q = $query;
        if let Some(sector_id) = $filter.sector_id {
            q = q.bind(sector_id);
        }
        if let Some(type_id) = $filter.type_id {
            q = q.bind(type_id);
        }
        if let Some(pattern) = $pattern {
            q = q.bind(pattern);
        }
        q
    }};
}

/// Build the WHERE clause for a filter. Returns the clause and the next free
/// parameter index.
fn build_where_clause(filter: &SpotFilter) -> (String, usize) {
    let mut clause = String::from("WHERE TRUE");
    let mut param_idx = 1;

    if filter.sector_id.is_some() {
        clause.push_str(&format!(" AND spot_sector_id = ${}", param_idx));
        param_idx += 1;
    }
    if filter.type_id.is_some() {
        clause.push_str(&format!(" AND spot_type_id = ${}", param_idx));
        param_idx += 1;
    }
    if filter.municipality.is_some() {
        clause.push_str(&format!(
            " AND spot_municipality ILIKE ${} ESCAPE '\\'",
            param_idx
        ));
        param_idx += 1;
    }

    (clause, param_idx)
}

/// ILIKE pattern matching `needle` as a literal substring.
fn municipality_pattern(filter: &SpotFilter) -> Option<String> {
    filter
        .municipality
        .as_deref()
        .map(|m| format!("%{}%", escape_like(m)))
}

/// Build the ORDER BY clause. Nulls trail in both directions and `spot_id`
/// breaks ties so pages are stable.
fn build_order_clause(ordering: Option<&SpotOrdering>) -> String {
    match ordering {
        Some(o) => format!(
            "ORDER BY {} {} NULLS LAST, spot_id ASC",
            o.field.as_str(),
            o.direction.as_sql()
        ),
        None => "ORDER BY spot_id ASC".to_string(),
    }
}

fn map_row_to_spot(row: PgRow) -> Spot {
    let longitude: Option<f64> = row.get("spot_longitude");
    let latitude: Option<f64> = row.get("spot_latitude");
    let location = match (longitude, latitude) {
        (Some(lng), Some(lat)) => Some(Location::new(lng, lat)),
        _ => None,
    };

    Spot {
        spot_id: row.get("spot_id"),
        public_id: row.get("public_id"),
        location,
        spot_sector_id: row.get("spot_sector_id"),
        spot_type_id: row.get("spot_type_id"),
        spot_modality: row.get("spot_modality"),
        spot_settlement: row.get("spot_settlement"),
        spot_municipality: row.get("spot_municipality"),
        spot_state: row.get("spot_state"),
        spot_region: row.get("spot_region"),
        spot_corridor: row.get("spot_corridor"),
        spot_address: row.get("spot_address"),
        spot_title: row.get("spot_title"),
        spot_description: row.get("spot_description"),
        spot_area_in_sqm: row.get("spot_area_in_sqm"),
        spot_price_sqm_mxn_rent: row.get("spot_price_sqm_mxn_rent"),
        spot_price_total_mxn_rent: row.get("spot_price_total_mxn_rent"),
        spot_price_sqm_mxn_sale: row.get("spot_price_sqm_mxn_sale"),
        spot_price_total_mxn_sale: row.get("spot_price_total_mxn_sale"),
        spot_maintenance_cost: row.get("spot_maintenance_cost"),
        user_id: row.get("user_id"),
        spot_created_date: row.get("spot_created_date"),
        data_source: row.get("data_source"),
    }
}

/// Emit the completion log for a query.
fn log_query(op: &'static str, start: Instant, result_count: usize) {
    let duration_ms = start.elapsed().as_millis() as u64;
    if is_slow(duration_ms) {
        warn!(
            subsystem = "database",
            component = "spots",
            op,
            result_count,
            duration_ms,
            slow = true,
            "Slow spot query"
        );
    } else {
        debug!(
            subsystem = "database",
            component = "spots",
            op,
            result_count,
            duration_ms,
            "Spot query complete"
        );
    }
}

/// Map a unique violation on `public_id` to a conflict.
fn map_write_error(err: sqlx::Error, spot: &Spot) -> Error {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return Error::Conflict(format!(
                "public_id {} is already assigned to another spot",
                spot.public_id.as_deref().unwrap_or("(none)")
            ));
        }
    }
    Error::Database(err)
}

#[async_trait]
impl SpotRepository for PgSpotRepository {
    async fn list(&self, req: ListSpotsRequest) -> Result<ListSpotsResponse> {
        let start = Instant::now();
        let (where_clause, param_idx) = build_where_clause(&req.filter);
        let order_clause = build_order_clause(req.ordering.as_ref());
        let pattern = municipality_pattern(&req.filter);

        let count_query = format!("SELECT COUNT(*) FROM spot {}", where_clause);
        let total: i64 = {
            let q = sqlx::query_scalar(&count_query);
            let q = bind_filter_params!(q, req.filter, pattern.clone());
            q.fetch_one(&self.pool).await.map_err(Error::Database)?
        };

        let page_query = format!(
            "SELECT {} FROM spot {} {} LIMIT ${} OFFSET ${}",
            SPOT_COLUMNS,
            where_clause,
            order_clause,
            param_idx,
            param_idx + 1
        );
        let rows = {
            let q = sqlx::query(&page_query);
            let q = bind_filter_params!(q, req.filter, pattern);
            q.bind(req.page_size)
                .bind(req.offset())
                .fetch_all(&self.pool)
                .await
                .map_err(Error::Database)?
        };

        let spots: Vec<Spot> = rows.into_iter().map(map_row_to_spot).collect();
        log_query("list", start, spots.len());
        Ok(ListSpotsResponse { spots, total })
    }

    async fn fetch(&self, spot_id: i32) -> Result<Spot> {
        let query = format!("SELECT {} FROM spot WHERE spot_id = $1", SPOT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(spot_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.map(map_row_to_spot)
            .ok_or(Error::SpotNotFound(spot_id))
    }

    async fn nearby(&self, req: NearbyRequest) -> Result<Vec<Spot>> {
        let start = Instant::now();
        debug!(
            subsystem = "database",
            component = "spots",
            op = "nearby",
            longitude = req.longitude,
            latitude = req.latitude,
            radius_m = req.radius_m,
            "Searching spots by distance"
        );

        let query = format!(
            r#"
            SELECT {columns}
            FROM spot
            WHERE location IS NOT NULL
              AND ST_DWithin(location::geography, {reference}, $3)
            ORDER BY ST_Distance(location::geography, {reference}), spot_id
            "#,
            columns = SPOT_COLUMNS,
            reference = REFERENCE_POINT,
        );

        let rows = sqlx::query(&query)
            .bind(req.longitude)
            .bind(req.latitude)
            .bind(req.radius_m)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let spots: Vec<Spot> = rows.into_iter().map(map_row_to_spot).collect();
        log_query("nearby", start, spots.len());
        Ok(spots)
    }

    async fn within(&self, polygon: &PolygonBoundary) -> Result<Vec<Spot>> {
        let start = Instant::now();
        let query = format!(
            r#"
            SELECT {}
            FROM spot
            WHERE location IS NOT NULL
              AND ST_Covers(ST_SetSRID(ST_GeomFromGeoJSON($1), 4326), location)
            ORDER BY spot_id
            "#,
            SPOT_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(polygon.to_geojson().to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let spots: Vec<Spot> = rows.into_iter().map(map_row_to_spot).collect();
        log_query("within", start, spots.len());
        Ok(spots)
    }

    async fn average_price_by_sector(&self) -> Result<Vec<SectorAveragePrice>> {
        let start = Instant::now();
        let rows = sqlx::query(
            r#"
            SELECT spot_sector_id, AVG(spot_price_total_mxn_rent) AS average_price
            FROM spot
            WHERE spot_price_total_mxn_rent IS NOT NULL
            GROUP BY spot_sector_id
            ORDER BY spot_sector_id ASC NULLS LAST
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let averages: Vec<SectorAveragePrice> = rows
            .into_iter()
            .map(|row| SectorAveragePrice {
                sector_id: row.get("spot_sector_id"),
                average_price: row.get("average_price"),
            })
            .collect();
        log_query("average_price_by_sector", start, averages.len());
        Ok(averages)
    }

    async fn top_rent(&self, limit: i64) -> Result<Vec<Spot>> {
        let start = Instant::now();
        let query = format!(
            r#"
            SELECT {}
            FROM spot
            WHERE spot_price_total_mxn_rent IS NOT NULL
            ORDER BY spot_price_total_mxn_rent DESC, spot_id ASC
            LIMIT $1
            "#,
            SPOT_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let spots: Vec<Spot> = rows.into_iter().map(map_row_to_spot).collect();
        log_query("top_rent", start, spots.len());
        Ok(spots)
    }

    async fn upsert(&self, spot: &Spot) -> Result<UpsertOutcome> {
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO spot (
                spot_id, public_id, location,
                spot_sector_id, spot_type_id, spot_modality,
                spot_settlement, spot_municipality, spot_state, spot_region,
                spot_corridor, spot_address, spot_title, spot_description,
                spot_area_in_sqm, spot_price_sqm_mxn_rent, spot_price_total_mxn_rent,
                spot_price_sqm_mxn_sale, spot_price_total_mxn_sale, spot_maintenance_cost,
                user_id, spot_created_date, data_source
            )
            VALUES (
                $1, $2, ST_SetSRID(ST_MakePoint($3, $4), 4326),
                $5, $6, $7,
                $8, $9, $10, $11,
                $12, $13, $14, $15,
                $16, $17, $18,
                $19, $20, $21,
                $22, $23, $24
            )
            ON CONFLICT (spot_id) DO UPDATE SET
                public_id = EXCLUDED.public_id,
                location = EXCLUDED.location,
                spot_sector_id = EXCLUDED.spot_sector_id,
                spot_type_id = EXCLUDED.spot_type_id,
                spot_modality = EXCLUDED.spot_modality,
                spot_settlement = EXCLUDED.spot_settlement,
                spot_municipality = EXCLUDED.spot_municipality,
                spot_state = EXCLUDED.spot_state,
                spot_region = EXCLUDED.spot_region,
                spot_corridor = EXCLUDED.spot_corridor,
                spot_address = EXCLUDED.spot_address,
                spot_title = EXCLUDED.spot_title,
                spot_description = EXCLUDED.spot_description,
                spot_area_in_sqm = EXCLUDED.spot_area_in_sqm,
                spot_price_sqm_mxn_rent = EXCLUDED.spot_price_sqm_mxn_rent,
                spot_price_total_mxn_rent = EXCLUDED.spot_price_total_mxn_rent,
                spot_price_sqm_mxn_sale = EXCLUDED.spot_price_sqm_mxn_sale,
                spot_price_total_mxn_sale = EXCLUDED.spot_price_total_mxn_sale,
                spot_maintenance_cost = EXCLUDED.spot_maintenance_cost,
                user_id = EXCLUDED.user_id,
                spot_created_date = EXCLUDED.spot_created_date,
                data_source = EXCLUDED.data_source
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(spot.spot_id)
        .bind(&spot.public_id)
        .bind(spot.longitude())
        .bind(spot.latitude())
        .bind(spot.spot_sector_id)
        .bind(spot.spot_type_id)
        .bind(&spot.spot_modality)
        .bind(&spot.spot_settlement)
        .bind(&spot.spot_municipality)
        .bind(&spot.spot_state)
        .bind(&spot.spot_region)
        .bind(&spot.spot_corridor)
        .bind(&spot.spot_address)
        .bind(&spot.spot_title)
        .bind(&spot.spot_description)
        .bind(spot.spot_area_in_sqm)
        .bind(spot.spot_price_sqm_mxn_rent)
        .bind(spot.spot_price_total_mxn_rent)
        .bind(spot.spot_price_sqm_mxn_sale)
        .bind(spot.spot_price_total_mxn_sale)
        .bind(spot.spot_maintenance_cost)
        .bind(spot.user_id)
        .bind(spot.spot_created_date)
        .bind(&spot.data_source)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, spot))?;

        let outcome = if inserted {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        };
        debug!(
            subsystem = "database",
            component = "spots",
            op = "upsert",
            spot_id = spot.spot_id,
            outcome = ?outcome,
            "Spot written"
        );
        Ok(outcome)
    }
}

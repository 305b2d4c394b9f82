//! # spots-db
//!
//! PostgreSQL + PostGIS storage layer for the spots API.
//!
//! This crate provides:
//! - Connection pool management
//! - [`PgSpotRepository`], the PostGIS implementation of [`SpotRepository`]
//! - [`MemorySpotRepository`], an in-process implementation used by tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use spots_db::{Database, NearbyRequest, SpotRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/spots").await?;
//!
//!     let spots = db.spots.nearby(NearbyRequest {
//!         longitude: -99.151,
//!         latitude: 19.151,
//!         radius_m: 6000.0,
//!     }).await?;
//!
//!     println!("{} spots nearby", spots.len());
//!     Ok(())
//! }
//! ```
pub mod memory;
pub mod pool;
pub mod spots;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use spots_core::*;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub use memory::MemorySpotRepository;
pub use pool::{
    create_pool, create_pool_with_config, log_pool_metrics, validate_schema_name, PoolConfig,
};
pub use spots::PgSpotRepository;

/// Combined database context.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Spot repository.
    pub spots: PgSpotRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            spots: PgSpotRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

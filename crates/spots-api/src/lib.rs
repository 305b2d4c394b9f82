//! # spots-api
//!
//! HTTP API over the spot store: attribute listing with pagination, detail
//! lookup, radius and polygon search, and rent aggregates. Responses use
//! GeoJSON.
//!
//! The router is independent of the storage backend: [`AppState`] holds any
//! [`SpotRepository`], so the PostGIS store in production and the in-memory
//! store in tests serve the same routes.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod query_types;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use spots_core::SpotRepository;

pub use config::ServerConfig;
pub use error::ApiError;
use middleware::{build_rate_limiter, rate_limit_middleware, GlobalRateLimiter, MakeRequestUuidV7};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub spots: Arc<dyn SpotRepository>,
    /// Global rate limiter (None if rate limiting is disabled).
    pub rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

impl AppState {
    pub fn new(spots: Arc<dyn SpotRepository>) -> Self {
        Self {
            spots,
            rate_limiter: None,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: Option<Arc<GlobalRateLimiter>>) -> Self {
        self.rate_limiter = limiter;
        self
    }
}

/// The spots routes, relative to the API prefix.
pub fn router() -> Router<AppState> {
    use handlers::spots;

    Router::new()
        .route("/spots/", get(spots::list_spots))
        .route("/spots/nearby/", get(spots::nearby_spots))
        .route("/spots/within/", post(spots::spots_within))
        .route(
            "/spots/average-price-by-sector/",
            get(spots::average_price_by_sector),
        )
        .route("/spots/top-rent/", get(spots::top_rent))
        .route("/spots/:spot_id/", get(spots::get_spot))
}

/// The complete application: spots routes under the configured prefix, the
/// unprefixed health check, and the middleware stack.
pub fn build_app(spots: Arc<dyn SpotRepository>, config: &ServerConfig) -> Router {
    let state = AppState::new(spots)
        .with_rate_limiter(config.rate_limit.and_then(build_rate_limiter));

    let api = if config.api_prefix.is_empty() {
        router()
    } else {
        Router::new().nest(&config.api_prefix, router())
    };

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(config.allowed_origins.clone()))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(api)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .with_state(state)
}

//! Request middleware: correlation ids and the global rate limiter.

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use governor::{Quota, RateLimiter};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::config::RateLimitConfig;
use crate::AppState;

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// RATE LIMITING
// =============================================================================

/// Global rate limiter type (direct quota, no per-client bucketing).
pub type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Limiter allowing `requests` per `period`, replenished evenly.
pub fn build_rate_limiter(config: RateLimitConfig) -> Option<Arc<GlobalRateLimiter>> {
    let burst = NonZeroU32::new(config.requests)?;
    let quota = Quota::with_period(config.period / config.requests)?.allow_burst(burst);
    Some(Arc::new(RateLimiter::direct(quota)))
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "Too many requests. Please wait before retrying."
                })),
            )
                .into_response();
        }
    }
    next.run(request).await
}

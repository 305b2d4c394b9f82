//! Structured logging conventions for the spots API.
//!
//! Store events carry `subsystem` ("database"), `component` ("pool",
//! "spots", "memory_store") and `op` ("list", "nearby", "within", ...).
//! Query completions add `result_count` and `duration_ms`; pool events add
//! `pool_size` and `pool_idle`.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, query parameters, degraded-input fallbacks |
//! | TRACE | Per-row iteration |

/// Queries slower than this are logged at WARN with `slow = true`.
pub const SLOW_QUERY_THRESHOLD_MS: u64 = 500;

/// Whether an elapsed duration crosses [`SLOW_QUERY_THRESHOLD_MS`].
pub fn is_slow(duration_ms: u64) -> bool {
    duration_ms >= SLOW_QUERY_THRESHOLD_MS
}

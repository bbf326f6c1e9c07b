//! Live telemetry and throttling: the speed sampler (which also reclaims
//! stalled parts) and the per-chunk rate limiter.

mod limiter;
mod sampler;

pub use limiter::{RateLimiter, LIMIT_STEP};
pub use sampler::{Monitor, Throughput};

//! HTTP middleware and extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Request ID
//! 4. Rate limiting (governor), on the public and PIN routes only

pub mod rate_limit;
pub mod request_id;
pub mod store;

pub use rate_limit::{RateLimiterLayer, pin_rate_limiter, public_rate_limiter};
pub use request_id::request_id_middleware;
pub use store::{PIN_HEADER, PinHeader, RequirePin, StoreScope};

//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `pin_rate_limiter`: strict limit on PIN verification (~10/min)
//! - `public_rate_limiter`: relaxed limit on the public catalog and order intake (~100/min)

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Key extractor: proxy headers first, then the socket peer address.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let headers = req.headers();

        // First hop of X-Forwarded-For is the client
        if let Some(ip) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
        {
            return Ok(ip);
        }

        if let Some(ip) = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
        {
            return Ok(ip);
        }

        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Rate limiter for PIN verification: ~10 requests per minute per IP.
///
/// Replenishes one token every 6 seconds with a burst of 5, which keeps a
/// 4-digit PIN out of brute-force reach.
///
/// # Panics
///
/// Will not panic: `per_second(6)` and `burst_size(5)` are valid positive
/// values accepted by `GovernorConfigBuilder`.
#[must_use]
pub fn pin_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(6)
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(6) and burst_size(5) is valid");
    GovernorLayer::new(Arc::new(config))
}

/// Rate limiter for public endpoints: ~100 requests per minute per IP.
///
/// # Panics
///
/// Will not panic: `per_second(1)` and `burst_size(50)` are valid positive
/// values accepted by `GovernorConfigBuilder`.
#[must_use]
pub fn public_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(1)
        .burst_size(50)
        .finish()
        .expect("rate limiter config with per_second(1) and burst_size(50) is valid");
    GovernorLayer::new(Arc::new(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let req = request(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1")]);
        let ip = ClientIpKeyExtractor.extract(&req).unwrap();
        assert_eq!(ip, "203.0.113.9".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_real_ip_fallback() {
        let req = request(&[("x-real-ip", "198.51.100.4")]);
        let ip = ClientIpKeyExtractor.extract(&req).unwrap();
        assert_eq!(ip, "198.51.100.4".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_connect_info_fallback() {
        let mut req = request(&[]);
        let addr: SocketAddr = "192.0.2.7:5000".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(ClientIpKeyExtractor.extract(&req).unwrap(), addr.ip());
    }

    #[test]
    fn test_no_source_is_an_error() {
        assert!(ClientIpKeyExtractor.extract(&request(&[])).is_err());
    }
}

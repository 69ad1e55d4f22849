//! HTTP client module
//!
//! Single-attempt HTTP client with a token-bucket rate limiter.
//!
//! # Features
//!
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Proxies**: Per-scheme proxy routing from the client config
//! - **Bodies**: JSON, raw text (SOAP envelopes, SOQL) and URL-encoded forms

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestBody, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};

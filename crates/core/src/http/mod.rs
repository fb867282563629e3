//! Rate-limited HTTP client shared by the provider adapter.

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientBuilder, HttpError};
pub use rate_limit::{RateLimiter, TokenBucket};

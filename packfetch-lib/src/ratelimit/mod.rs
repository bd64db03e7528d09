//! Per-host rate limiting driven by server-reported quota.
//!
//! Hosts such as the Modrinth API announce how many requests are left in the
//! current window and when it resets. This module remembers that per host
//! and holds back requests while a host's quota is exhausted.
//!
//! # Architecture
//!
//! - [`HostKey`]: the host authority a request is throttled under
//! - [`HostRateLimiter`]: quota state and the wait gate for a single host
//! - [`RateLimiterRegistry`]: owns the limiters of all hosts
//! - [`QuotaHeaders`]: which response headers carry quota, and their format
//! - [`RateLimitConfig`]: configuration shared by all hosts of a registry

mod config;
mod headers;
mod host;
mod registry;

pub use config::RateLimitConfig;
pub use headers::{QuotaHeaders, ResetFormat, ResetHeader};
pub use host::{HostKey, HostRateLimiter, QuotaState};
pub use registry::RateLimiterRegistry;

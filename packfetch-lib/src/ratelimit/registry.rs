use dashmap::DashMap;
use http::HeaderMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::ratelimit::{HostKey, HostRateLimiter, QuotaState, RateLimitConfig};

/// Owns the quota state of every host a client has talked to.
///
/// The `RateLimiterRegistry` is the only shared mutable state of a client.
/// It is constructed once and handed to every [`RequestDispatcher`]
/// that should share the same view of each host's quota. Cloning is cheap
/// and clones share the same table.
///
/// # Architecture
///
/// - Each unique host gets its own [`HostRateLimiter`], created lazily on
///   the first request and kept for the lifetime of the registry
/// - Lookups go through a `DashMap`, so hosts never contend with each other
///   on a table-wide lock
/// - Per-host state has its own lock, held only to read or update quota and
///   never across a sleep or a network call
///
/// [`RequestDispatcher`]: crate::RequestDispatcher
#[derive(Debug, Clone, Default)]
pub struct RateLimiterRegistry {
    /// Map of host to its limiter, created on demand
    hosts: Arc<DashMap<HostKey, Arc<HostRateLimiter>>>,

    /// Configuration shared with every limiter
    config: Arc<RateLimitConfig>,
}

impl RateLimiterRegistry {
    /// Create an empty registry
    ///
    /// # Examples
    ///
    /// ```
    /// use packfetch_lib::ratelimit::{RateLimitConfig, RateLimiterRegistry};
    ///
    /// let registry = RateLimiterRegistry::new(RateLimitConfig::default());
    /// assert_eq!(registry.active_host_count(), 0);
    /// ```
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            hosts: Arc::new(DashMap::new()),
            config: Arc::new(config),
        }
    }

    /// The configuration all hosts of this registry share
    #[must_use]
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Wait until `host` permits another request.
    ///
    /// # Errors
    ///
    /// See [`HostRateLimiter::wait`].
    pub async fn wait(&self, host: &HostKey, cancel: &CancellationToken) -> Result<()> {
        // The map guard is dropped before waiting; only the `Arc` is kept
        let limiter = self.get_or_create_host(host);
        limiter.wait(cancel).await
    }

    /// Record the quota `host` announced in a response
    pub fn record(&self, host: &HostKey, headers: &HeaderMap) {
        self.get_or_create_host(host).record(headers);
    }

    /// Get an existing limiter or create a new one for the given host
    pub fn get_or_create_host(&self, host: &HostKey) -> Arc<HostRateLimiter> {
        if let Some(limiter) = self.hosts.get(host) {
            return limiter.clone();
        }

        // `entry` resolves the race where another task created it in between
        self.hosts
            .entry(host.clone())
            .or_insert_with(|| {
                log::debug!("Tracking quota for new host {host}");
                Arc::new(HostRateLimiter::new(host.clone(), self.config.clone()))
            })
            .clone()
    }

    /// Current quota state of `host`, or the unknown state if it was never
    /// contacted
    #[must_use]
    pub fn quota(&self, host: &HostKey) -> QuotaState {
        self.hosts
            .get(host)
            .map(|limiter| limiter.quota())
            .unwrap_or_default()
    }

    /// Number of hosts that have been contacted through this registry
    #[must_use]
    pub fn active_host_count(&self) -> usize {
        self.hosts.len()
    }
}

use http::HeaderMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

use super::key::HostKey;
use crate::ratelimit::RateLimitConfig;
use crate::ratelimit::headers::QuotaUpdate;
use crate::{ErrorKind, Result};

/// Last quota a host reported about itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaState {
    /// Requests left in the current window, `None` until the host tells us
    pub remaining: Option<u64>,

    /// Wall-clock time at which the window resets, as reported by the host
    pub reset_at: Option<SystemTime>,
}

impl QuotaState {
    /// How long a request has to wait at `now`, if at all.
    ///
    /// Only an exhausted quota with a reset in the future blocks. An unknown
    /// or positive `remaining`, or a reset in the past, lets requests through.
    #[must_use]
    pub fn required_wait(&self, now: SystemTime) -> Option<Duration> {
        match (self.remaining, self.reset_at) {
            (Some(0), Some(reset_at)) => reset_at
                .duration_since(now)
                .ok()
                .filter(|wait| !wait.is_zero()),
            _ => None,
        }
    }

    fn apply(&mut self, update: QuotaUpdate) {
        if let Some(remaining) = update.remaining {
            self.remaining = Some(remaining);
        }
        if let Some(reset_at) = update.reset_at {
            self.reset_at = Some(reset_at);
        }
    }
}

/// Quota gate for a single host.
///
/// The limiter never counts requests itself. It only remembers what the
/// host said in its last response and holds back new requests while that
/// quota is exhausted. Several requests may be in flight to the same host
/// at once as long as quota is available.
#[derive(Debug)]
pub struct HostRateLimiter {
    /// The host this instance manages
    pub key: HostKey,

    /// Quota as last reported by the host
    quota: Mutex<QuotaState>,

    /// Header mapping and wait ceiling, shared with the registry
    config: Arc<RateLimitConfig>,
}

impl HostRateLimiter {
    /// Create a limiter for `key` with no known quota
    #[must_use]
    pub fn new(key: HostKey, config: Arc<RateLimitConfig>) -> Self {
        Self {
            key,
            quota: Mutex::new(QuotaState::default()),
            config,
        }
    }

    /// Snapshot of the current quota state
    #[must_use]
    pub fn quota(&self) -> QuotaState {
        // `QuotaState` is plain data, so a panic elsewhere cannot leave it half-written
        *self.quota.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until the host permits another request.
    ///
    /// Returns immediately unless the last known quota is exhausted and its
    /// reset lies in the future. The state lock is only held to read the
    /// quota, never while sleeping, so other tasks can record new quota or
    /// pass the gate in the meantime.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::RateLimitExceeded`] if the required wait is longer
    ///   than the configured `max_wait`
    /// - [`ErrorKind::Cancelled`] if `cancel` fires while waiting
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<()> {
        while let Some(wait) = self.quota().required_wait(SystemTime::now()) {
            if let Some(max_wait) = self.config.max_wait
                && wait > max_wait
            {
                return Err(ErrorKind::RateLimitExceeded {
                    host: self.key.clone(),
                    wait,
                });
            }

            log::debug!(
                "Host {} has no quota left, waiting {}ms for reset",
                self.key,
                wait.as_millis()
            );

            tokio::select! {
                () = cancel.cancelled() => return Err(ErrorKind::Cancelled(self.key.clone())),
                () = tokio::time::sleep(wait) => {}
            }
        }
        Ok(())
    }

    /// Record the quota announced in a response's headers.
    ///
    /// Headers that are absent or unparsable leave the state unchanged.
    pub fn record(&self, headers: &HeaderMap) {
        let update = self
            .config
            .quota_headers
            .parse(headers, SystemTime::now());
        if update.is_empty() {
            return;
        }

        log::debug!(
            "Host {} reported quota: remaining {:?}, reset at {:?}",
            self.key,
            update.remaining,
            update.reset_at
        );
        self.update(update);
    }

    pub(crate) fn update(&self, update: QuotaUpdate) {
        self.quota
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(update);
    }
}

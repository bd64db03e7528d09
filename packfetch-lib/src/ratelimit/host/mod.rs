#![allow(clippy::module_inception)]

mod host;
mod key;

pub use host::{HostRateLimiter, QuotaState};
pub use key::HostKey;

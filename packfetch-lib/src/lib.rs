//! `packfetch` is a rate-aware HTTP client for fetching mod and modpack
//! metadata and downloading files.
//!
//! Requests are throttled per host, based on the quota the host reports in
//! its response headers. A host that says its quota is exhausted is not
//! contacted again until the reported reset time; other hosts are not
//! affected.
//!
//! ```no_run
//! use packfetch_lib::{ClientBuilder, NoErrorModel};
//! use serde::Deserialize;
//! use std::error::Error;
//!
//! #[derive(Deserialize)]
//! struct Project {
//!     title: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn Error>> {
//!     let client = ClientBuilder::default().client()?;
//!     let project: Project = client
//!         .get_json::<_, NoErrorModel>("https://api.modrinth.com/v2/project/sodium")
//!         .await?;
//!     println!("{}", project.title);
//!
//!     let path = client
//!         .download_file("https://example.org/pack.mrpack", "downloads", None)
//!         .await?;
//!     println!("Saved to {}", path.display());
//!     Ok(())
//! }
//! ```
//!
//! Clients built from the same [`RateLimiterRegistry`] share their view of
//! every host's quota:
//!
//! ```
//! use packfetch_lib::{ClientBuilder, RateLimiterRegistry, Result};
//!
//! # fn main() -> Result<()> {
//! let registry = RateLimiterRegistry::default();
//! let metadata = ClientBuilder::builder().registry(registry.clone()).build().client()?;
//! let downloads = ClientBuilder::builder().registry(registry).build().client()?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod decode;
mod dispatcher;
mod download;
mod fetch;
mod types;

pub mod ratelimit;

pub use client::{
    Client, ClientBuilder, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_REDIRECTS, DEFAULT_USER_AGENT,
};
pub use config::Config;
pub use decode::{DecodeError, Decoder, Json, Xml};
pub use dispatcher::RequestDispatcher;
pub use fetch::{FetchError, NoErrorModel};
pub use ratelimit::{HostKey, RateLimitConfig, RateLimiterRegistry};
pub use types::*;

/// Re-exported so callers can cancel without depending on `tokio-util`
pub use tokio_util::sync::CancellationToken;

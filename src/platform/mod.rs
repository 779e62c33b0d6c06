//! Platform controller access: transport setup, resource models, the HTTP
//! client, job polling, token exchange, context resolution and the
//! persisted context cache.

pub mod cache;
pub mod client;
pub mod context;
pub mod jobs;
pub mod models;
pub mod token;
pub mod transport;

pub use cache::{CacheFile, CacheKey, CacheValue, ContextCache};
pub use client::PlatformClient;
pub use context::{ContextResolver, DestinationContext, RepoContext};
pub use jobs::{poll_job, PollConfig};
pub use transport::{build_client, build_mtls_client, TlsSettings};

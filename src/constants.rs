//! Application constants for apprepo
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Environment variable names for platform session and behavior switches
pub mod env {
    /// Platform resource API endpoint
    pub const API_URL: &str = "APPREPO_API_URL";

    /// Bearer token for the platform resource API
    pub const API_TOKEN: &str = "APPREPO_API_TOKEN";

    /// Target organization GUID
    pub const ORG_ID: &str = "APPREPO_ORG_ID";

    /// Target space GUID
    pub const SPACE_ID: &str = "APPREPO_SPACE_ID";

    /// Set to "1" to enable the persisted context cache and skip teardown
    pub const CACHE: &str = "APPREPO_CACHE";

    /// Override for the repository service's registered name
    pub const SERVICE_NAME: &str = "APPREPO_SERVICE_NAME";

    /// Override for the resolved runtime URL
    pub const RUNTIME_URL: &str = "APPREPO_RUNTIME_URL";

    /// Set to "1" to disable TLS certificate verification
    pub const SKIP_SSL_VALIDATION: &str = "APPREPO_SKIP_SSL_VALIDATION";

    /// Path to a custom CA bundle (PEM) trusted in addition to system CAs
    pub const CA_BUNDLE: &str = "APPREPO_CA_BUNDLE";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "apprepo/0.1.0";

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
}

/// Asynchronous job polling configuration
pub mod jobs {
    use super::Duration;

    /// Maximum number of times a job resource is polled before giving up
    pub const MAX_POLL_ATTEMPTS: u32 = 10;

    /// Unit of the polling delay ramp; attempt `n` sleeps `(n-1)/2` units
    pub const POLL_RAMP_UNIT: Duration = Duration::from_secs(1);
}

/// Retry budgets for platform operations
pub mod limits {
    /// Maximum attempts to delete a brokered resource before surfacing
    /// the platform's refusal
    pub const MAX_DELETE_ATTEMPTS: u32 = 3;
}

/// Concurrent transfer configuration
pub mod transfer {
    /// Maximum number of repository requests in flight simultaneously
    pub const MAX_CONCURRENT_CONNECTIONS: usize = 50;
}

/// Persisted context cache configuration
pub mod cache {
    use super::Duration;

    /// Age beyond which persisted cache entries are treated as absent
    pub const TTL: Duration = Duration::from_secs(60 * 60);

    /// Directory under the user's home that holds the cache file
    pub const CACHE_DIR: &str = ".apprepo";

    /// Cache file name
    pub const CACHE_FILE: &str = "cache.json";
}

/// Brokered service names, plans and headers
pub mod services {
    /// Registered name of the repository service, unless overridden
    pub const DEFAULT_SERVICE_NAME: &str = "apps-repo";

    /// Repository service plan used for read access to applications
    pub const RUNTIME_PLAN: &str = "app-runtime";

    /// Repository service plan backing uploaded application bundles
    pub const APP_HOST_PLAN: &str = "app-host";

    /// Registered name of the destination-configuration service
    pub const DESTINATION_SERVICE: &str = "destination";

    /// Destination-configuration service plan
    pub const DESTINATION_PLAN: &str = "lite";

    /// Header scoping repository requests to one app-host instance
    pub const APP_HOST_HEADER: &str = "x-app-host-id";

    /// Destination property naming the app-host instance it points at
    pub const APP_HOST_PROPERTY: &str = "app_host_id";

    /// Destination property grouping destinations under one logical service
    pub const CLOUD_SERVICE_PROPERTY: &str = "cloud_service";
}

// Re-export commonly used constants for convenience
pub use cache::TTL as CACHE_TTL;
pub use jobs::MAX_POLL_ATTEMPTS;
pub use limits::MAX_DELETE_ATTEMPTS;
pub use services::{APP_HOST_HEADER, DEFAULT_SERVICE_NAME};
pub use transfer::MAX_CONCURRENT_CONNECTIONS;

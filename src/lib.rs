//! apprepo library
//!
//! A client library for tenant-scoped application-file repository services.
//! Resolves brokered service contexts on demand, transfers files with
//! bounded concurrency, and manages destination configurations.

pub mod cli;
pub mod config;
pub mod constants;
pub mod destination;
pub mod errors;
pub mod platform;
pub mod repo;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use constants::*;

    #[test]
    fn test_constants_accessible() {
        assert_eq!(MAX_POLL_ATTEMPTS, 10);
        assert_eq!(MAX_DELETE_ATTEMPTS, 3);
        assert_eq!(MAX_CONCURRENT_CONNECTIONS, 50);
        assert_eq!(DEFAULT_SERVICE_NAME, "apps-repo");
        assert!(http::USER_AGENT.contains("apprepo"));
    }

    #[test]
    fn test_error_types() {
        let platform_error = errors::PlatformError::MissingJobLocation;
        let app_error = AppError::Platform(platform_error);
        assert_eq!(app_error.category(), "platform");
    }
}

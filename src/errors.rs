//! Error types for apprepo
//!
//! Errors are split by functional domain and aggregated into a single
//! top-level [`AppError`]. Helpers return errors rather than deciding exit
//! behavior; only the command layer turns an error into process exit.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration errors: bad TLS/CA setup, missing session variables.
/// Always fatal and never retried.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required session environment variable is not set
    #[error("Missing required environment variable '{name}'")]
    MissingEnv { name: &'static str },

    /// A value that must be a URL could not be parsed
    #[error("Invalid URL in '{name}': {value}")]
    InvalidUrl { name: &'static str, value: String },

    /// The custom CA bundle could not be read
    #[error("Failed to read CA bundle {path}: {source}")]
    CaBundleRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The custom CA bundle contained no parseable certificates
    #[error("No certificates could be parsed from CA bundle {path}")]
    CaBundleEmpty { path: PathBuf },

    /// A certificate in the custom CA bundle was malformed
    #[error("Invalid certificate in CA bundle {path}")]
    CaBundleParse {
        path: PathBuf,
        source: reqwest::Error,
    },

    /// Client certificate / private key material was malformed
    #[error("Invalid client identity material")]
    InvalidIdentity(#[source] reqwest::Error),

    /// The HTTP client itself could not be constructed
    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),
}

/// Platform resource API errors: not-found conditions are terminal and
/// user-facing; job failures and delete refusals carry the platform's
/// structured detail where present.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Transport-level request failure
    #[error("Platform request failed")]
    Http(#[from] reqwest::Error),

    /// Response could not be deserialized
    #[error("Failed to parse platform response")]
    Json(#[from] serde_json::Error),

    /// Non-success status with no structured detail
    #[error("Unexpected response from {url}: [{status}] {body}")]
    UnexpectedResponse {
        url: String,
        status: u16,
        body: String,
    },

    /// Requested service offering is not available in the space
    #[error(
        "Service '{name}' is not in the list of available services. \
         Make sure your subaccount has entitlement to use it"
    )]
    OfferingNotFound { name: String },

    /// Requested plan does not exist for the offering
    #[error("Service '{service}' does not have a '{plan}' plan")]
    PlanNotFound { service: String, plan: String },

    /// Caller pinned an instance by name and no such instance exists
    #[error("Could not find service instance with name '{name}'")]
    InstanceNotFound { name: String },

    /// Asynchronous job reached the FAILED state with structured detail
    #[error("Job failed: {code} {title} {detail}")]
    JobFailed {
        code: i64,
        title: String,
        detail: String,
    },

    /// Asynchronous job reached the FAILED state without detail
    #[error("Job failed. Job GUID: {guid}")]
    JobFailedNoDetail { guid: String },

    /// Job never reached a terminal state within the polling budget
    #[error("Job did not reach a terminal state after {attempts} attempts (last state: '{state}')")]
    PollingExhausted { attempts: u32, state: String },

    /// 202 response for an asynchronous operation had no Location header
    #[error("Asynchronous operation did not return a job location")]
    MissingJobLocation,

    /// Completed job resource lacked the link to the created resource
    #[error("Malformed job resource: no '{link}' link")]
    MissingJobLink { link: &'static str },

    /// Resource deletion was still refused on the final attempt
    #[error("Could not delete resource: {detail}")]
    DeleteRefused { detail: String },

    /// The platform handed back a link that is not a usable URL
    #[error("Invalid URL received from platform: {value}")]
    InvalidLink { value: String },

    /// Service key credentials were missing a required field
    #[error("Malformed service key credentials: {reason}")]
    MalformedCredentials { reason: String },
}

/// Token exchange errors
#[derive(Error, Debug)]
pub enum TokenError {
    /// Key credentials carried no identity-provider block
    #[error("Service key credentials contain no identity provider section")]
    MissingIdentityProvider,

    /// Building the mutual-TLS client for the x509 grant failed
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Transport-level request failure
    #[error("Token request failed")]
    Http(#[from] reqwest::Error),

    /// Token endpoint answered with a non-success status
    #[error("Token endpoint returned [{status}] {body}")]
    Endpoint { status: u16, body: String },

    /// Token endpoint reply carried no access token
    #[error("Token endpoint reply did not contain an access token")]
    MissingAccessToken,
}

/// Context cache persistence errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cache file could not be read or written
    #[error("Cache file I/O failed")]
    Io(#[from] std::io::Error),

    /// Cache file contents could not be (de)serialized
    #[error("Cache file contents are not valid JSON")]
    Json(#[from] serde_json::Error),

    /// No home directory to place the cache file under
    #[error("Could not determine a home directory for the cache file")]
    NoHomeDirectory,
}

/// Per-task errors of the concurrent transfer engine
#[derive(Error, Debug)]
pub enum TransferError {
    /// Transport-level request failure
    #[error("Transfer request failed")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status for this path
    #[error("Server returned [{status}] for {path}")]
    Status { status: u16, path: String },

    /// Metadata fetch: Content-Length header absent
    #[error("Missing Content-Length header for {path}")]
    MissingLength { path: String },

    /// Metadata fetch: Content-Length header not a number
    #[error("Invalid Content-Length header for {path}")]
    InvalidLength { path: String },

    /// Metadata fetch: Etag header absent
    #[error("Missing Etag header for {path}")]
    MissingEtag { path: String },

    /// The spawned transfer task itself failed to complete
    #[error("Transfer task failed: {0}")]
    TaskFailed(String),
}

/// Repository content API errors
#[derive(Error, Debug)]
pub enum RepoError {
    /// Transport-level request failure
    #[error("Repository request failed")]
    Http(#[from] reqwest::Error),

    /// Response could not be deserialized
    #[error("Failed to parse repository response")]
    Json(#[from] serde_json::Error),

    /// Repository API answered with a non-success status
    #[error("[{status}] {body}")]
    Api { status: u16, body: String },

    /// Context credentials did not carry a repository service URL
    #[error("Service key credentials contain no repository URL")]
    MissingServiceUrl,

    /// A zip archive passed to push could not be read
    #[error("Failed to read archive {path}: {source}")]
    ArchiveRead {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Destination-configuration API errors
#[derive(Error, Debug)]
pub enum DestinationError {
    /// Transport-level request failure
    #[error("Destination request failed")]
    Http(#[from] reqwest::Error),

    /// Response could not be deserialized
    #[error("Failed to parse destination response")]
    Json(#[from] serde_json::Error),

    /// Destination API answered with a non-success status
    #[error("[{status}] {body}")]
    Api { status: u16, body: String },

    /// Context credentials did not carry a destination service URL
    #[error("Service key credentials contain no destination URL")]
    MissingServiceUrl,
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Destination(#[from] DestinationError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("{message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Platform(_) => "platform",
            AppError::Token(_) => "token",
            AppError::Cache(_) => "cache",
            AppError::Transfer(_) => "transfer",
            AppError::Repo(_) => "repository",
            AppError::Destination(_) => "destination",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Platform result type alias
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Transfer result type alias
pub type TransferResult<T> = std::result::Result<T, TransferError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let err = AppError::from(PlatformError::OfferingNotFound {
            name: "apps-repo".to_string(),
        });
        assert_eq!(err.category(), "platform");

        let err = AppError::generic("boom");
        assert_eq!(err.category(), "generic");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_not_found_message_names_service() {
        let err = PlatformError::OfferingNotFound {
            name: "apps-repo".to_string(),
        };
        assert!(err.to_string().contains("apps-repo"));
        assert!(err.to_string().contains("entitlement"));
    }

    #[test]
    fn test_polling_exhausted_is_distinct_from_job_failed() {
        let exhausted = PlatformError::PollingExhausted {
            attempts: 10,
            state: "PROCESSING".to_string(),
        };
        let failed = PlatformError::JobFailedNoDetail {
            guid: "j-1".to_string(),
        };
        assert!(exhausted.to_string().contains("10 attempts"));
        assert!(failed.to_string().contains("j-1"));
    }
}

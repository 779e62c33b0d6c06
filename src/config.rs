//! Platform session configuration
//!
//! The platform's own org/space/user lookup is an external collaborator;
//! the session consumes the identifiers it would produce, plus the behavior
//! switches, from environment variables.

use std::env;
use std::path::PathBuf;

use crate::constants::{env as env_names, services};
use crate::errors::ConfigError;
use crate::platform::TlsSettings;

/// Resolved platform session: endpoint, credentials, target identifiers and
/// behavior switches for one command invocation.
#[derive(Debug, Clone)]
pub struct Session {
    /// Platform resource API endpoint
    pub api_url: String,
    /// Bearer token for the platform resource API
    pub api_token: String,
    /// Target organization GUID
    pub org_id: String,
    /// Target space GUID
    pub space_id: String,
    /// Registered name of the repository service
    pub service_name: String,
    /// Caller-provided runtime URL, overriding derivation
    pub runtime_url_override: Option<String>,
    /// Whether the persisted context cache is enabled
    pub cache_enabled: bool,
    /// TLS trust settings for all remote calls
    pub tls: TlsSettings,
}

impl Session {
    /// Resolve the session from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Resolve the session from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &'static str| -> Result<String, ConfigError> {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingEnv { name })
        };

        let api_url = require(env_names::API_URL)?;
        if url::Url::parse(&api_url).is_err() {
            return Err(ConfigError::InvalidUrl {
                name: env_names::API_URL,
                value: api_url,
            });
        }

        Ok(Self {
            api_url,
            api_token: require(env_names::API_TOKEN)?,
            org_id: require(env_names::ORG_ID)?,
            space_id: require(env_names::SPACE_ID)?,
            service_name: lookup(env_names::SERVICE_NAME)
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| services::DEFAULT_SERVICE_NAME.to_string()),
            runtime_url_override: lookup(env_names::RUNTIME_URL).filter(|u| !u.is_empty()),
            cache_enabled: lookup(env_names::CACHE).as_deref() == Some("1"),
            tls: TlsSettings {
                insecure: lookup(env_names::SKIP_SSL_VALIDATION).as_deref() == Some("1"),
                ca_bundle: lookup(env_names::CA_BUNDLE)
                    .filter(|p| !p.is_empty())
                    .map(PathBuf::from),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (env_names::API_URL, "https://api.platform.example.com"),
            (env_names::API_TOKEN, "bearer-token"),
            (env_names::ORG_ID, "org-guid"),
            (env_names::SPACE_ID, "space-guid"),
        ])
    }

    fn session_from(vars: &HashMap<&'static str, &'static str>) -> Result<Session, ConfigError> {
        Session::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn test_session_defaults() {
        let session = session_from(&base_vars()).unwrap();
        assert_eq!(session.service_name, services::DEFAULT_SERVICE_NAME);
        assert!(!session.cache_enabled);
        assert!(!session.tls.insecure);
        assert!(session.tls.ca_bundle.is_none());
        assert!(session.runtime_url_override.is_none());
    }

    #[test]
    fn test_session_switches() {
        let mut vars = base_vars();
        vars.insert(env_names::CACHE, "1");
        vars.insert(env_names::SERVICE_NAME, "custom-repo");
        vars.insert(env_names::RUNTIME_URL, "https://runtime.example.com");
        vars.insert(env_names::SKIP_SSL_VALIDATION, "1");
        vars.insert(env_names::CA_BUNDLE, "/etc/certs/custom.pem");

        let session = session_from(&vars).unwrap();
        assert!(session.cache_enabled);
        assert_eq!(session.service_name, "custom-repo");
        assert_eq!(
            session.runtime_url_override.as_deref(),
            Some("https://runtime.example.com")
        );
        assert!(session.tls.insecure);
        assert_eq!(
            session.tls.ca_bundle,
            Some(PathBuf::from("/etc/certs/custom.pem"))
        );
    }

    #[test]
    fn test_missing_variable_is_config_error() {
        let mut vars = base_vars();
        vars.remove(env_names::SPACE_ID);

        match session_from(&vars) {
            Err(ConfigError::MissingEnv { name }) => assert_eq!(name, env_names::SPACE_ID),
            other => panic!("expected MissingEnv, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_api_url_is_config_error() {
        let mut vars = base_vars();
        vars.insert(env_names::API_URL, "not a url");

        assert!(matches!(
            session_from(&vars),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }
}

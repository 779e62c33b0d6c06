//! HTTP client construction with TLS trust settings
//!
//! All remote calls go through clients built here. Trust is either strict,
//! fully relaxed, or extended with a custom CA bundle; a supplied bundle is
//! always added on top of the system pool, never instead of it. TLS setup
//! problems are configuration errors and are never downgraded to an
//! insecure client.

use std::fs;
use std::path::{Path, PathBuf};

use reqwest::{Certificate, Client, Identity};
use tracing::warn;

use crate::constants::http;
use crate::errors::ConfigError;

/// TLS trust settings shared by every client this process builds
#[derive(Debug, Clone, Default)]
pub struct TlsSettings {
    /// Disable certificate verification entirely
    pub insecure: bool,
    /// Custom CA bundle (PEM) trusted in addition to the system pool
    pub ca_bundle: Option<PathBuf>,
}

/// Build the default HTTP client for the given trust settings
pub fn build_client(tls: &TlsSettings) -> Result<Client, ConfigError> {
    builder_for(tls)?.build().map_err(ConfigError::ClientBuild)
}

/// Build a client that additionally presents a client certificate, for the
/// mutual-TLS token grant
pub fn build_mtls_client(
    tls: &TlsSettings,
    certificate_pem: &str,
    key_pem: &str,
) -> Result<Client, ConfigError> {
    let identity = Identity::from_pkcs8_pem(certificate_pem.as_bytes(), key_pem.as_bytes())
        .map_err(ConfigError::InvalidIdentity)?;
    builder_for(tls)?
        .identity(identity)
        .build()
        .map_err(ConfigError::ClientBuild)
}

fn builder_for(tls: &TlsSettings) -> Result<reqwest::ClientBuilder, ConfigError> {
    let mut builder = Client::builder()
        .user_agent(http::USER_AGENT)
        .timeout(http::DEFAULT_TIMEOUT)
        .connect_timeout(http::CONNECT_TIMEOUT);

    match &tls.ca_bundle {
        None => {
            if tls.insecure {
                warn!("TLS certificate verification is disabled");
                builder = builder.danger_accept_invalid_certs(true);
            }
        }
        Some(path) => {
            // reqwest keeps the system roots when custom roots are added,
            // so the effective pool is the union of both.
            for certificate in read_ca_bundle(path)? {
                builder = builder.add_root_certificate(certificate);
            }
        }
    }

    Ok(builder)
}

fn read_ca_bundle(path: &Path) -> Result<Vec<Certificate>, ConfigError> {
    let pem = fs::read_to_string(path).map_err(|source| ConfigError::CaBundleRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mut certificates = Vec::new();
    for block in pem_certificate_blocks(&pem) {
        let certificate =
            Certificate::from_pem(block.as_bytes()).map_err(|source| ConfigError::CaBundleParse {
                path: path.to_path_buf(),
                source,
            })?;
        certificates.push(certificate);
    }

    if certificates.is_empty() {
        return Err(ConfigError::CaBundleEmpty {
            path: path.to_path_buf(),
        });
    }
    Ok(certificates)
}

/// Split a PEM file into individual certificate blocks
fn pem_certificate_blocks(pem: &str) -> Vec<String> {
    const BEGIN: &str = "-----BEGIN CERTIFICATE-----";
    const END: &str = "-----END CERTIFICATE-----";

    let mut blocks = Vec::new();
    let mut rest = pem;
    while let Some(start) = rest.find(BEGIN) {
        let Some(end) = rest[start..].find(END) else {
            break;
        };
        let block_end = start + end + END.len();
        blocks.push(rest[start..block_end].to_string());
        rest = &rest[block_end..];
    }
    blocks
}

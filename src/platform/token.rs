//! OAuth2 token exchange against the identity provider bound to a service
//! key.
//!
//! Two credential shapes exist in the wild. The classic shape carries a
//! client secret and authenticates with form fields over the shared HTTP
//! client. The x509 shape carries a PEM certificate and key instead, and
//! the exchange must go through a freshly built mutual-TLS client pointed
//! at the certificate endpoint.

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::errors::TokenError;

use super::models::IdentityProvider;
use super::transport::{build_mtls_client, TlsSettings};

#[derive(Debug, Deserialize)]
struct TokenReply {
    access_token: Option<String>,
}

/// Exchange service key credentials for a bearer token.
pub async fn fetch_token(
    http: &Client,
    tls: &TlsSettings,
    identity: &IdentityProvider,
) -> Result<String, TokenError> {
    let (client, base) = if identity.is_x509() {
        let client = build_mtls_client(tls, &identity.certificate, &identity.key)?;
        (client, identity.cert_url.as_str())
    } else {
        (http.clone(), identity.url.as_str())
    };
    let endpoint = format!("{}/oauth/token", base.trim_end_matches('/'));
    debug!("requesting token from {endpoint}");

    let mut form = vec![
        ("grant_type", "client_credentials"),
        ("client_id", identity.client_id.as_str()),
    ];
    if !identity.is_x509() {
        form.push(("client_secret", identity.client_secret.as_str()));
    }

    let response = client.post(&endpoint).form(&form).send().await?;
    let status = response.status();
    if status != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        return Err(TokenError::Endpoint {
            status: status.as_u16(),
            body,
        });
    }
    let reply: TokenReply = response.json().await?;
    reply.access_token.ok_or(TokenError::MissingAccessToken)
}

//! Client for the destination-configuration API.
//!
//! Destinations are flat string-keyed property maps. A handful of keys are
//! well known (`Name`, `Type`, `URL`, `Authentication`, `ProxyType`);
//! everything else is carried through untouched.

use std::collections::BTreeMap;

use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::DestinationError;

/// Level a destination record lives at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Subaccount,
    Instance,
}

impl Level {
    fn path_segment(&self) -> &'static str {
        match self {
            Level::Subaccount => "subaccountDestinations",
            Level::Instance => "instanceDestinations",
        }
    }
}

/// One destination record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Destination {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub destination_type: Option<String>,
    #[serde(rename = "URL", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "Authentication", default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    #[serde(rename = "ProxyType", default, skip_serializing_if = "Option::is_none")]
    pub proxy_type: Option<String>,
    /// Any further configuration properties, passed through as-is
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct DestinationClient {
    http: Client,
    base: String,
    token: String,
}

impl DestinationClient {
    pub fn new(http: Client, base: impl Into<String>, token: impl Into<String>) -> Self {
        let base: String = base.into();
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, level: Level, name: Option<&str>) -> String {
        let mut url = format!(
            "{}/destination-configuration/v1/{}",
            self.base,
            level.path_segment()
        );
        if let Some(name) = name {
            url.push('/');
            url.push_str(name);
        }
        url
    }

    async fn expect_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, DestinationError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DestinationError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    pub async fn list(&self, level: Level) -> Result<Vec<Destination>, DestinationError> {
        let url = self.url(level, None);
        debug!("GET {url}");
        let response = self.http.get(url).bearer_auth(&self.token).send().await?;
        Ok(Self::expect_success(response).await?.json().await?)
    }

    pub async fn get(
        &self,
        level: Level,
        name: &str,
    ) -> Result<Option<Destination>, DestinationError> {
        let url = self.url(level, Some(name));
        debug!("GET {url}");
        let response = self.http.get(url).bearer_auth(&self.token).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::expect_success(response).await?.json().await?))
    }

    pub async fn create(
        &self,
        level: Level,
        destination: &Destination,
    ) -> Result<(), DestinationError> {
        let url = self.url(level, None);
        debug!("POST {url}");
        let response = self
            .http
            .request(Method::POST, url)
            .bearer_auth(&self.token)
            .json(destination)
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    pub async fn delete(&self, level: Level, name: &str) -> Result<(), DestinationError> {
        let url = self.url(level, Some(name));
        debug!("DELETE {url}");
        let response = self
            .http
            .request(Method::DELETE, url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }
}

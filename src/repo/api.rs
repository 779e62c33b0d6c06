//! Client for the repository content API.
//!
//! Talks to the service URL taken from resolved key credentials. Listing
//! and metadata calls are plain JSON; uploads go through a multipart PUT
//! with one `apps` part per archive.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::constants::services::APP_HOST_HEADER;
use crate::errors::RepoError;

/// One application visible in the repository.
#[derive(Debug, Clone, Deserialize)]
pub struct Application {
    #[serde(rename = "applicationName")]
    pub name: String,
    #[serde(rename = "applicationVersion")]
    pub version: String,
    #[serde(rename = "changedOn", default)]
    pub changed_on: Option<String>,
    #[serde(rename = "isDefault", default)]
    pub is_default: bool,
}

impl Application {
    /// Key under which the application's files are addressed, in
    /// `name-version` form.
    pub fn app_key(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

/// Repository-wide metadata for one app-host instance.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceMeta {
    #[serde(rename = "sizeLimit", default)]
    pub size_limit: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RepoClient {
    http: Client,
    base: String,
    token: String,
}

impl RepoClient {
    pub fn new(http: Client, base: impl Into<String>, token: impl Into<String>) -> Self {
        let base: String = base.into();
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        app_host_id: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.base);
        debug!("{method} {url}");
        let mut request = self.http.request(method, url).bearer_auth(&self.token);
        if let Some(id) = app_host_id {
            request = request.header(APP_HOST_HEADER, id);
        }
        request
    }

    async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response, RepoError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RepoError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// All applications visible to the current context.
    pub async fn list_applications(
        &self,
        app_host_id: Option<&str>,
    ) -> Result<Vec<Application>, RepoError> {
        let response = self
            .request(reqwest::Method::GET, "/applications/metadata/", app_host_id)
            .send()
            .await?;
        Ok(Self::expect_success(response).await?.json().await?)
    }

    /// Paths of all files belonging to one application.
    pub async fn list_files(
        &self,
        app_key: &str,
        app_host_id: Option<&str>,
    ) -> Result<Vec<String>, RepoError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/applications/files/path/{app_key}"),
                app_host_id,
            )
            .send()
            .await?;
        Ok(Self::expect_success(response).await?.json().await?)
    }

    /// Repository metadata (size limit, status) for one app-host instance.
    pub async fn service_meta(&self, app_host_id: Option<&str>) -> Result<ServiceMeta, RepoError> {
        let response = self
            .request(reqwest::Method::GET, "/app-host/metadata", app_host_id)
            .send()
            .await?;
        Ok(Self::expect_success(response).await?.json().await?)
    }

    /// Upload prepared zip archives. Each archive becomes one `apps` part
    /// of a multipart PUT; the repository replaces the app-host content as
    /// a whole.
    pub async fn upload(
        &self,
        archives: &[impl AsRef<Path>],
        app_host_id: Option<&str>,
    ) -> Result<(), RepoError> {
        let mut form = Form::new();
        for archive in archives {
            let path = archive.as_ref();
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|source| RepoError::ArchiveRead {
                    path: path.to_path_buf(),
                    source,
                })?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "app.zip".to_string());
            let part = Part::bytes(bytes)
                .file_name(file_name)
                .mime_str("application/zip")?;
            form = form.part("apps", part);
        }
        let response = self
            .request(reqwest::Method::PUT, "/applications/content/", app_host_id)
            .multipart(form)
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    /// Remove all content of one app-host instance.
    pub async fn delete_content(&self, app_host_id: &str) -> Result<(), RepoError> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                "/applications/content/",
                Some(app_host_id),
            )
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::NO_CONTENT {
            let body = response.text().await.unwrap_or_default();
            return Err(RepoError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_key_joins_name_and_version() {
        let app = Application {
            name: "shop".to_string(),
            version: "1.2.3".to_string(),
            changed_on: None,
            is_default: false,
        };
        assert_eq!(app.app_key(), "shop-1.2.3");
    }

    #[test]
    fn base_url_is_normalized() {
        let client = RepoClient::new(Client::new(), "https://repo.example.com/", "t");
        assert_eq!(client.base(), "https://repo.example.com");
    }
}

//! HTTP client for the platform controller API.
//!
//! Wraps a preconfigured [`reqwest::Client`] with the bearer token and base
//! URL for one session, and layers on the request patterns the rest of the
//! crate relies on: paginated collection walks, asynchronous creates that
//! hand back a job URL, and deletes that retry while the resource is still
//! winding down.

use chrono::Utc;
use reqwest::header::LOCATION;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::constants::MAX_DELETE_ATTEMPTS;
use crate::errors::{PlatformError, PlatformResult};

use super::jobs::{poll_job, PollConfig};
use super::models::{
    parse_error_items, Credentials, Job, Page, ServiceInstance, ServiceKey, ServiceOffering,
    ServicePlan,
};

/// Job link names for the resources we create asynchronously.
const LINK_SERVICE_INSTANCES: &str = "service_instances";
const LINK_SERVICE_CREDENTIAL_BINDING: &str = "service_credential_binding";

#[derive(Debug, Clone)]
pub struct PlatformClient {
    http: Client,
    api_url: Url,
    token: String,
    poll: PollConfig,
}

impl PlatformClient {
    pub fn new(http: Client, api_url: Url, token: impl Into<String>) -> Self {
        Self {
            http,
            api_url,
            token: token.into(),
            poll: PollConfig::default(),
        }
    }

    /// Replace the job polling schedule. Mostly useful in tests, where the
    /// default ramp would stretch a failure case over several seconds.
    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// The underlying HTTP client, for callers that talk to endpoints
    /// outside the controller API but share the TLS configuration.
    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    fn absolute(&self, path: &str) -> PlatformResult<Url> {
        self.api_url
            .join(path)
            .map_err(|_| PlatformError::InvalidLink {
                value: path.to_string(),
            })
    }

    /// Resolve a link handed back by the platform against our API host.
    ///
    /// Pagination and job links are sometimes absolute URLs pointing at a
    /// host other than the one the session was opened against (reverse
    /// proxies rewrite them). Those are folded back onto the session host,
    /// keeping only the path and query.
    fn normalize_link(&self, href: &str) -> PlatformResult<Url> {
        match Url::parse(href) {
            Ok(link) => {
                if link.host_str() == self.api_url.host_str() {
                    Ok(link)
                } else {
                    let mut normalized = self.absolute(link.path())?;
                    normalized.set_query(link.query());
                    Ok(normalized)
                }
            }
            Err(url::ParseError::RelativeUrlWithoutBase) => self.absolute(href),
            Err(_) => Err(PlatformError::InvalidLink {
                value: href.to_string(),
            }),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> PlatformResult<T> {
        debug!("GET {url}");
        let response = self
            .http
            .get(url.clone())
            .bearer_auth(&self.token)
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::UnexpectedResponse {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    /// Walk every page of a collection endpoint, following `pagination.next`
    /// until the platform stops handing one back.
    async fn get_all<T: DeserializeOwned>(&self, path: &str) -> PlatformResult<Vec<T>> {
        let mut resources = Vec::new();
        let mut next = Some(self.absolute(path)?);
        while let Some(url) = next {
            let page: Page<T> = self.get_json(url.clone()).await?;
            resources.extend(page.resources);
            next = match page.pagination.next_href() {
                // A server echoing the current page back would loop forever.
                Some(href) if href == url.as_str() => None,
                Some(href) => Some(self.normalize_link(href)?),
                None => None,
            };
        }
        Ok(resources)
    }

    pub async fn list_offerings(&self, space_id: &str) -> PlatformResult<Vec<ServiceOffering>> {
        self.get_all(&format!("/v3/service_offerings?space_guids={space_id}"))
            .await
    }

    pub async fn list_plans(&self, offering_id: &str) -> PlatformResult<Vec<ServicePlan>> {
        self.get_all(&format!(
            "/v3/service_plans?service_offering_guids={offering_id}"
        ))
        .await
    }

    pub async fn list_instances(
        &self,
        space_id: &str,
        plan_id: &str,
    ) -> PlatformResult<Vec<ServiceInstance>> {
        self.get_all(&format!(
            "/v3/service_instances?service_plan_guids={plan_id}&space_guids={space_id}"
        ))
        .await
    }

    pub async fn list_keys(&self, instance_id: &str) -> PlatformResult<Vec<ServiceKey>> {
        self.get_all(&format!(
            "/v3/service_credential_bindings?service_instance_guids={instance_id}"
        ))
        .await
    }

    /// Credentials are not part of the binding resource itself and have to
    /// be fetched from the details endpoint.
    pub async fn key_details(&self, key_id: &str) -> PlatformResult<Credentials> {
        #[derive(serde::Deserialize)]
        struct Details {
            #[serde(default)]
            credentials: Credentials,
        }
        let url = self.absolute(&format!(
            "/v3/service_credential_bindings/{key_id}/details"
        ))?;
        let details: Details = self.get_json(url).await?;
        Ok(details.credentials)
    }

    pub async fn get_job(&self, url: &str) -> PlatformResult<Job> {
        self.get_json(self.normalize_link(url)?).await
    }

    /// Create a managed service instance and wait for the provisioning job
    /// to finish. Returns the instance the completed job links to.
    pub async fn create_instance(
        &self,
        space_id: &str,
        plan: &ServicePlan,
        name: Option<&str>,
    ) -> PlatformResult<ServiceInstance> {
        let name = match name {
            Some(name) => name.to_string(),
            None => format!("{}-{}", plan.name, Utc::now().timestamp()),
        };
        let body = json!({
            "type": "managed",
            "name": name,
            "relationships": {
                "space": { "data": { "guid": space_id } },
                "service_plan": { "data": { "guid": plan.guid } },
            },
        });
        let job = self
            .submit_async("/v3/service_instances", &body, LINK_SERVICE_INSTANCES)
            .await?;
        self.get_json(self.normalize_link(&job)?).await
    }

    /// Create a service key for an instance and wait for the binding job.
    /// The returned key carries the credentials from the details endpoint.
    pub async fn create_key(
        &self,
        instance_id: &str,
        name: Option<&str>,
    ) -> PlatformResult<ServiceKey> {
        let name = match name {
            Some(name) => name.to_string(),
            None => format!("apprepo-key-{}", Utc::now().timestamp()),
        };
        let body = json!({
            "type": "key",
            "name": name,
            "relationships": {
                "service_instance": { "data": { "guid": instance_id } },
            },
        });
        let link = self
            .submit_async(
                "/v3/service_credential_bindings",
                &body,
                LINK_SERVICE_CREDENTIAL_BINDING,
            )
            .await?;
        let mut key: ServiceKey = self.get_json(self.normalize_link(&link)?).await?;
        key.credentials = self.key_details(&key.guid).await?;
        Ok(key)
    }

    /// POST a resource creation, poll the job the platform points us at,
    /// and return the completed job's link to the created resource.
    async fn submit_async(
        &self,
        path: &str,
        body: &serde_json::Value,
        link_name: &'static str,
    ) -> PlatformResult<String> {
        let url = self.absolute(path)?;
        debug!("POST {url}");
        let response = self
            .http
            .post(url.clone())
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::UnexpectedResponse {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        let job_url = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or(PlatformError::MissingJobLocation)?;
        let job = poll_job(self, &job_url, &self.poll).await?;
        job.link(link_name)
            .map(str::to_string)
            .ok_or(PlatformError::MissingJobLink { link: link_name })
    }

    pub async fn delete_instance(&self, instance_id: &str) -> PlatformResult<()> {
        self.delete_with_retry(
            &format!("/v3/service_instances/{instance_id}"),
            MAX_DELETE_ATTEMPTS,
        )
        .await
    }

    pub async fn delete_key(&self, key_id: &str) -> PlatformResult<()> {
        self.delete_with_retry(
            &format!("/v3/service_credential_bindings/{key_id}"),
            MAX_DELETE_ATTEMPTS,
        )
        .await
    }

    /// Delete a resource, retrying while the platform reports a structured
    /// error (typically an operation still in progress on the resource).
    ///
    /// An empty response body means the delete was accepted. A non-empty
    /// body that does not parse as a structured error list is surfaced
    /// verbatim without retrying. A structured error earns another attempt,
    /// up to the budget, after which its human-readable text is surfaced.
    async fn delete_with_retry(&self, path: &str, max_attempts: u32) -> PlatformResult<()> {
        let url = self.absolute(path)?;
        for attempt in 1..=max_attempts {
            debug!("DELETE {url} (attempt {attempt}/{max_attempts})");
            let response = self
                .http
                .delete(url.clone())
                .bearer_auth(&self.token)
                .send()
                .await?;
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if body.trim().is_empty() {
                return Ok(());
            }
            let items = match parse_error_items(&body) {
                Some(items) => items,
                None => {
                    return Err(PlatformError::DeleteRefused {
                        detail: format!("[{}] {}", status.as_u16(), body.trim()),
                    })
                }
            };
            if attempt == max_attempts {
                let detail = items
                    .first()
                    .and_then(|item| item.human_text())
                    .unwrap_or_else(|| body.trim().to_string());
                return Err(PlatformError::DeleteRefused { detail });
            }
            warn!("delete of {path} refused, retrying: {}", body.trim());
        }
        unreachable!("delete loop returns on every attempt")
    }
}

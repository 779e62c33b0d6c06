//! Resolution of a working repository context from raw platform resources.
//!
//! Commands never talk to the content API directly from a session. They
//! first resolve a context: locate the service offering and plan, find or
//! provision a service instance, find or create a service key, and exchange
//! its credentials for a bearer token. Keys are ephemeral and always
//! deleted at teardown; an instance is deleted only when the resolver
//! provisioned it itself.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::errors::{AppError, PlatformError, Result, TokenError};

use super::cache::{CacheKey, CacheValue, ContextCache};
use super::client::PlatformClient;
use super::models::{Credentials, ServiceInstance, ServiceKey, ServiceOffering, ServicePlan};
use super::token::fetch_token;
use super::transport::TlsSettings;

/// A fully resolved repository context, ready for content API calls.
///
/// The record is self-contained: teardown needs nothing beyond the flags
/// and guids stored here, and the whole thing round-trips through the
/// context cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoContext {
    pub service_name: String,
    pub offering: ServiceOffering,
    pub plan: ServicePlan,
    pub instance: ServiceInstance,
    /// True when the resolver provisioned the instance itself
    pub instance_owned: bool,
    pub key: ServiceKey,
    pub access_token: String,
    /// Base URL for runtime access to served application files
    pub runtime_url: String,
}

/// A resolved destination service context. Never cached, since destination
/// changes are expected to be visible immediately.
#[derive(Debug, Clone)]
pub struct DestinationContext {
    pub instance: ServiceInstance,
    pub instance_owned: bool,
    pub key: ServiceKey,
    pub access_token: String,
    /// Base URL of the destination configuration API
    pub service_url: String,
}

/// Outcome of locating or provisioning an instance and key.
struct ResolvedAccess {
    offering: ServiceOffering,
    plan: ServicePlan,
    instance: ServiceInstance,
    instance_owned: bool,
    key: ServiceKey,
    access_token: String,
}

pub struct ContextResolver {
    platform: PlatformClient,
    tls: TlsSettings,
    org_id: String,
    space_id: String,
}

impl ContextResolver {
    pub fn new(
        platform: PlatformClient,
        tls: TlsSettings,
        org_id: impl Into<String>,
        space_id: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            tls,
            org_id: org_id.into(),
            space_id: space_id.into(),
        }
    }

    pub fn platform(&self) -> &PlatformClient {
        &self.platform
    }

    /// Resolve a repository context for the given service and plan.
    ///
    /// When a cache is supplied, offering and plan lookups go through it
    /// and the finished context is stored back. `preferred_instance` pins
    /// resolution to a named instance; if that instance does not exist in
    /// the space the resolution fails rather than provisioning a new one.
    pub async fn resolve_repo(
        &self,
        service_name: &str,
        plan_name: &str,
        preferred_instance: Option<&str>,
        runtime_override: Option<&str>,
        mut cache: Option<&mut ContextCache>,
    ) -> Result<RepoContext> {
        if let Some(cache) = cache.as_deref_mut() {
            if let Some(cached) = cache.repo_context(&self.org_id, &self.space_id) {
                debug!("reusing cached repository context");
                return Ok(cached.clone());
            }
        }
        let access = self
            .resolve_access(service_name, plan_name, preferred_instance, cache.as_deref_mut())
            .await?;

        let runtime_url = match runtime_override {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let identity = access
                    .key
                    .credentials
                    .uaa
                    .as_ref()
                    .ok_or(TokenError::MissingIdentityProvider)?;
                derive_runtime_url(&access.key.credentials, &identity.identity_zone)?
            }
        };

        let context = RepoContext {
            service_name: service_name.to_string(),
            offering: access.offering,
            plan: access.plan,
            instance: access.instance,
            instance_owned: access.instance_owned,
            key: access.key,
            access_token: access.access_token,
            runtime_url,
        };
        if let Some(cache) = cache {
            cache.set(
                CacheKey::RepoContext {
                    org_id: self.org_id.clone(),
                    space_id: self.space_id.clone(),
                },
                CacheValue::Context(context.clone()),
            );
        }
        Ok(context)
    }

    /// Resolve a destination service context.
    pub async fn resolve_destination(
        &self,
        service_name: &str,
        plan_name: &str,
        preferred_instance: Option<&str>,
    ) -> Result<DestinationContext> {
        let access = self
            .resolve_access(service_name, plan_name, preferred_instance, None)
            .await?;
        let service_url = access
            .key
            .credentials
            .uri
            .clone()
            .ok_or(PlatformError::MalformedCredentials {
                reason: "service key credentials carry no service URL".to_string(),
            })?;
        Ok(DestinationContext {
            instance: access.instance,
            instance_owned: access.instance_owned,
            key: access.key,
            access_token: access.access_token,
            service_url,
        })
    }

    async fn resolve_access(
        &self,
        service_name: &str,
        plan_name: &str,
        preferred_instance: Option<&str>,
        mut cache: Option<&mut ContextCache>,
    ) -> Result<ResolvedAccess> {
        let offering = self
            .find_offering(service_name, cache.as_deref_mut())
            .await?;
        let plan = self
            .find_plan(&offering, plan_name, cache.as_deref_mut())
            .await?;

        let (instance, instance_owned) = self
            .find_or_create_instance(&plan, preferred_instance)
            .await?;
        let key = self.find_or_create_key(&instance).await?;

        let identity = key
            .credentials
            .uaa
            .as_ref()
            .ok_or(TokenError::MissingIdentityProvider)?;
        let access_token = fetch_token(self.platform.http(), &self.tls, identity).await?;

        Ok(ResolvedAccess {
            offering,
            plan,
            instance,
            instance_owned,
            key,
            access_token,
        })
    }

    async fn find_offering(
        &self,
        service_name: &str,
        cache: Option<&mut ContextCache>,
    ) -> Result<ServiceOffering> {
        let offerings = match cache {
            Some(cache) => {
                if let Some(cached) = cache.offerings(&self.space_id) {
                    cached.to_vec()
                } else {
                    let fresh = self.platform.list_offerings(&self.space_id).await?;
                    cache.set(
                        CacheKey::Offerings {
                            space_id: self.space_id.clone(),
                        },
                        CacheValue::Offerings(fresh.clone()),
                    );
                    fresh
                }
            }
            None => self.platform.list_offerings(&self.space_id).await?,
        };
        offerings
            .into_iter()
            .find(|offering| offering.name == service_name)
            .ok_or_else(|| {
                AppError::from(PlatformError::OfferingNotFound {
                    name: service_name.to_string(),
                })
            })
    }

    async fn find_plan(
        &self,
        offering: &ServiceOffering,
        plan_name: &str,
        cache: Option<&mut ContextCache>,
    ) -> Result<ServicePlan> {
        let plans = match cache {
            Some(cache) => {
                if let Some(cached) = cache.plans(&offering.guid) {
                    cached.to_vec()
                } else {
                    let fresh = self.platform.list_plans(&offering.guid).await?;
                    cache.set(
                        CacheKey::Plans {
                            offering_id: offering.guid.clone(),
                        },
                        CacheValue::Plans(fresh.clone()),
                    );
                    fresh
                }
            }
            None => self.platform.list_plans(&offering.guid).await?,
        };
        plans
            .into_iter()
            .find(|plan| plan.name == plan_name)
            .ok_or_else(|| {
                AppError::from(PlatformError::PlanNotFound {
                    service: offering.name.clone(),
                    plan: plan_name.to_string(),
                })
            })
    }

    /// Find a usable instance of the plan, provisioning one when the space
    /// has none. Instances stuck in a failed delete are never reused.
    async fn find_or_create_instance(
        &self,
        plan: &ServicePlan,
        preferred: Option<&str>,
    ) -> Result<(ServiceInstance, bool)> {
        let candidates: Vec<ServiceInstance> = self
            .platform
            .list_instances(&self.space_id, &plan.guid)
            .await?
            .into_iter()
            .filter(|instance| !instance.last_operation.is_failed_delete())
            .collect();

        if let Some(name) = preferred {
            let instance = candidates
                .into_iter()
                .find(|instance| instance.name == name)
                .ok_or_else(|| PlatformError::InstanceNotFound {
                    name: name.to_string(),
                })?;
            debug!("using pinned service instance {}", instance.name);
            return Ok((instance, false));
        }

        if let Some(instance) = candidates.into_iter().next() {
            debug!("borrowing existing service instance {}", instance.name);
            return Ok((instance, false));
        }

        info!("no usable instance of plan {}, provisioning one", plan.name);
        let instance = self
            .platform
            .create_instance(&self.space_id, plan, None)
            .await?;
        Ok((instance, true))
    }

    /// Reuse the first existing key of the instance, or create one. Either
    /// way the key belongs to the context and is deleted at teardown.
    async fn find_or_create_key(&self, instance: &ServiceInstance) -> Result<ServiceKey> {
        let keys = self.platform.list_keys(&instance.guid).await?;
        if let Some(mut key) = keys.into_iter().next() {
            debug!("reusing service key {}", key.name);
            key.credentials = self.platform.key_details(&key.guid).await?;
            return Ok(key);
        }
        info!("instance {} has no service key, creating one", instance.name);
        Ok(self.platform.create_key(&instance.guid, None).await?)
    }

    /// Create a short-lived key on an instance and exchange it for a token.
    /// The caller deletes the key when it is done with it.
    pub async fn ephemeral_key(&self, instance_id: &str) -> Result<(ServiceKey, String)> {
        let key = self.platform.create_key(instance_id, None).await?;
        let identity = key
            .credentials
            .uaa
            .as_ref()
            .ok_or(TokenError::MissingIdentityProvider)?;
        let token = fetch_token(self.platform.http(), &self.tls, identity).await?;
        Ok((key, token))
    }

    /// All usable instances of the named service plan in the session space.
    pub async fn plan_instances(
        &self,
        service_name: &str,
        plan_name: &str,
    ) -> Result<Vec<ServiceInstance>> {
        let offering = self.find_offering(service_name, None).await?;
        let plan = self.find_plan(&offering, plan_name, None).await?;
        Ok(self
            .platform
            .list_instances(&self.space_id, &plan.guid)
            .await?)
    }

    /// Delete the context's resources in reverse order of creation. The key
    /// always goes; the instance only when this resolution provisioned it.
    pub async fn teardown(
        &self,
        key_id: &str,
        instance_owned: bool,
        instance_id: &str,
    ) -> Result<()> {
        debug!("deleting service key {key_id}");
        self.platform.delete_key(key_id).await?;
        if instance_owned {
            debug!("deleting created service instance {instance_id}");
            self.platform.delete_instance(instance_id).await?;
        }
        Ok(())
    }

    pub async fn teardown_repo(&self, context: &RepoContext) -> Result<()> {
        self.teardown(
            &context.key.guid,
            context.instance_owned,
            &context.instance.guid,
        )
        .await
    }

    pub async fn teardown_destination(&self, context: &DestinationContext) -> Result<()> {
        self.teardown(
            &context.key.guid,
            context.instance_owned,
            &context.instance.guid,
        )
        .await
    }
}

/// Derive the runtime base URL from key credentials.
///
/// The service URL in the credentials points at the service's own host,
/// for example `https://service.cf.eu1.example.com`. Applications are
/// served from the tenant's own subdomain instead, obtained by swapping
/// the first host label for the tenant's identity zone.
fn derive_runtime_url(credentials: &Credentials, identity_zone: &str) -> Result<String> {
    let uri = credentials
        .uri
        .as_deref()
        .ok_or(PlatformError::MalformedCredentials {
            reason: "service key credentials carry no service URL".to_string(),
        })?;
    let url = Url::parse(uri).map_err(|_| PlatformError::MalformedCredentials {
        reason: format!("service URL is not valid: {uri}"),
    })?;
    let host = url.host_str().ok_or_else(|| PlatformError::MalformedCredentials {
        reason: format!("service URL has no host: {uri}"),
    })?;
    let (_, domain) = host
        .split_once('.')
        .ok_or_else(|| PlatformError::MalformedCredentials {
            reason: format!("service URL host has no subdomain to replace: {host}"),
        })?;
    Ok(format!("{}://{identity_zone}.{domain}", url.scheme()))
}

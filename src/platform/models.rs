//! Wire models for the platform resource API
//!
//! Typed request/response payloads for the brokered-resource hierarchy
//! (offerings, plans, instances, keys), asynchronous jobs and paginated
//! list responses. All models round-trip through serde so resolved contexts
//! can be persisted by the context cache.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Brokered service offering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOffering {
    pub guid: String,
    pub name: String,
}

/// Plan of a service offering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePlan {
    pub guid: String,
    pub name: String,
}

/// Last operation recorded on a service instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastOperation {
    #[serde(rename = "type", default)]
    pub operation_type: String,
    #[serde(default)]
    pub state: String,
}

impl LastOperation {
    /// An instance whose last operation was a failed delete is in an
    /// indeterminate state and unsafe to reuse.
    pub fn is_failed_delete(&self) -> bool {
        self.operation_type == "delete" && self.state == "failed"
    }
}

/// Service instance of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub guid: String,
    pub name: String,
    #[serde(default)]
    pub last_operation: LastOperation,
}

/// Credential-bearing service key of an instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceKey {
    pub guid: String,
    pub name: String,
    #[serde(default)]
    pub credentials: Credentials,
}

/// Credentials embedded in a service key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    /// Base URL of the service the key grants access to
    #[serde(default)]
    pub uri: Option<String>,
    /// Identity-provider block used for the token exchange
    #[serde(default)]
    pub uaa: Option<IdentityProvider>,
}

/// Identity-provider section of service key credentials. The
/// `credential-type` discriminator selects between the shared-secret and
/// the mutual-TLS certificate grant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityProvider {
    #[serde(rename = "clientid", default)]
    pub client_id: String,
    #[serde(rename = "clientsecret", default)]
    pub client_secret: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "identityzone", default)]
    pub identity_zone: String,
    #[serde(rename = "credential-type", default)]
    pub credential_type: Option<String>,
    #[serde(rename = "certurl", default)]
    pub cert_url: String,
    #[serde(default)]
    pub certificate: String,
    #[serde(default)]
    pub key: String,
}

impl IdentityProvider {
    /// Whether the key carries mutual-TLS certificate material
    pub fn is_x509(&self) -> bool {
        self.credential_type.as_deref() == Some("x509")
    }
}

/// Job state in which the platform reports successful completion
pub const JOB_STATE_COMPLETE: &str = "COMPLETE";

/// Job state in which the platform reports failure
pub const JOB_STATE_FAILED: &str = "FAILED";

/// Hypermedia link on a platform resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub href: Option<String>,
}

/// Structured error/warning descriptor attached to a job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobMessage {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
}

/// Handle to an asynchronous platform operation. Any state other than
/// [`JOB_STATE_COMPLETE`] or [`JOB_STATE_FAILED`] is treated as not yet
/// terminal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub errors: Vec<JobMessage>,
    #[serde(default)]
    pub links: HashMap<String, Link>,
}

impl Job {
    pub fn is_complete(&self) -> bool {
        self.state == JOB_STATE_COMPLETE
    }

    pub fn is_failed(&self) -> bool {
        self.state == JOB_STATE_FAILED
    }

    /// Href of a named link, if present and non-null
    pub fn link(&self, name: &str) -> Option<&str> {
        self.links.get(name).and_then(|l| l.href.as_deref())
    }
}

/// One page of a paginated list response
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub resources: Vec<T>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// Pagination block of a list response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub next: Option<Link>,
}

impl Pagination {
    /// URL of the next page, if any
    pub fn next_href(&self) -> Option<&str> {
        self.next.as_ref().and_then(|l| l.href.as_deref())
    }
}

/// Structured platform error item, as returned in error bodies
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorItem {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
}

impl ApiErrorItem {
    /// Human-readable text of the error, if it has any
    pub fn human_text(&self) -> Option<String> {
        let text = format!("{} {}", self.title, self.detail);
        let text = text.trim().to_string();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ApiErrorItem>,
}

/// Parse a response body as a structured platform error list. Supports both
/// the bare-array and the `{"errors": [...]}` envelope shape; returns `None`
/// when no structured error is parseable.
pub fn parse_error_items(body: &str) -> Option<Vec<ApiErrorItem>> {
    if let Ok(items) = serde_json::from_str::<Vec<ApiErrorItem>>(body) {
        if !items.is_empty() {
            return Some(items);
        }
        return None;
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(envelope) if !envelope.errors.is_empty() => Some(envelope.errors),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_delete_filtering() {
        let broken = LastOperation {
            operation_type: "delete".to_string(),
            state: "failed".to_string(),
        };
        let healthy = LastOperation {
            operation_type: "create".to_string(),
            state: "succeeded".to_string(),
        };
        assert!(broken.is_failed_delete());
        assert!(!healthy.is_failed_delete());
    }

    #[test]
    fn test_job_state_helpers_treat_unknown_as_nonterminal() {
        let job: Job = serde_json::from_str(
            r#"{"guid":"j-1","state":"POLLING","links":{"self":{"href":"https://x/v3/jobs/j-1"}}}"#,
        )
        .unwrap();
        assert!(!job.is_complete());
        assert!(!job.is_failed());
        assert_eq!(job.link("self"), Some("https://x/v3/jobs/j-1"));
        assert_eq!(job.link("service_instances"), None);
    }

    #[test]
    fn test_identity_provider_discriminator() {
        let x509: IdentityProvider = serde_json::from_str(
            r#"{"clientid":"c","credential-type":"x509","certurl":"https://cert.auth"}"#,
        )
        .unwrap();
        let secret: IdentityProvider =
            serde_json::from_str(r#"{"clientid":"c","clientsecret":"s","url":"https://auth"}"#)
                .unwrap();
        assert!(x509.is_x509());
        assert!(!secret.is_x509());
    }

    #[test]
    fn test_parse_error_items_both_shapes() {
        let bare = r#"[{"code":10008,"title":"CF-Busy","detail":"operation in progress"}]"#;
        let envelope = r#"{"errors":[{"code":60016,"title":"ServiceInstanceDeleteFailed","detail":"try later"}]}"#;

        let items = parse_error_items(bare).unwrap();
        assert_eq!(items[0].code, 10008);
        let items = parse_error_items(envelope).unwrap();
        assert_eq!(items[0].code, 60016);

        assert!(parse_error_items("deletion accepted").is_none());
        assert!(parse_error_items("[]").is_none());
        assert!(parse_error_items(r#"{"errors":[]}"#).is_none());
    }

    #[test]
    fn test_error_item_human_text() {
        let detailed = ApiErrorItem {
            code: 1,
            title: "CF-Busy".to_string(),
            detail: "operation in progress".to_string(),
        };
        let empty = ApiErrorItem::default();
        assert_eq!(
            detailed.human_text().unwrap(),
            "CF-Busy operation in progress"
        );
        assert!(empty.human_text().is_none());
    }
}

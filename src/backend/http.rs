//! HTTP implementation of the remote tag service.
//!
//! Talks to the security-tag service of an NSX manager
//! (`https://{manager}/api/2.0/services/securitytags`) over a blocking
//! ureq agent with basic auth and a fixed per-request timeout. Status
//! handling is explicit: 404 maps to `NotFound`, any other non-2xx status
//! maps to `Remote` carrying the endpoint's body verbatim.

use crate::backend::Backend;
use crate::config::{Config, REQUEST_TIMEOUT};
use crate::error::{Error, Result};
use crate::types::{Tag, TagAttributes};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use ureq::Agent;
use ureq::tls::TlsConfig;

/// HTTP backend against an NSX manager.
pub struct HttpBackend {
    /// Blocking HTTP agent.
    agent: Agent,
    /// Security-tag service base URL.
    base: String,
    /// Precomputed basic-auth header value.
    auth: String,
}

impl HttpBackend {
    /// Create a backend from endpoint configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let mut agent_config = Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .http_status_as_error(false);
        if config.allow_unverified_ssl {
            agent_config = agent_config
                .tls_config(TlsConfig::builder().disable_verification(true).build());
        }

        Self {
            agent: agent_config.build().new_agent(),
            base: config.tag_endpoint(),
            auth: format!(
                "Basic {}",
                BASE64.encode(format!("{}:{}", config.user, config.password))
            ),
        }
    }

    /// Create a backend with an explicit base URL (for testing).
    #[must_use]
    pub fn with_base(base: impl Into<String>) -> Self {
        Self {
            agent: Agent::config_builder()
                .timeout_global(Some(REQUEST_TIMEOUT))
                .http_status_as_error(false)
                .build()
                .new_agent(),
            base: base.into(),
            auth: String::new(),
        }
    }

    fn tags_url(&self) -> String {
        format!("{}/tag", self.base)
    }

    fn tag_url(&self, tag_id: &str) -> String {
        format!("{}/tag/{}", self.base, tag_id)
    }

    fn vm_url(&self, vm_id: &str) -> String {
        format!("{}/vm/{}", self.base, vm_id)
    }

    fn attachment_url(&self, tag_id: &str, vm_id: &str) -> String {
        format!("{}/tag/{}/vm/{}", self.base, tag_id, vm_id)
    }

    fn get(&self, url: &str, operation: &str) -> Result<ureq::http::Response<ureq::Body>> {
        self.agent
            .get(url)
            .header("Authorization", &self.auth)
            .header("Accept", "application/json")
            .call()
            .map_err(|e| Error::transport(operation, e))
    }

    fn delete(&self, url: &str, operation: &str) -> Result<ureq::http::Response<ureq::Body>> {
        self.agent
            .delete(url)
            .header("Authorization", &self.auth)
            .call()
            .map_err(|e| Error::transport(operation, e))
    }
}

/// Map a response status, turning 404 into the supplied not-found error
/// and any other non-2xx status into `Remote` with the body verbatim.
fn ensure_success(
    mut resp: ureq::http::Response<ureq::Body>,
    operation: &str,
    not_found: impl FnOnce() -> Option<Error>,
) -> Result<ureq::http::Response<ureq::Body>> {
    let status = resp.status().as_u16();
    if (200..300).contains(&status) {
        return Ok(resp);
    }
    if status == 404 {
        if let Some(err) = not_found() {
            return Err(err);
        }
    }
    let body = resp.body_mut().read_to_string().unwrap_or_default();
    Err(Error::Remote {
        operation: operation.to_string(),
        status,
        body,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(
    mut resp: ureq::http::Response<ureq::Body>,
    operation: &str,
) -> Result<T> {
    resp.body_mut()
        .read_json()
        .map_err(|e| Error::InvalidResponse {
            operation: operation.to_string(),
            message: e.to_string(),
        })
}

impl Backend for HttpBackend {
    fn list_tags(&self) -> Result<Vec<Tag>> {
        let operation = "list security tags";
        let resp = self.get(&self.tags_url(), operation)?;
        let resp = ensure_success(resp, operation, || None)?;
        let list: RemoteTagList = read_json(resp, operation)?;
        Ok(list.security_tags.into_iter().map(Into::into).collect())
    }

    fn get_tag(&self, tag_id: &str) -> Result<Tag> {
        let operation = format!("get {tag_id}");
        let resp = self.get(&self.tag_url(tag_id), &operation)?;
        let resp = ensure_success(resp, &operation, || Some(Error::tag_not_found(tag_id)))?;
        let tag: RemoteTag = read_json(resp, &operation)?;
        Ok(tag.into())
    }

    fn create_tag(&self, attrs: &TagAttributes) -> Result<String> {
        let operation = format!("create tag {:?}", attrs.name);
        let resp = self
            .agent
            .post(&self.tags_url())
            .header("Authorization", &self.auth)
            .send_json(TagPayload::new(None, attrs))
            .map_err(|e| Error::transport(operation.as_str(), e))?;
        let mut resp = ensure_success(resp, &operation, || None)?;

        // The endpoint answers 201 with the new id as the response body.
        resp.body_mut()
            .read_to_string()
            .map_err(|e| Error::InvalidResponse {
                operation,
                message: e.to_string(),
            })
            .map(|id| id.trim().to_string())
    }

    fn update_tag(&self, tag_id: &str, attrs: &TagAttributes) -> Result<()> {
        let operation = format!("update {tag_id}");
        let resp = self
            .agent
            .put(&self.tag_url(tag_id))
            .header("Authorization", &self.auth)
            .send_json(TagPayload::new(Some(tag_id), attrs))
            .map_err(|e| Error::transport(operation.as_str(), e))?;
        ensure_success(resp, &operation, || Some(Error::tag_not_found(tag_id)))?;
        Ok(())
    }

    fn delete_tag(&self, tag_id: &str) -> Result<()> {
        let operation = format!("delete {tag_id}");
        let resp = self.delete(&self.tag_url(tag_id), &operation)?;
        ensure_success(resp, &operation, || Some(Error::tag_not_found(tag_id)))?;
        Ok(())
    }

    fn vm_tags(&self, vm_id: &str) -> Result<Vec<Tag>> {
        let operation = format!("list tags attached to {vm_id}");
        let resp = self.get(&self.vm_url(vm_id), &operation)?;
        let resp = ensure_success(resp, &operation, || Some(Error::vm_not_found(vm_id)))?;
        let list: RemoteTagList = read_json(resp, &operation)?;
        Ok(list.security_tags.into_iter().map(Into::into).collect())
    }

    fn attach_tag(&self, tag_id: &str, vm_id: &str) -> Result<()> {
        let operation = format!("attach {tag_id} to {vm_id}");
        let resp = self
            .agent
            .put(&self.attachment_url(tag_id, vm_id))
            .header("Authorization", &self.auth)
            .send_empty()
            .map_err(|e| Error::transport(operation.as_str(), e))?;
        ensure_success(resp, &operation, || None)?;
        Ok(())
    }

    fn detach_tag(&self, tag_id: &str, vm_id: &str) -> Result<()> {
        let operation = format!("detach {tag_id} from {vm_id}");
        let resp = self.delete(&self.attachment_url(tag_id, vm_id), &operation)?;
        ensure_success(resp, &operation, || Some(Error::tag_not_found(tag_id)))?;
        Ok(())
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteTag {
    object_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    is_universal: bool,
    #[serde(default)]
    vm_count: u32,
    #[serde(default)]
    revision: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteTagList {
    #[serde(default)]
    security_tags: Vec<RemoteTag>,
}

impl From<RemoteTag> for Tag {
    fn from(t: RemoteTag) -> Self {
        Self {
            id: t.object_id,
            name: t.name,
            description: t.description,
            is_universal: t.is_universal,
            vm_count: t.vm_count,
            revision: t.revision,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TagPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    object_id: Option<&'a str>,
    object_type_name: &'static str,
    r#type: TypePayload,
    name: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_universal: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TypePayload {
    type_name: &'static str,
}

impl<'a> TagPayload<'a> {
    fn new(object_id: Option<&'a str>, attrs: &'a TagAttributes) -> Self {
        Self {
            object_id,
            object_type_name: "SecurityTag",
            r#type: TypePayload {
                type_name: "SecurityTag",
            },
            name: &attrs.name,
            description: &attrs.description,
            is_universal: attrs.is_universal,
        }
    }
}

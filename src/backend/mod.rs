//! Backend trait and implementations for the remote tag service.
//!
//! The [`Backend`] trait is the narrow seam between the reconciliation
//! logic and the NSX endpoint. Each method is exactly one network round
//! trip; no retries happen at this layer. The HTTP implementation lives in
//! [`http::HttpBackend`].
//!
//! # Testing
//!
//! Use [`MockBackend`] for testing without network access:
//!
//! ```
//! use nsxtag::backend::{Backend, MockBackend};
//! use nsxtag::Tag;
//!
//! let mock = MockBackend::new();
//! mock.add_tag(Tag {
//!     id: "securitytag-1".to_string(),
//!     name: "prod".to_string(),
//!     ..Tag::default()
//! });
//!
//! let tags = mock.list_tags().unwrap();
//! assert_eq!(tags.len(), 1);
//! ```

pub mod http;

use crate::error::{Error, Result};
use crate::types::{Tag, TagAttributes};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Remote tag service operations.
///
/// This abstraction covers exactly the calls reconciliation needs, nothing
/// more. Every error mapping tolerance (404 on delete, 404 on detach) is
/// decided by the caller; implementations report `NotFound` faithfully.
pub trait Backend: Send + Sync {
    /// Fetch all security tags, in the endpoint's listing order.
    fn list_tags(&self) -> Result<Vec<Tag>>;

    /// Fetch one tag by canonical id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the tag does not exist.
    fn get_tag(&self, tag_id: &str) -> Result<Tag>;

    /// Create a tag and return its remote-assigned id.
    fn create_tag(&self, attrs: &TagAttributes) -> Result<String>;

    /// Replace a tag's attributes (full replacement, never a patch).
    fn update_tag(&self, tag_id: &str, attrs: &TagAttributes) -> Result<()>;

    /// Delete a tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the tag is already gone; the caller
    /// decides whether that is tolerable.
    fn delete_tag(&self, tag_id: &str) -> Result<()>;

    /// Fetch the tags currently attached to a VM, in listing order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the VM is unknown to the tag service.
    fn vm_tags(&self, vm_id: &str) -> Result<Vec<Tag>>;

    /// Attach a tag to a VM.
    fn attach_tag(&self, tag_id: &str, vm_id: &str) -> Result<()>;

    /// Detach a tag from a VM.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the attachment does not exist.
    fn detach_tag(&self, tag_id: &str, vm_id: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct MockState {
    tags: Vec<Tag>,
    vms: HashMap<String, Vec<String>>,
    calls: Vec<String>,
    failures: HashMap<String, (u16, String)>,
    next_id: u32,
}

/// Mock backend for testing without network access.
///
/// Stores tags and attachments in memory, journals every call so tests can
/// assert which operations were issued, and can be told to fail specific
/// calls with a given status.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tag to the remote state, appended in listing order.
    pub fn add_tag(&self, tag: Tag) {
        let mut state = self.state.lock().unwrap();
        state.tags.push(tag);
    }

    /// Register a VM with the tag service, optionally pre-attached.
    pub fn add_vm(&self, vm_id: &str, attached: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.vms.insert(
            vm_id.to_string(),
            attached.iter().map(ToString::to_string).collect(),
        );
    }

    /// Fail a specific call with the given HTTP status and body.
    ///
    /// The key matches the journal format, e.g. `"attach securitytag-5 vm-1"`
    /// or `"delete securitytag-2"`. A 404 status produces `NotFound`, any
    /// other status produces `Remote`.
    pub fn fail_on(&self, call: &str, status: u16, body: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .failures
            .insert(call.to_string(), (status, body.to_string()));
    }

    /// All calls issued so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls issued so far whose journal entry starts with `prefix`.
    #[must_use]
    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    /// Current remote tag by id, if present.
    #[must_use]
    pub fn tag(&self, tag_id: &str) -> Option<Tag> {
        let state = self.state.lock().unwrap();
        state.tags.iter().find(|t| t.id == tag_id).cloned()
    }

    /// Tag ids currently attached to a VM.
    #[must_use]
    pub fn attached(&self, vm_id: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.vms.get(vm_id).cloned().unwrap_or_default()
    }

    /// Journal a call and return the injected failure for it, if any.
    fn record(&self, call: String) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.clone());
        let failure = state.failures.get(&call).cloned();
        match failure {
            Some((404, _)) => Err(Error::NotFound {
                kind: "security tag",
                id: call,
            }),
            Some((status, body)) => Err(Error::Remote {
                operation: call,
                status,
                body,
            }),
            None => Ok(()),
        }
    }
}

impl Backend for MockBackend {
    fn list_tags(&self) -> Result<Vec<Tag>> {
        self.record("list".to_string())?;
        Ok(self.state.lock().unwrap().tags.clone())
    }

    fn get_tag(&self, tag_id: &str) -> Result<Tag> {
        self.record(format!("get {tag_id}"))?;
        self.tag(tag_id).ok_or_else(|| Error::tag_not_found(tag_id))
    }

    fn create_tag(&self, attrs: &TagAttributes) -> Result<String> {
        self.record(format!("create {}", attrs.name))?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("securitytag-{}", state.next_id);
        state.tags.push(Tag {
            id: id.clone(),
            name: attrs.name.clone(),
            description: attrs.description.clone(),
            is_universal: attrs.is_universal.unwrap_or(false),
            vm_count: 0,
            revision: 0,
        });
        Ok(id)
    }

    fn update_tag(&self, tag_id: &str, attrs: &TagAttributes) -> Result<()> {
        self.record(format!("update {tag_id}"))?;
        let mut state = self.state.lock().unwrap();
        let tag = state
            .tags
            .iter_mut()
            .find(|t| t.id == tag_id)
            .ok_or_else(|| Error::tag_not_found(tag_id))?;
        tag.name = attrs.name.clone();
        tag.description = attrs.description.clone();
        if let Some(universal) = attrs.is_universal {
            tag.is_universal = universal;
        }
        tag.revision += 1;
        Ok(())
    }

    fn delete_tag(&self, tag_id: &str) -> Result<()> {
        self.record(format!("delete {tag_id}"))?;
        let mut state = self.state.lock().unwrap();
        let before = state.tags.len();
        state.tags.retain(|t| t.id != tag_id);
        if state.tags.len() == before {
            return Err(Error::tag_not_found(tag_id));
        }
        Ok(())
    }

    fn vm_tags(&self, vm_id: &str) -> Result<Vec<Tag>> {
        self.record(format!("vm-tags {vm_id}"))?;
        let state = self.state.lock().unwrap();
        let attached = state
            .vms
            .get(vm_id)
            .ok_or_else(|| Error::vm_not_found(vm_id))?;
        Ok(attached
            .iter()
            .map(|id| {
                state
                    .tags
                    .iter()
                    .find(|t| &t.id == id)
                    .cloned()
                    .unwrap_or_else(|| Tag {
                        id: id.clone(),
                        ..Tag::default()
                    })
            })
            .collect())
    }

    fn attach_tag(&self, tag_id: &str, vm_id: &str) -> Result<()> {
        self.record(format!("attach {tag_id} {vm_id}"))?;
        let mut state = self.state.lock().unwrap();
        let attached = state
            .vms
            .get_mut(vm_id)
            .ok_or_else(|| Error::vm_not_found(vm_id))?;
        if !attached.contains(&tag_id.to_string()) {
            attached.push(tag_id.to_string());
        }
        Ok(())
    }

    fn detach_tag(&self, tag_id: &str, vm_id: &str) -> Result<()> {
        self.record(format!("detach {tag_id} {vm_id}"))?;
        let mut state = self.state.lock().unwrap();
        let attached = state
            .vms
            .get_mut(vm_id)
            .ok_or_else(|| Error::vm_not_found(vm_id))?;
        let before = attached.len();
        attached.retain(|id| id != tag_id);
        if attached.len() == before {
            return Err(Error::tag_not_found(tag_id));
        }
        Ok(())
    }
}

//! Core types for security tags and VM attachments.

use serde::{Deserialize, Serialize};

/// A security tag as observed on the NSX endpoint.
///
/// `id` is remote-assigned and stable once created; everything else is
/// mutable remotely. `vm_count` is advisory and only consulted by the
/// safe-destroy policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Remote-assigned identifier (e.g. "securitytag-12").
    pub id: String,
    /// Display name, treated as a lookup key although the endpoint does not
    /// enforce uniqueness.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Whether the tag is universal (NSX 6.3 and higher).
    pub is_universal: bool,
    /// Number of VMs currently attached.
    pub vm_count: u32,
    /// Remote revision counter.
    pub revision: u64,
}

/// Attributes sent to the endpoint when creating or updating a tag.
///
/// Always the full attribute set, never a partial patch. `is_universal` is
/// `None` below NSX 6.3, in which case the field is left off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAttributes {
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Universal flag, omitted on endpoints that predate it.
    pub is_universal: Option<bool>,
}

/// Desired state for one security-tag resource.
///
/// Exactly one of `tag_id` / `tag_name` must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagSpec {
    /// Bind to an existing tag by id; never creates.
    pub tag_id: Option<String>,
    /// Bind to a tag by exact, case-sensitive name.
    pub tag_name: Option<String>,
    /// Desired description.
    pub description: String,
    /// Create the tag as universal (NSX 6.3 and higher).
    pub is_universal: bool,
    /// Create the tag when the name lookup misses.
    pub create_if_missing: bool,
    /// Never delete the tag during destroy.
    pub persistent: bool,
    /// Refuse to delete the tag while VMs are still attached.
    pub safe_destroy: bool,
}

impl TagSpec {
    /// Desired state bound to an existing tag id.
    pub fn by_id(tag_id: impl Into<String>) -> Self {
        Self {
            tag_id: Some(tag_id.into()),
            ..Self::default()
        }
    }

    /// Desired state bound to a tag name.
    pub fn by_name(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: Some(tag_name.into()),
            ..Self::default()
        }
    }

    /// Set the desired description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Create the tag when the name lookup misses.
    #[must_use]
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Mark the tag persistent (destroy becomes a no-op).
    #[must_use]
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Toggle the safe-destroy policy.
    #[must_use]
    pub fn safe_destroy(mut self, safe: bool) -> Self {
        self.safe_destroy = safe;
        self
    }

    /// Request a universal tag.
    #[must_use]
    pub fn universal(mut self, universal: bool) -> Self {
        self.is_universal = universal;
        self
    }
}

impl Default for TagSpec {
    fn default() -> Self {
        Self {
            tag_id: None,
            tag_name: None,
            description: String::new(),
            is_universal: false,
            create_if_missing: false,
            persistent: false,
            safe_destroy: true,
        }
    }
}

/// Observed attachment state for one VM.
///
/// The VM itself is never created or destroyed by this library, only its
/// attachment set is mutated. The ids reflect what the endpoint reports
/// after reconciliation, not merely the desired list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmState {
    /// Managed object id or instance UUID, externally supplied.
    pub vm_id: String,
    /// Canonical ids of the tags currently attached.
    pub attached_tag_ids: Vec<String>,
}

/// Attachment summary for a VM, ids and names side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmSummary {
    /// Managed object id or instance UUID.
    pub vm_id: String,
    /// Canonical ids of the attached tags, in listing order.
    pub tag_ids: Vec<String>,
    /// Display names of the attached tags, same order as `tag_ids`.
    pub tag_names: Vec<String>,
}

/// Result of a tag update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Name and description already matched; no request was issued.
    NoChange,
    /// The full attribute set was pushed to the endpoint.
    Updated,
}

/// Result of a tag destroy.
///
/// The skip variants are deliberate no-ops, not failures: the tag remains
/// remotely present and the operation still counts as satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyOutcome {
    /// The tag was deleted remotely.
    Deleted,
    /// The endpoint no longer knows the tag; nothing to do.
    AlreadyGone,
    /// The tag is marked persistent and was left in place.
    SkippedPersistent,
    /// Safe destroy vetoed the delete because VMs are still attached.
    SkippedAttached {
        /// Attachment count reported by the endpoint.
        vm_count: u32,
    },
}

impl DestroyOutcome {
    /// Whether the tag is gone from the endpoint after this outcome.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        matches!(self, Self::Deleted | Self::AlreadyGone)
    }
}

//! # nsxtag
//!
//! Declarative management of NSX security tags and their attachment to
//! virtual machines.
//!
//! Given desired state (a named tag with attributes, or a VM with a list
//! of tag references) the library reconciles the remote endpoint to match
//! and reports the observed state back:
//!
//! - resolves tag references given as either canonical ids
//!   (`securitytag-<digits>`) or display names,
//! - diffs desired against currently-attached tag sets and issues the
//!   minimal attach/detach operations,
//! - decides create-vs-reuse-vs-error semantics for tags,
//! - refuses to destroy tags that still have dependent VMs when asked to.
//!
//! ## Example
//!
//! ```no_run
//! use nsxtag::{Client, Config, TagSpec};
//!
//! let config = Config::new("nsx.example.com", "admin", "secret");
//! let client = Client::new(config).expect("unsupported endpoint");
//!
//! // Bind (or create) a tag.
//! let spec = TagSpec::by_name("prod")
//!     .description("production workloads")
//!     .create_if_missing(true);
//! let tag = client.create_tag(&spec).unwrap();
//!
//! // Converge a VM's attachments to the desired references.
//! let state = client
//!     .update_vm("vm-42", &["prod".to_string(), "securitytag-7".to_string()])
//!     .unwrap();
//! println!("{} now carries {:?}", state.vm_id, state.attached_tag_ids);
//! ```
//!
//! Reconciliation is synchronous and takes no locks: every pass re-fetches
//! remote state, mutates, and re-reads, so concurrent passes for different
//! entities need no coordination and an aborted pass self-heals on retry.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod config;
pub mod error;
pub mod query;
pub mod resolve;
pub mod tag;
pub mod vm;

mod types;

pub use config::{ApiVersion, Config, MIN_VERSION, UNIVERSAL_MIN_VERSION};
pub use error::{Error, ErrorCategory, Result};
pub use resolve::TagRef;
pub use types::{
    DestroyOutcome, Tag, TagAttributes, TagSpec, UpdateOutcome, VmState, VmSummary,
};

use backend::Backend;
pub use backend::MockBackend;
use backend::http::HttpBackend;
use tag::TagLifecycle;
use vm::VmReconciler;

/// High-level client for tag and attachment reconciliation.
///
/// Owns the backend and the endpoint version; all dependencies come in
/// through the constructor, never from ambient state.
pub struct Client {
    backend: Box<dyn Backend>,
    version: ApiVersion,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client for an NSX manager.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedVersion`] when the configured endpoint
    /// version is below 6.2; reconciling against older endpoints is refused
    /// outright.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            version: config.version,
            backend: Box::new(HttpBackend::new(&config)),
        })
    }

    /// Create a client over a custom backend (useful for testing).
    #[must_use]
    pub fn with_backend(backend: Box<dyn Backend>, version: ApiVersion) -> Self {
        Self { backend, version }
    }

    // =========================================================================
    // Tag lifecycle
    // =========================================================================

    /// Bind the desired tag state to a remote tag, creating one if allowed.
    pub fn create_tag(&self, spec: &TagSpec) -> Result<Tag> {
        self.lifecycle().create(spec)
    }

    /// Re-fetch a tag by its bound id.
    pub fn read_tag(&self, tag_id: &str) -> Result<Tag> {
        self.lifecycle().read(tag_id)
    }

    /// Push changed attributes for a bound tag; a no-op when nothing differs.
    pub fn update_tag(&self, tag_id: &str, spec: &TagSpec, last: &Tag) -> Result<UpdateOutcome> {
        self.lifecycle().update(tag_id, spec, last)
    }

    /// Destroy a bound tag, honoring the persistent and safe-destroy policies.
    pub fn destroy_tag(&self, tag_id: &str, spec: &TagSpec) -> Result<DestroyOutcome> {
        self.lifecycle().destroy(tag_id, spec)
    }

    // =========================================================================
    // VM attachments
    // =========================================================================

    /// Attach the desired tag references to an existing VM.
    pub fn create_vm(&self, vm_id: &str, references: &[String]) -> Result<VmState> {
        self.reconciler().create(vm_id, references)
    }

    /// Re-fetch the attachment list for a VM.
    pub fn read_vm(&self, vm_id: &str) -> Result<VmState> {
        self.reconciler().read(vm_id)
    }

    /// Converge a VM's attachment set to the desired references.
    pub fn update_vm(&self, vm_id: &str, references: &[String]) -> Result<VmState> {
        self.reconciler().update(vm_id, references)
    }

    /// Detach every tag from a VM (the VM itself is left alone).
    pub fn delete_vm(&self, vm_id: &str) -> Result<()> {
        self.reconciler().delete(vm_id)
    }

    // =========================================================================
    // Read-only lookups
    // =========================================================================

    /// Find a tag whose name matches a regular expression.
    pub fn find_tag(&self, name_regex: &str) -> Result<Tag> {
        query::find_tag(self.backend.as_ref(), name_regex)
    }

    /// Summarize a VM's attachments, ids and names side by side.
    pub fn vm_summary(&self, vm_id: &str) -> Result<VmSummary> {
        query::vm_summary(self.backend.as_ref(), vm_id)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn lifecycle(&self) -> TagLifecycle<'_> {
        TagLifecycle::new(self.backend.as_ref(), self.version)
    }

    fn reconciler(&self) -> VmReconciler<'_> {
        VmReconciler::new(self.backend.as_ref())
    }
}

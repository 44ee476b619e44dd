//! VM attachment reconciliation.
//!
//! Converges the set of tags attached to a VM toward a desired list of tag
//! references. The VM itself is managed elsewhere; only the attachment set
//! is mutated here. Observed and desired state never share a cache: every
//! pass re-fetches the attachment list and the tag snapshot, so a run that
//! aborts mid-way self-heals on the next invocation.

use crate::backend::Backend;
use crate::error::Result;
use crate::resolve;
use crate::types::VmState;

/// Attach/detach operations needed to converge one VM.
///
/// `to_detach` keeps current listing order, `to_attach` keeps desired
/// order. The two sets are disjoint by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentDiff {
    /// Ids to attach, in desired order.
    pub to_attach: Vec<String>,
    /// Ids to detach, in current listing order.
    pub to_detach: Vec<String>,
}

impl AttachmentDiff {
    /// Whether the VM is already converged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_attach.is_empty() && self.to_detach.is_empty()
    }
}

/// Compute the set difference between desired and current attachment sets.
///
/// Attachment has no inherent ordering, so this is pure set algebra over
/// canonical ids: `to_attach = desired − current`, `to_detach = current −
/// desired`. Duplicates within `desired` collapse to one operation.
#[must_use]
pub fn diff(desired: &[String], current: &[String]) -> AttachmentDiff {
    let mut to_attach: Vec<String> = Vec::new();
    for id in desired {
        if !current.contains(id) && !to_attach.contains(id) {
            to_attach.push(id.clone());
        }
    }

    let to_detach = current
        .iter()
        .filter(|id| !desired.contains(id))
        .cloned()
        .collect();

    AttachmentDiff {
        to_attach,
        to_detach,
    }
}

/// Reconciles one VM's attached-tag set against desired references.
pub struct VmReconciler<'a> {
    backend: &'a dyn Backend,
}

impl<'a> VmReconciler<'a> {
    /// Create a reconciler over a backend.
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Resolve every desired reference against a fresh tag snapshot.
    ///
    /// Any single resolution failure fails the whole operation before the
    /// first mutation; partial attachment is never committed.
    fn resolve_all(&self, references: &[String]) -> Result<Vec<String>> {
        let snapshot = self.backend.list_tags()?;
        references
            .iter()
            .map(|reference| resolve::resolve(reference, &snapshot))
            .collect()
    }

    /// The attachment list as the endpoint reports it right now.
    fn observed(&self, vm_id: &str) -> Result<VmState> {
        let attached_tag_ids = self
            .backend
            .vm_tags(vm_id)?
            .into_iter()
            .map(|tag| tag.id)
            .collect();
        Ok(VmState {
            vm_id: vm_id.to_string(),
            attached_tag_ids,
        })
    }

    /// Attach the desired tag set to an existing VM.
    ///
    /// The returned state is what the endpoint reports after attaching, not
    /// merely the desired list.
    pub fn create(&self, vm_id: &str, references: &[String]) -> Result<VmState> {
        let resolved = self.resolve_all(references)?;
        for tag_id in &resolved {
            self.backend.attach_tag(tag_id, vm_id)?;
        }
        self.observed(vm_id)
    }

    /// Re-fetch the attachment list for a VM.
    ///
    /// A `NotFound` surfaces to the caller, which is expected to clear its
    /// binding.
    pub fn read(&self, vm_id: &str) -> Result<VmState> {
        self.observed(vm_id)
    }

    /// Converge the VM's attachment set to the desired references.
    ///
    /// Detaches run before attaches. The first failing operation aborts the
    /// pass, leaving the VM possibly partially converged; the next pass
    /// re-derives the true diff from fresh state. A 404 on an individual
    /// detach means the attachment is already gone and is tolerated.
    pub fn update(&self, vm_id: &str, references: &[String]) -> Result<VmState> {
        let current = self.observed(vm_id)?;
        let desired = self.resolve_all(references)?;
        let plan = diff(&desired, &current.attached_tag_ids);

        if plan.is_empty() {
            log::debug!("{vm_id} already converged, no attach/detach needed");
            return Ok(current);
        }

        for tag_id in &plan.to_detach {
            match self.backend.detach_tag(tag_id, vm_id) {
                Ok(()) => log::debug!("detached {tag_id} from {vm_id}"),
                Err(err) if err.is_not_found() => {
                    log::debug!("{tag_id} already detached from {vm_id}");
                }
                Err(err) => return Err(err),
            }
        }
        for tag_id in &plan.to_attach {
            self.backend.attach_tag(tag_id, vm_id)?;
            log::debug!("attached {tag_id} to {vm_id}");
        }

        self.observed(vm_id)
    }

    /// Detach every tag currently attached to the VM.
    ///
    /// The VM is not removed; "delete" for this resource means full
    /// detachment. A 404 on an individual detach is already-satisfied; any
    /// other failure aborts with the remaining tags still attached.
    pub fn delete(&self, vm_id: &str) -> Result<()> {
        let current = match self.observed(vm_id) {
            Ok(state) => state,
            Err(err) if err.is_not_found() => {
                log::info!("{vm_id} unknown to the tag service, nothing to detach");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        for tag_id in &current.attached_tag_ids {
            match self.backend.detach_tag(tag_id, vm_id) {
                Ok(()) => log::debug!("detached {tag_id} from {vm_id}"),
                Err(err) if err.is_not_found() => {
                    log::debug!("{tag_id} already detached from {vm_id}");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

//! Read-only lookups for desired-state interpolation.
//!
//! These back the data-source side of the resource model: find a tag by a
//! name pattern, or summarize what is attached to a VM, without mutating
//! anything.

use crate::backend::Backend;
use crate::error::Result;
use crate::resolve;
use crate::types::{Tag, VmSummary};

/// Find a tag whose name matches a regular expression.
///
/// The snapshot is fetched fresh; the first match in listing order wins.
pub fn find_tag(backend: &dyn Backend, name_regex: &str) -> Result<Tag> {
    let snapshot = backend.list_tags()?;
    resolve::find_by_name_regex(name_regex, &snapshot).cloned()
}

/// Summarize a VM's attachments, ids and names side by side.
pub fn vm_summary(backend: &dyn Backend, vm_id: &str) -> Result<VmSummary> {
    let attached = backend.vm_tags(vm_id)?;
    let mut tag_ids = Vec::with_capacity(attached.len());
    let mut tag_names = Vec::with_capacity(attached.len());
    for tag in attached {
        tag_ids.push(tag.id);
        tag_names.push(tag.name);
    }
    Ok(VmSummary {
        vm_id: vm_id.to_string(),
        tag_ids,
        tag_names,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    fn tag(id: &str, name: &str) -> Tag {
        Tag {
            id: id.to_string(),
            name: name.to_string(),
            ..Tag::default()
        }
    }

    #[test]
    fn test_find_tag_first_match_wins() {
        let mock = MockBackend::new();
        mock.add_tag(tag("securitytag-1", "web-frontend"));
        mock.add_tag(tag("securitytag-2", "web-backend"));

        let found = find_tag(&mock, "^web-").unwrap();
        assert_eq!(found.id, "securitytag-1");

        assert!(find_tag(&mock, "^db-").is_err());
    }

    #[test]
    fn test_vm_summary_pairs_ids_and_names() {
        let mock = MockBackend::new();
        mock.add_tag(tag("securitytag-1", "web"));
        mock.add_tag(tag("securitytag-2", "db"));
        mock.add_vm("vm-1", &["securitytag-2", "securitytag-1"]);

        let summary = vm_summary(&mock, "vm-1").unwrap();
        assert_eq!(summary.vm_id, "vm-1");
        assert_eq!(summary.tag_ids, vec!["securitytag-2", "securitytag-1"]);
        assert_eq!(summary.tag_names, vec!["db", "web"]);
    }

    #[test]
    fn test_vm_summary_unknown_vm() {
        let mock = MockBackend::new();
        assert!(vm_summary(&mock, "vm-1").unwrap_err().is_not_found());
    }
}

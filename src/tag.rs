//! Security-tag lifecycle: create-or-bind, read, update, destroy.
//!
//! Create decides between binding to an existing tag and creating a new
//! one; destroy applies the persistent and safe-destroy policies. Every
//! pass works from freshly fetched remote state, so a partially failed
//! run converges on the next invocation.

use crate::backend::Backend;
use crate::config::ApiVersion;
use crate::error::{Error, Result};
use crate::types::{DestroyOutcome, Tag, TagAttributes, TagSpec, UpdateOutcome};

/// Lifecycle operations for one security-tag resource.
pub struct TagLifecycle<'a> {
    backend: &'a dyn Backend,
    version: ApiVersion,
}

impl<'a> TagLifecycle<'a> {
    /// Create a lifecycle manager over a backend.
    pub fn new(backend: &'a dyn Backend, version: ApiVersion) -> Self {
        Self { backend, version }
    }

    /// The full attribute set for a create or update request.
    ///
    /// `is_universal` is only put on the wire for endpoints that understand
    /// it (NSX 6.3 and higher).
    fn attributes(&self, name: &str, spec: &TagSpec) -> TagAttributes {
        TagAttributes {
            name: name.to_string(),
            description: spec.description.clone(),
            is_universal: self
                .version
                .supports_universal()
                .then_some(spec.is_universal),
        }
    }

    /// Bind the resource to a remote tag, creating one when allowed.
    ///
    /// With `tag_id` this is a pure lookup: the tag must already exist.
    /// With `tag_name`, an exact-name hit binds to the existing tag and its
    /// remote attributes win; a miss creates the tag only when
    /// `create_if_missing` is set, and otherwise fails with
    /// [`Error::UnresolvedReference`] without issuing any create call.
    pub fn create(&self, spec: &TagSpec) -> Result<Tag> {
        match (&spec.tag_id, &spec.tag_name) {
            (Some(_), Some(_)) => Err(Error::Configuration(
                "only one of tag_id and tag_name may be set".to_string(),
            )),
            (None, None) => Err(Error::Configuration(
                "either tag_id or tag_name must be set".to_string(),
            )),
            (Some(tag_id), None) => self.backend.get_tag(tag_id),
            (None, Some(tag_name)) => {
                let snapshot = self.backend.list_tags()?;
                if let Some(existing) = snapshot.into_iter().find(|t| t.name == *tag_name) {
                    log::debug!("bound to existing tag {} for {:?}", existing.id, tag_name);
                    return Ok(existing);
                }
                if !spec.create_if_missing {
                    log::debug!("tag {tag_name:?} not found and create_if_missing is false");
                    return Err(Error::UnresolvedReference(tag_name.clone()));
                }

                let attrs = self.attributes(tag_name, spec);
                let id = self.backend.create_tag(&attrs)?;
                log::debug!("created tag {id} for {tag_name:?}");
                Ok(Tag {
                    id,
                    name: attrs.name,
                    description: attrs.description,
                    is_universal: attrs.is_universal.unwrap_or(false),
                    vm_count: 0,
                    revision: 0,
                })
            }
        }
    }

    /// Re-fetch the bound tag.
    ///
    /// A `NotFound` surfaces to the caller, which is expected to clear its
    /// binding and treat the resource as needing recreation.
    pub fn read(&self, tag_id: &str) -> Result<Tag> {
        self.backend.get_tag(tag_id)
    }

    /// Push the desired attributes when they differ from the last observed
    /// state.
    ///
    /// A no-op update never touches the remote object. When an update is
    /// issued the body carries the complete attribute set.
    pub fn update(&self, tag_id: &str, spec: &TagSpec, last: &Tag) -> Result<UpdateOutcome> {
        let name = spec.tag_name.as_deref().unwrap_or(&last.name);
        if name == last.name && spec.description == last.description {
            return Ok(UpdateOutcome::NoChange);
        }

        self.backend.update_tag(tag_id, &self.attributes(name, spec))?;
        Ok(UpdateOutcome::Updated)
    }

    /// Destroy the bound tag, honoring the persistent and safe-destroy
    /// policies.
    ///
    /// A persistent tag is never deleted. With `safe_destroy`, a nonzero
    /// attachment count vetoes the delete without error. A 404 on the
    /// delete itself means the tag is already gone and counts as satisfied.
    pub fn destroy(&self, tag_id: &str, spec: &TagSpec) -> Result<DestroyOutcome> {
        if spec.persistent {
            log::info!("{tag_id} is persistent and will not be destroyed");
            return Ok(DestroyOutcome::SkippedPersistent);
        }

        if spec.safe_destroy {
            match self.backend.get_tag(tag_id) {
                Ok(tag) if tag.vm_count > 0 => {
                    log::warn!(
                        "cannot safely destroy {tag_id}, {} vms are still attached",
                        tag.vm_count
                    );
                    return Ok(DestroyOutcome::SkippedAttached {
                        vm_count: tag.vm_count,
                    });
                }
                Ok(_) => {}
                Err(err) if err.is_not_found() => {
                    log::info!("{tag_id} not found during destroy, considering it destroyed");
                    return Ok(DestroyOutcome::AlreadyGone);
                }
                Err(err) => return Err(err),
            }
        }

        match self.backend.delete_tag(tag_id) {
            Ok(()) => Ok(DestroyOutcome::Deleted),
            Err(err) if err.is_not_found() => {
                log::info!("{tag_id} not found during destroy, considering it destroyed");
                Ok(DestroyOutcome::AlreadyGone)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::config::UNIVERSAL_MIN_VERSION;

    const V62: ApiVersion = ApiVersion { major: 6, minor: 2 };

    fn remote_tag(id: &str, name: &str, description: &str) -> Tag {
        Tag {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            ..Tag::default()
        }
    }

    #[test]
    fn test_create_by_id_is_pure_lookup() {
        let mock = MockBackend::new();
        mock.add_tag(remote_tag("securitytag-4", "prod", "existing"));

        let lifecycle = TagLifecycle::new(&mock, UNIVERSAL_MIN_VERSION);
        let tag = lifecycle.create(&TagSpec::by_id("securitytag-4")).unwrap();
        assert_eq!(tag.id, "securitytag-4");
        assert!(mock.calls_matching("create").is_empty());
    }

    #[test]
    fn test_create_by_id_never_creates_on_miss() {
        let mock = MockBackend::new();
        let lifecycle = TagLifecycle::new(&mock, UNIVERSAL_MIN_VERSION);

        let spec = TagSpec::by_id("securitytag-4").create_if_missing(true);
        let err = lifecycle.create(&spec).unwrap_err();
        assert!(err.is_not_found());
        assert!(mock.calls_matching("create").is_empty());
    }

    #[test]
    fn test_create_by_name_binds_without_overwriting_remote_attributes() {
        let mock = MockBackend::new();
        mock.add_tag(remote_tag("securitytag-2", "prod", "remote description"));

        let lifecycle = TagLifecycle::new(&mock, UNIVERSAL_MIN_VERSION);
        let spec = TagSpec::by_name("prod").description("desired description");
        let tag = lifecycle.create(&spec).unwrap();

        assert_eq!(tag.id, "securitytag-2");
        assert_eq!(tag.description, "remote description");
        assert!(mock.calls_matching("create").is_empty());
        assert!(mock.calls_matching("update").is_empty());
    }

    #[test]
    fn test_create_by_name_miss_with_creation_disabled() {
        let mock = MockBackend::new();
        let lifecycle = TagLifecycle::new(&mock, UNIVERSAL_MIN_VERSION);

        let err = lifecycle.create(&TagSpec::by_name("prod")).unwrap_err();
        match err {
            Error::UnresolvedReference(name) => assert_eq!(name, "prod"),
            other => panic!("expected UnresolvedReference, got {other:?}"),
        }
        assert!(mock.calls_matching("create").is_empty());
    }

    #[test]
    fn test_create_by_name_miss_with_creation_enabled() {
        let mock = MockBackend::new();
        let lifecycle = TagLifecycle::new(&mock, UNIVERSAL_MIN_VERSION);

        let spec = TagSpec::by_name("prod")
            .description("production")
            .universal(true)
            .create_if_missing(true);
        let tag = lifecycle.create(&spec).unwrap();

        assert_eq!(tag.id, "securitytag-1");
        assert_eq!(tag.name, "prod");
        assert_eq!(tag.description, "production");
        assert!(tag.is_universal);
        assert_eq!(mock.calls_matching("create").len(), 1);
    }

    #[test]
    fn test_create_drops_universal_below_63() {
        let mock = MockBackend::new();
        let lifecycle = TagLifecycle::new(&mock, V62);

        let spec = TagSpec::by_name("prod").universal(true).create_if_missing(true);
        let tag = lifecycle.create(&spec).unwrap();

        // The flag never went on the wire, so the remote tag is not universal.
        assert!(!tag.is_universal);
        assert!(!mock.tag(&tag.id).unwrap().is_universal);
    }

    #[test]
    fn test_create_requires_exactly_one_reference() {
        let mock = MockBackend::new();
        let lifecycle = TagLifecycle::new(&mock, UNIVERSAL_MIN_VERSION);

        let neither = lifecycle.create(&TagSpec::default()).unwrap_err();
        assert!(matches!(neither, Error::Configuration(_)));

        let mut both = TagSpec::by_id("securitytag-1");
        both.tag_name = Some("prod".to_string());
        let err = lifecycle.create(&both).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_read_surfaces_not_found() {
        let mock = MockBackend::new();
        let lifecycle = TagLifecycle::new(&mock, UNIVERSAL_MIN_VERSION);
        assert!(lifecycle.read("securitytag-1").unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_is_idempotent() {
        let mock = MockBackend::new();
        mock.add_tag(remote_tag("securitytag-1", "prod", "same"));
        let last = mock.tag("securitytag-1").unwrap();

        let lifecycle = TagLifecycle::new(&mock, UNIVERSAL_MIN_VERSION);
        let spec = TagSpec::by_name("prod").description("same");
        let outcome = lifecycle.update("securitytag-1", &spec, &last).unwrap();

        assert_eq!(outcome, UpdateOutcome::NoChange);
        assert!(mock.calls_matching("update").is_empty());
    }

    #[test]
    fn test_update_pushes_full_attribute_set() {
        let mock = MockBackend::new();
        mock.add_tag(remote_tag("securitytag-1", "prod", "old"));
        let last = mock.tag("securitytag-1").unwrap();

        let lifecycle = TagLifecycle::new(&mock, UNIVERSAL_MIN_VERSION);
        let spec = TagSpec::by_name("prod-renamed").description("new");
        let outcome = lifecycle.update("securitytag-1", &spec, &last).unwrap();

        assert_eq!(outcome, UpdateOutcome::Updated);
        let remote = mock.tag("securitytag-1").unwrap();
        assert_eq!(remote.name, "prod-renamed");
        assert_eq!(remote.description, "new");
    }

    #[test]
    fn test_safe_destroy_vetoes_delete_while_vms_attached() {
        let mock = MockBackend::new();
        mock.add_tag(Tag {
            vm_count: 3,
            ..remote_tag("securitytag-1", "prod", "")
        });

        let lifecycle = TagLifecycle::new(&mock, UNIVERSAL_MIN_VERSION);
        let outcome = lifecycle
            .destroy("securitytag-1", &TagSpec::by_name("prod"))
            .unwrap();

        assert_eq!(outcome, DestroyOutcome::SkippedAttached { vm_count: 3 });
        assert!(mock.calls_matching("delete").is_empty());
        assert!(mock.tag("securitytag-1").is_some());
    }

    #[test]
    fn test_unsafe_destroy_deletes_despite_attachments() {
        let mock = MockBackend::new();
        mock.add_tag(Tag {
            vm_count: 3,
            ..remote_tag("securitytag-1", "prod", "")
        });

        let lifecycle = TagLifecycle::new(&mock, UNIVERSAL_MIN_VERSION);
        let spec = TagSpec::by_name("prod").safe_destroy(false);
        let outcome = lifecycle.destroy("securitytag-1", &spec).unwrap();

        assert_eq!(outcome, DestroyOutcome::Deleted);
        assert!(mock.tag("securitytag-1").is_none());
    }

    #[test]
    fn test_persistent_tag_is_never_deleted() {
        let mock = MockBackend::new();
        mock.add_tag(remote_tag("securitytag-1", "prod", ""));

        let lifecycle = TagLifecycle::new(&mock, UNIVERSAL_MIN_VERSION);
        let spec = TagSpec::by_name("prod").persistent(true).safe_destroy(false);
        let outcome = lifecycle.destroy("securitytag-1", &spec).unwrap();

        assert_eq!(outcome, DestroyOutcome::SkippedPersistent);
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_destroy_tolerates_missing_tag() {
        let mock = MockBackend::new();
        let lifecycle = TagLifecycle::new(&mock, UNIVERSAL_MIN_VERSION);

        let spec = TagSpec::by_name("prod").safe_destroy(false);
        let outcome = lifecycle.destroy("securitytag-1", &spec).unwrap();
        assert_eq!(outcome, DestroyOutcome::AlreadyGone);

        // Same tolerance when the safe-destroy pre-check sees the 404.
        let outcome = lifecycle
            .destroy("securitytag-1", &TagSpec::by_name("prod"))
            .unwrap();
        assert_eq!(outcome, DestroyOutcome::AlreadyGone);
    }

    #[test]
    fn test_destroy_surfaces_remote_rejection() {
        let mock = MockBackend::new();
        mock.add_tag(remote_tag("securitytag-1", "prod", ""));
        mock.fail_on("delete securitytag-1", 500, "boom");

        let lifecycle = TagLifecycle::new(&mock, UNIVERSAL_MIN_VERSION);
        let spec = TagSpec::by_name("prod").safe_destroy(false);
        let err = lifecycle.destroy("securitytag-1", &spec).unwrap_err();
        assert!(matches!(err, Error::Remote { status: 500, .. }));
    }
}

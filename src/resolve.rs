//! Tag reference resolution.
//!
//! Desired state refers to tags either by canonical id ("securitytag-12")
//! or by display name. Resolution is a pure function of the reference
//! string and a listing snapshot; it never touches the network.

use crate::error::{Error, Result};
use crate::types::Tag;
use regex::Regex;
use std::sync::LazyLock;

static TAG_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^securitytag-\d+$").expect("pattern is valid"));

/// A tag reference from desired state: either a canonical id or a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagRef {
    /// A well-formed canonical identifier.
    Id(String),
    /// A display name to look up in a listing snapshot.
    Name(String),
}

impl TagRef {
    /// Classify a reference string.
    ///
    /// Anything matching `securitytag-<digits>` is an id; everything else
    /// is treated as a name.
    pub fn parse(reference: &str) -> Self {
        if is_tag_id(reference) {
            Self::Id(reference.to_string())
        } else {
            Self::Name(reference.to_string())
        }
    }

    /// The original reference string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Id(s) | Self::Name(s) => s,
        }
    }
}

/// Whether a string is a well-formed canonical tag id.
#[must_use]
pub fn is_tag_id(value: &str) -> bool {
    TAG_ID_PATTERN.is_match(value)
}

/// Resolve a reference to a canonical tag id against a listing snapshot.
///
/// Id references pass through unresolved; their existence is verified by
/// the subsequent remote call, not here. Name references scan the snapshot
/// for an exact, case-sensitive match; when duplicate names exist the first
/// tag in listing order wins (the endpoint does not enforce uniqueness).
///
/// # Errors
///
/// Returns [`Error::UnresolvedReference`] carrying the original reference
/// string when a name matches nothing in the snapshot.
pub fn resolve(reference: &str, snapshot: &[Tag]) -> Result<String> {
    match TagRef::parse(reference) {
        TagRef::Id(id) => Ok(id),
        TagRef::Name(name) => snapshot
            .iter()
            .find(|tag| tag.name == name)
            .map(|tag| tag.id.clone())
            .ok_or(Error::UnresolvedReference(name)),
    }
}

/// Find a tag whose name matches a regular expression, first match in
/// listing order.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for an invalid pattern and
/// [`Error::UnresolvedReference`] when nothing matches.
pub fn find_by_name_regex<'a>(pattern: &str, snapshot: &'a [Tag]) -> Result<&'a Tag> {
    let regex = Regex::new(pattern)
        .map_err(|e| Error::Configuration(format!("invalid name regex {pattern:?}: {e}")))?;

    snapshot
        .iter()
        .find(|tag| regex.is_match(&tag.name))
        .ok_or_else(|| Error::UnresolvedReference(pattern.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(id: &str, name: &str) -> Tag {
        Tag {
            id: id.to_string(),
            name: name.to_string(),
            ..Tag::default()
        }
    }

    #[test]
    fn test_is_tag_id() {
        assert!(is_tag_id("securitytag-1"));
        assert!(is_tag_id("securitytag-1234"));
        assert!(!is_tag_id("securitytag-"));
        assert!(!is_tag_id("securitytag-1a"));
        assert!(!is_tag_id("tag-1"));
        assert!(!is_tag_id("prod"));
        assert!(!is_tag_id("xsecuritytag-1"));
    }

    #[test]
    fn test_id_reference_passes_through_without_scan() {
        // An empty snapshot proves no name lookup happens for id refs.
        let id = resolve("securitytag-7", &[]).unwrap();
        assert_eq!(id, "securitytag-7");
    }

    #[test]
    fn test_name_resolves_to_id() {
        let snapshot = vec![tag("securitytag-1", "dev"), tag("securitytag-5", "alpha")];
        assert_eq!(resolve("alpha", &snapshot).unwrap(), "securitytag-5");
    }

    #[test]
    fn test_name_lookup_is_case_sensitive() {
        let snapshot = vec![tag("securitytag-1", "Prod")];
        assert!(resolve("prod", &snapshot).is_err());
        assert_eq!(resolve("Prod", &snapshot).unwrap(), "securitytag-1");
    }

    #[test]
    fn test_duplicate_names_first_in_listing_order_wins() {
        let snapshot = vec![
            tag("securitytag-3", "web"),
            tag("securitytag-9", "web"),
        ];
        assert_eq!(resolve("web", &snapshot).unwrap(), "securitytag-3");
    }

    #[test]
    fn test_miss_names_the_original_reference() {
        let err = resolve("prod", &[]).unwrap_err();
        match err {
            Error::UnresolvedReference(name) => assert_eq!(name, "prod"),
            other => panic!("expected UnresolvedReference, got {other:?}"),
        }
    }

    #[test]
    fn test_find_by_name_regex() {
        let snapshot = vec![
            tag("securitytag-1", "web-frontend"),
            tag("securitytag-2", "web-backend"),
        ];
        let found = find_by_name_regex("^web-back", &snapshot).unwrap();
        assert_eq!(found.id, "securitytag-2");

        let first = find_by_name_regex("web", &snapshot).unwrap();
        assert_eq!(first.id, "securitytag-1");

        assert!(find_by_name_regex("^db-", &snapshot).is_err());
        assert!(find_by_name_regex("(", &snapshot).is_err());
    }
}

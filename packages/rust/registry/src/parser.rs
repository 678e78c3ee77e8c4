//! Registry manifest parser and structural validation.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use ochub_shared::{OcHubError, Registry, Result};
use regex::Regex;

/// A single path segment: no separators or NUL, and no leading dot (dot-prefixed
/// entries are reserved for staging directories under the collections root).
static SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^/\\\x00.][^/\\\x00]*$").expect("segment regex"));

/// Whether `name` can be used verbatim as a directory and URL segment.
pub fn is_valid_segment(name: &str) -> bool {
    name.trim() == name && SEGMENT_RE.is_match(name)
}

/// Parse manifest `content` (read from `path`, used for diagnostics only).
pub fn parse_registry(content: &str, path: &Path) -> Result<Registry> {
    if content.trim().is_empty() {
        return Err(OcHubError::manifest_parse(path, "manifest is empty"));
    }

    let registry: Registry =
        serde_yaml::from_str(content).map_err(|e| OcHubError::manifest_parse(path, e.to_string()))?;

    validate(&registry).map_err(|msg| OcHubError::manifest_parse(path, msg))?;
    Ok(registry)
}

fn validate(registry: &Registry) -> std::result::Result<(), String> {
    let mut collection_names = HashSet::new();

    for collection in &registry.collections {
        if !is_valid_segment(&collection.name) {
            return Err(format!(
                "collection name '{}' is not a valid path segment",
                collection.name
            ));
        }
        if !collection_names.insert(collection.name.as_str()) {
            return Err(format!("duplicate collection name '{}'", collection.name));
        }

        let mut version_names = HashSet::new();
        for version in &collection.versions {
            if !is_valid_segment(&version.name) {
                return Err(format!(
                    "version name '{}' in collection '{}' is not a valid path segment",
                    version.name, collection.name
                ));
            }
            if !version_names.insert(version.name.as_str()) {
                return Err(format!(
                    "duplicate version name '{}' in collection '{}'",
                    version.name, collection.name
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<Registry> {
        parse_registry(content, Path::new("registry.yml"))
    }

    fn parse_err(content: &str) -> String {
        match parse(content) {
            Err(OcHubError::ManifestParse { message, .. }) => message,
            other => panic!("expected ManifestParse, got {other:?}"),
        }
    }

    #[test]
    fn segment_validation() {
        assert!(is_valid_segment("petstore"));
        assert!(is_valid_segment("v2.1"));
        assert!(is_valid_segment("Stripe API"));
        assert!(!is_valid_segment(""));
        assert!(!is_valid_segment("."));
        assert!(!is_valid_segment(".."));
        assert!(!is_valid_segment(".hidden"));
        assert!(!is_valid_segment("a/b"));
        assert!(!is_valid_segment("a\\b"));
        assert!(!is_valid_segment(" padded "));
    }

    #[test]
    fn missing_collections_key_is_empty() {
        let registry = parse("title: API catalog\n").unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn null_collections_and_versions_are_empty() {
        let registry = parse("collections:\n  - name: petstore\n    versions:\n").unwrap();
        assert_eq!(registry.collections.len(), 1);
        assert!(registry.collections[0].versions.is_empty());

        let registry = parse("collections: ~\n").unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn empty_document_is_rejected() {
        assert!(parse_err("  \n").contains("empty"));
    }

    #[test]
    fn wrong_shape_is_rejected() {
        parse_err("collections: petstore\n");
        parse_err("- name: petstore\n");
        parse_err("collections:\n  - versions: []\n");
    }

    #[test]
    fn duplicate_collection_is_rejected() {
        let msg = parse_err(
            "collections:\n  - name: petstore\n    versions: []\n  - name: petstore\n    versions: []\n",
        );
        assert!(msg.contains("duplicate collection name 'petstore'"));
    }

    #[test]
    fn duplicate_version_is_rejected() {
        let msg = parse_err(
            "collections:\n  - name: petstore\n    versions:\n      - name: v1\n        url: a\n      - name: v1\n        url: b\n",
        );
        assert!(msg.contains("duplicate version name 'v1'"));
    }

    #[test]
    fn traversal_names_are_rejected() {
        let msg = parse_err("collections:\n  - name: ../etc\n    versions: []\n");
        assert!(msg.contains("not a valid path segment"));

        let msg = parse_err(
            "collections:\n  - name: petstore\n    versions:\n      - name: ..\n        url: a\n",
        );
        assert!(msg.contains("version name '..'"));
    }
}

//! Parsing of folder references into bare numeric folder ids.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{HierarchyError, Result};

/// `folders/<id>` resource name.
static RESOURCE_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^folders/(\d+)$").expect("Invalid resource name regex"));

/// Cloud Console URL carrying a `folder=<id>` query parameter.
static CONSOLE_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://console\.cloud\.google\.com/\S*[?&]folder=(\d+)")
        .expect("Invalid console URL regex")
});

/// Folder ids are decimal numbers.
static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("Invalid ID regex"));

/// Extract a folder id from a raw id, a resource name or a Console URL.
///
/// Supports the following formats:
/// - `123456789012`
/// - `folders/123456789012`
/// - `https://console.cloud.google.com/cloud-resource-manager?folder=123456789012`
///
/// # Examples
///
/// ```
/// use folder_tree::folder_id::parse_folder_id;
///
/// assert_eq!(parse_folder_id("folders/4242").unwrap(), "4242");
/// assert_eq!(parse_folder_id("4242").unwrap(), "4242");
/// ```
pub fn parse_folder_id(reference: &str) -> Result<String> {
    let trimmed = reference.trim();

    if ID_REGEX.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    for regex in [&*RESOURCE_NAME_REGEX, &*CONSOLE_URL_REGEX] {
        if let Some(id) = regex.captures(trimmed).and_then(|c| c.get(1)) {
            return Ok(id.as_str().to_string());
        }
    }

    Err(HierarchyError::InvalidFolderId(reference.to_string()))
}

/// Parse a comma-separated list of folder references.
pub fn parse_folder_list(list: &str) -> Result<Vec<String>> {
    list.split(',').map(parse_folder_id).collect()
}

/// Strip the collection prefix from an API resource name, e.g. `folders/12` → `12`.
pub fn resource_id<'a>(name: &'a str, collection: &str) -> Result<&'a str> {
    name.strip_prefix(collection)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|id| !id.is_empty() && !id.contains('/'))
        .ok_or_else(|| {
            HierarchyError::MalformedResponse(format!(
                "expected a {}/<id> resource name, got {:?}",
                collection, name
            ))
        })
}

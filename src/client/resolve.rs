//! Maps stored file names to publicly fetchable URLs.
//!
//! Pure string work, no network. The browser (or whatever render surface)
//! dereferences the URL; this module only computes it.

use tracing::warn;

use crate::models::policy::KEY_NAMESPACE;

/// Resolve a stored file name (or full key) to an absolute URL.
///
/// Returns None only for an empty name. Absolute http(s) inputs pass
/// through unchanged, which also makes resolution idempotent. Leading
/// namespace segments are stripped before the namespace is added back, so
/// names saved bare, namespaced, or accidentally double-namespaced all
/// resolve to the same URL.
///
/// With no public base configured the name is returned as-is after a
/// warning, keeping render paths alive in misconfigured environments.
pub fn resolve_media_url(public_base: &str, file_name: &str) -> Option<String> {
    if file_name.is_empty() {
        return None;
    }
    if file_name.starts_with("http://") || file_name.starts_with("https://") {
        return Some(file_name.to_string());
    }
    if public_base.is_empty() {
        warn!("public media URL not configured; returning file name unresolved");
        return Some(file_name.to_string());
    }

    let mut clean = file_name;
    while let Some(rest) = clean.strip_prefix(KEY_NAMESPACE) {
        clean = rest;
    }

    Some(format!(
        "{}/{}{}",
        public_base.trim_end_matches('/'),
        KEY_NAMESPACE,
        clean
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://media.example.com";

    #[test]
    fn empty_name_resolves_to_none() {
        assert_eq!(resolve_media_url(BASE, ""), None);
    }

    #[test]
    fn bare_name_gets_base_and_namespace() {
        assert_eq!(
            resolve_media_url(BASE, "post_20250110_120000_a1B2c3D4.jpg").as_deref(),
            Some("https://media.example.com/uploads/post_20250110_120000_a1B2c3D4.jpg")
        );
    }

    #[test]
    fn namespaced_and_doubled_names_collapse() {
        let expected = "https://media.example.com/uploads/f.jpg";
        assert_eq!(resolve_media_url(BASE, "uploads/f.jpg").as_deref(), Some(expected));
        assert_eq!(
            resolve_media_url(BASE, "uploads/uploads/f.jpg").as_deref(),
            Some(expected)
        );
    }

    #[test]
    fn absolute_urls_pass_through_making_resolution_idempotent() {
        let first = resolve_media_url(BASE, "uploads/f.jpg").unwrap();
        let second = resolve_media_url(BASE, &first).unwrap();
        assert_eq!(first, second);

        assert_eq!(
            resolve_media_url(BASE, "http://other.example/x.png").as_deref(),
            Some("http://other.example/x.png")
        );
    }

    #[test]
    fn missing_base_returns_name_unresolved() {
        assert_eq!(
            resolve_media_url("", "uploads/f.jpg").as_deref(),
            Some("uploads/f.jpg")
        );
    }

    #[test]
    fn trailing_slash_on_base_is_tolerated() {
        assert_eq!(
            resolve_media_url("https://media.example.com/", "f.jpg").as_deref(),
            Some("https://media.example.com/uploads/f.jpg")
        );
    }
}

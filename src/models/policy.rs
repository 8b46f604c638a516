//! Upload policy: size ceiling, media-type allow-list, key namespace.
//!
//! The same policy type gates uploads twice: once in the client before any
//! network traffic (fast feedback) and once in the relay, which is the
//! authoritative gate. Both sides must agree on the namespace and the size
//! ceiling; they intentionally differ on the allow-list shape — the client
//! accepts wildcard families (`image/*`), the relay pins exact subtypes.
//! The checks differ too: the client may fall back to the file-name suffix
//! when the declared type is unusable, while the relay judges the declared
//! type alone, because the only "name" it sees is the object key.

/// Default upload ceiling: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Required prefix for every stored object key.
pub const KEY_NAMESPACE: &str = "uploads/";

/// Exact media types the relay accepts. Order and spelling match the stored
/// data already in the bucket; do not reorder or "clean up" entries.
pub const RELAY_ALLOWED_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "video/mp4",
    "video/quicktime",
    "video/x-msvideo",
    "video/webm",
];

/// Wildcard families the client-side validator accepts by default.
pub const CLIENT_ACCEPT_TYPES: &[&str] = &["image/*", "video/*"];

/// Validation policy applied to candidate uploads.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    /// Maximum payload size in bytes.
    pub max_bytes: u64,

    /// Allow-list entries. An entry ending in `/*` matches any subtype of
    /// that top-level type; any other entry matches the declared type exactly
    /// (case-insensitive). [`UploadPolicy::allows`] additionally treats a
    /// non-wildcard entry as a lowercased filename suffix.
    pub allowed_types: Vec<String>,

    /// Prefix every valid object key must carry.
    pub key_namespace: String,
}

impl UploadPolicy {
    /// Policy enforced by the relay: exact subtypes only.
    pub fn relay_default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_types: RELAY_ALLOWED_TYPES.iter().map(|s| s.to_string()).collect(),
            key_namespace: KEY_NAMESPACE.to_string(),
        }
    }

    /// Policy applied client-side before uploading: whole image/video families.
    pub fn client_default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_types: CLIENT_ACCEPT_TYPES.iter().map(|s| s.to_string()).collect(),
            key_namespace: KEY_NAMESPACE.to_string(),
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Ceiling expressed in megabytes, for user-facing messages. Fractional
    /// for caps that are not MiB-aligned; formatting with `{}` renders `10`
    /// for 10 MiB and `0.5` for 512 KiB.
    pub fn max_megabytes(&self) -> f64 {
        self.max_bytes as f64 / (1024.0 * 1024.0)
    }

    /// Whether a declared media type alone matches the allow-list. This is
    /// the entire check on the relay path, where the object key is caller
    /// input and must never stand in for the type.
    pub fn allows_type(&self, declared_type: &str) -> bool {
        self.allowed_types.iter().any(|entry| {
            if let Some(family) = entry.strip_suffix("/*") {
                declared_type
                    .split('/')
                    .next()
                    .is_some_and(|top| top.eq_ignore_ascii_case(family))
            } else {
                declared_type.eq_ignore_ascii_case(entry)
            }
        })
    }

    /// Client-side check: the declared type, with a filename-suffix fallback
    /// for files whose declared type is missing or generic.
    pub fn allows(&self, declared_type: &str, file_name: &str) -> bool {
        if self.allows_type(declared_type) {
            return true;
        }
        let lowered_name = file_name.to_lowercase();
        self.allowed_types
            .iter()
            .filter(|entry| !entry.ends_with("/*"))
            .any(|entry| lowered_name.ends_with(entry.as_str()))
    }
}

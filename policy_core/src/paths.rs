//! Helpers for logical namespace paths.
//!
//! Logical paths are always absolute and '/'-separated, independent of the
//! host platform, so they are handled as plain strings rather than
//! `std::path::Path`.

/// The namespace root. The root itself never carries metadata and is never
/// evaluated by the ancestor walker.
pub const ROOT: &str = "/";

/// Return the parent collection of a logical path. The parent of a top-level
/// entry (and of the root itself) is the root.
pub fn parent_of(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        None | Some(0) => ROOT.to_string(),
        Some(idx) => trimmed[..idx].to_string(),
    }
}

/// Return the leaf name of a logical path, or an empty string for the root.
pub fn object_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// Join a collection path and a leaf name.
pub fn join(collection: &str, name: &str) -> String {
    format!("{}/{}", collection.trim_end_matches('/'), name)
}

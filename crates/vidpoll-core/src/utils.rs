//! Utility functions for vidpoll-core

use std::path::{Path, PathBuf};

/// Expand a leading `~` (and `$VAR` references) in a user-supplied path.
///
/// Paths that fail to expand (unknown variable, non-UTF-8) are returned as-is.
///
/// # Example
/// ```ignore
/// use vidpoll_core::utils::expand_path;
///
/// let out = expand_path(Path::new("~/vidpoll/data"));
/// ```
pub fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => match shellexpand::full(s) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(_) => path.to_path_buf(),
        },
        None => path.to_path_buf(),
    }
}

/// Whether an entity id is safe to use as a single directory name
pub fn is_safe_path_component(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\', '\0'])
}

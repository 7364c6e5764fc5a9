//! Path manipulation utilities for bundlekit
//!
//! Every path declared by a bundle (pruning entries, domain substitution
//! specs, patch names) is normalized here before it is merged, so that
//! `./a//b` and `a/b` collapse to the same entry.

use crate::error::{Error, Result};
use glob::{MatchOptions, Pattern};
use std::path::{Component, Path};

/// Match options for path specs: `*` never crosses a `/`.
pub const SPEC_MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Normalize a relative path spec to canonical `a/b/c` form.
///
/// Backslashes are treated as separators, `.` and empty components are
/// dropped. Absolute paths and any `..` component are rejected, as is a
/// spec that normalizes to nothing.
pub fn normalize_relative(spec: &str) -> Result<String> {
    let unified = spec.trim().replace('\\', "/");
    if unified.starts_with('/') || Path::new(&unified).has_root() {
        return Err(Error::InvalidPath {
            path: spec.to_string(),
            message: "path must be relative".to_string(),
        });
    }

    let mut parts = Vec::new();
    for component in Path::new(&unified).components() {
        match component {
            Component::Normal(part) => match part.to_str() {
                Some(part) => parts.push(part),
                None => {
                    return Err(Error::InvalidPath {
                        path: spec.to_string(),
                        message: "path is not valid UTF-8".to_string(),
                    })
                }
            },
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::InvalidPath {
                    path: spec.to_string(),
                    message: "path must not contain '..'".to_string(),
                })
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::InvalidPath {
                    path: spec.to_string(),
                    message: "path must be relative".to_string(),
                })
            }
        }
    }

    if parts.is_empty() {
        return Err(Error::InvalidPath {
            path: spec.to_string(),
            message: "path is empty".to_string(),
        });
    }
    Ok(parts.join("/"))
}

/// Whether a spec contains glob metacharacters.
pub fn is_glob_spec(spec: &str) -> bool {
    spec.contains(['*', '?', '['])
}

/// Match a tree-relative path against a spec (literal or glob).
pub fn spec_matches(spec: &str, path: &str) -> Result<bool> {
    if !is_glob_spec(spec) {
        return Ok(spec == path);
    }
    let pattern = Pattern::new(spec).map_err(Error::Glob)?;
    Ok(pattern.matches_with(path, SPEC_MATCH_OPTIONS))
}

/// Render a path relative to `root` in canonical `/`-separated form.
pub fn relative_display(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();
    parts.map(|p| p.join("/"))
}

//! Output path validation shared by the operations and the CLI.

use std::path::Path;

use paleogeo_ops::{ArtifactKind, OutputPathValidator};

/// Extension expected for an artifact kind.
fn expected_extension(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Raster => "pgg",
        ArtifactKind::Vector => "pgv",
    }
}

/// Checks a candidate output path.
///
/// Returns `(false, message)` when the path names a directory, lacks the
/// extension for its artifact kind, or points into a directory that does
/// not exist. Overwrite policy is the engine's decision, not a path
/// concern, so an existing file passes.
pub fn validate_output_path(path: &Path, kind: ArtifactKind) -> (bool, String) {
    if path.is_dir() {
        return (false, format!("{} is a directory", path.display()));
    }
    let wanted = expected_extension(kind);
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case(wanted) => {}
        _ => {
            return (
                false,
                format!("{} must have the .{wanted} extension", path.display()),
            );
        }
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            return (
                false,
                format!("directory {} does not exist", parent.display()),
            );
        }
    }
    (true, String::new())
}

/// [`OutputPathValidator`] backed by [`validate_output_path`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PathRules;

impl OutputPathValidator for PathRules {
    fn validate(&self, path: &Path, kind: ArtifactKind) -> (bool, String) {
        validate_output_path(path, kind)
    }
}

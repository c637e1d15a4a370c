//! Image filename validation.
//!
//! Archive image entries are flat: `images/<filename>`. Filenames coming out
//! of a manifest are untrusted, so every one is checked before it is used to
//! build a path inside the archive or the asset root.

use anyhow::{Result, bail};
use std::path::{Component, Path, PathBuf};

/// Validates that `filename` is a single, plain path component.
///
/// # Security
/// Rejects filenames that:
/// - Are empty
/// - Contain `/` or `\` separators
/// - Are `.` or `..`
/// - Are absolute or carry a root/prefix
///
/// # Examples
/// ```ignore
/// validate_filename("receipt.jpg")      // Ok
/// validate_filename("../etc/passwd")    // Error: path separator
/// validate_filename("..")               // Error: traversal
/// ```
pub(crate) fn validate_filename(filename: &str) -> Result<&str> {
    if filename.is_empty() {
        bail!("Image filename cannot be empty");
    }

    if filename.contains(['/', '\\']) {
        bail!("Image filename cannot contain path separators: {filename}");
    }

    let path = Path::new(filename);
    if path.is_absolute() {
        bail!("Image filename cannot be absolute: {filename}");
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(filename),
        (Some(Component::ParentDir | Component::CurDir), _) => {
            bail!("Image filename cannot be '.' or '..': {filename}")
        },
        _ => bail!("Image filename must be a plain name: {filename}"),
    }
}

/// Returns the path of an image inside `root` after validating its filename.
pub(crate) fn asset_path(root: &Path, filename: &str) -> Result<PathBuf> {
    let filename = validate_filename(filename)?;
    Ok(root.join(filename))
}

//! JSON files rewritten in place through a sibling temporary file.

use std::fs;
use std::path::{Path, PathBuf};

use kessan_core::{DataError, Result};
use serde::Serialize;

/// Serializes `value` to `path`, creating parent directories.
///
/// The content goes to `{path}.tmp` first and is renamed over `path`.
pub(crate) fn write_atomically<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(value)
        .map_err(|e| DataError::Parse(format!("Failed to encode {}: {}", path.display(), e)))?;

    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

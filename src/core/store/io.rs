//! Atomic file writes.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{Result, StoreError};

/// Write `content` to `path` atomically with owner-only permissions.
///
/// Writes to a temp file in the same directory, syncs it, then renames it
/// over the target. Readers see either the previous file or the new one.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let failed = |source: std::io::Error| StoreError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(failed)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".stagecraft")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(failed)?;

    temp.write_all(content).map_err(failed)?;
    temp.as_file().sync_all().map_err(failed)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o600)).map_err(failed)?;
    }

    temp.persist(path).map_err(|e| failed(e.error))?;
    Ok(())
}

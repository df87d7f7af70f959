use std::path::Path;

use crate::errors::PalletError;

/// Ensure a directory exists, creating it and any parents if needed.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Read a whole file, naming the file in the error.
pub fn read_to_string(path: &Path, what: &str) -> Result<String, PalletError> {
    std::fs::read_to_string(path).map_err(|e| PalletError::Config {
        message: format!("Failed to read {what} {}: {e}", path.display()),
    })
}

/// Write `contents` to `path`, creating the parent directory first.
///
/// The data goes to a sibling `.tmp` file which is then renamed over the
/// target.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), PalletError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    tracing::debug!("wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_creates_parent() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("nested/plan.txt");
        write_atomic(&target, "hello").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello");
        assert!(!dir.path().join("nested/plan.txt.tmp").exists());
    }

    #[test]
    fn read_missing_file_names_it() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = read_to_string(&dir.path().join("nope.toml"), "universe").unwrap_err();
        assert!(err.to_string().contains("universe"), "got: {err}");
    }
}

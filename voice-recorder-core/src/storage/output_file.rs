use std::fs::{self, File};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::models::error::SessionError;

/// Create (or truncate) an output file, creating its parent directory first
/// when allowed.
pub(crate) fn create(path: &Path, create_missing_dirs: bool) -> Result<File, SessionError> {
    if create_missing_dirs {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| SessionError::Io(format!("failed to create {}: {}", parent.display(), e)))?;
        }
    }
    File::create(path).map_err(|e| SessionError::Io(format!("failed to create {}: {}", path.display(), e)))
}

/// SHA-256 hex digest of a file.
pub(crate) fn sha256_file(path: &Path) -> Result<String, SessionError> {
    let mut file = File::open(path)
        .map_err(|e| SessionError::Io(format!("failed to read file for checksum: {}", e)))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex_encode(&hasher.finalize()))
}

pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

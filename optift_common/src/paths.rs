use anyhow::{bail, Result};
use std::path::PathBuf;

/// Returns the platform temporary directory.
///
/// Resolved from the environment rather than `std::env::temp_dir` so the lookup order is fixed:
/// `TEMP` then `TMP` on Windows, `TMPDIR` with a `/tmp` fallback elsewhere.
pub fn temp_dir() -> Result<PathBuf> {
    if cfg!(windows) {
        for var in ["TEMP", "TMP"] {
            if let Some(dir) = std::env::var_os(var) {
                return Ok(PathBuf::from(dir));
            }
        }
        bail!("could not find temp dir: neither TEMP nor TMP is set");
    } else {
        match std::env::var_os("TMPDIR") {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => Ok(PathBuf::from("/tmp")),
        }
    }
}

/// The cache file for one sample-harness key. The name format is stable across versions.
pub fn sample_cache_path(dir: &std::path::Path, key: u64) -> PathBuf {
    dir.join(format!("optift_{key:016X}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_name_is_uppercase_hex_zero_padded() {
        let path = sample_cache_path(std::path::Path::new("/tmp"), 0xabc);
        assert_eq!(path, PathBuf::from("/tmp/optift_0000000000000ABC.json"));
    }
}

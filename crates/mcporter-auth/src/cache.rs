//! Token cache persistence: one `tokens.json` per server, written with the
//! teacher's write-temp-then-rename pattern so a crash mid-write never
//! leaves a half-written cache file behind.

use std::path::{Path, PathBuf};

use mcporter_core::{Result, RuntimeError};

use crate::token::TokenInfo;

const CACHE_FILE_NAME: &str = "tokens.json";

/// Reads and atomically writes a single server's cached tokens.
#[derive(Debug, Clone)]
pub struct TokenCache {
    dir: PathBuf,
}

impl TokenCache {
    /// `dir` is the definition's `token_cache_dir` (e.g.
    /// `<home>/.mcporter/<name>`); created on first write if missing.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self) -> PathBuf {
        self.dir.join(CACHE_FILE_NAME)
    }

    /// Load the cached token, if the cache file exists and parses.
    ///
    /// A missing file is not an error (first-time connect); a file that
    /// exists but fails to parse is treated the same way, since a token
    /// cache is a disposable optimization rather than durable state.
    pub fn load(&self) -> Result<Option<TokenInfo>> {
        let path = self.path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(serde_json::from_str(&contents).ok()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RuntimeError::Io { path, source: e }),
        }
    }

    /// Persist `token`, replacing any prior cache contents atomically.
    pub fn store(&self, token: &TokenInfo) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| RuntimeError::Io {
            path: self.dir.clone(),
            source: e,
        })?;

        let final_path = self.path();
        let tmp_path = self.dir.join(format!("{CACHE_FILE_NAME}.tmp"));
        let serialized = serde_json::to_vec_pretty(token).map_err(|e| RuntimeError::Io {
            path: final_path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;

        std::fs::write(&tmp_path, serialized).map_err(|e| RuntimeError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp_path, &final_path).map_err(|e| RuntimeError::Io {
            path: final_path,
            source: e,
        })?;
        Ok(())
    }

    /// The directory backing this cache, for callers that need to display
    /// or clear it.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn token() -> TokenInfo {
        TokenInfo::from_expires_in(
            "access".into(),
            Some("refresh".into()),
            Some(3600),
            UNIX_EPOCH + Duration::from_secs(10),
        )
    }

    #[test]
    fn round_trips_through_store_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path());
        assert!(cache.load().unwrap().is_none());

        cache.store(&token()).unwrap();
        let loaded = cache.load().unwrap().unwrap();
        assert_eq!(loaded, token());

        // No stray temp file left behind after a successful store.
        assert!(!dir.path().join("tokens.json.tmp").exists());
    }

    #[test]
    fn corrupt_cache_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tokens.json"), b"not json").unwrap();
        let cache = TokenCache::new(dir.path());
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn store_overwrites_prior_contents() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path());
        cache.store(&token()).unwrap();

        let mut updated = token();
        updated.access_token = "rotated".into();
        cache.store(&updated).unwrap();

        assert_eq!(cache.load().unwrap().unwrap().access_token, "rotated");
    }
}

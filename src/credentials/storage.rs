//! Credential storage backends.
//!
//! The file backend keeps one JSON record at a fixed per-user path with
//! owner-only permissions. Reads never fail: a missing, unreadable, or
//! malformed file is reported as "no record", since an unauthenticated
//! machine is an expected steady state.

use super::TokenRecord;
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info};

/// Storage abstraction for the credential record.
///
/// Records are read and written wholesale; there are no partial updates.
/// Concurrent writers race with last-write-wins semantics, which is
/// acceptable for a single-user credential cache.
pub trait TokenStore: Send + Sync {
    /// Returns the stored record, or `None` if absent or unusable
    fn load(&self) -> Option<TokenRecord>;

    /// Replaces the stored record
    fn save(&self, record: &TokenRecord) -> Result<()>;
}

/// File-backed store holding a single JSON credential record.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<TokenRecord> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No readable credential record");
                return None;
            }
        };

        let record: TokenRecord = match serde_json::from_str(&contents) {
            Ok(record) => record,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Malformed credential record");
                return None;
            }
        };

        // A record without an access token is structurally incomplete
        if record.access_token.is_empty() {
            debug!(path = %self.path.display(), "Credential record has empty access token");
            return None;
        }

        Some(record)
    }

    fn save(&self, record: &TokenRecord) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.exists() {
                let mut builder = fs::DirBuilder::new();
                builder.recursive(true);
                #[cfg(unix)]
                {
                    use std::os::unix::fs::DirBuilderExt;
                    builder.mode(0o700);
                }
                builder
                    .create(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
        }

        let contents =
            serde_json::to_string_pretty(record).context("Failed to serialize credential record")?;
        fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        // Restrict the record to owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to set permissions on {}", self.path.display()))?;
        }

        info!(path = %self.path.display(), "Credential record saved");
        Ok(())
    }
}

/// In-memory store for tests and other non-persistent backends.
#[derive(Default)]
pub struct MemoryTokenStore {
    record: Mutex<Option<TokenRecord>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: TokenRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<TokenRecord> {
        self.record
            .lock()
            .unwrap()
            .clone()
            .filter(|record| !record.access_token.is_empty())
    }

    fn save(&self, record: &TokenRecord) -> Result<()> {
        *self.record.lock().unwrap() = Some(record.clone());
        Ok(())
    }
}

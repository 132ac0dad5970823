//! On-disk credential directory

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::CredentialError;
use crate::traits::CredentialStore;
use crate::types::Credentials;

/// File holding the credential blob inside the session directory
const CREDS_FILE: &str = "creds.json";

/// Credential store backed by a session directory.
///
/// The whole directory belongs to the store and is removed on [`wipe`].
///
/// [`wipe`]: CredentialStore::wipe
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    /// Create a store rooted at `dir` (created lazily on first persist)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The session directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn creds_path(&self) -> PathBuf {
        self.dir.join(CREDS_FILE)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> CredentialError {
    CredentialError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<Credentials>, CredentialError> {
        let path = self.creds_path();
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };

        let value = serde_json::from_slice(&content)
            .map_err(|source| CredentialError::Corrupt { path, source })?;
        Ok(Some(Credentials::new(value)))
    }

    async fn persist(&self, credentials: &Credentials) -> Result<(), CredentialError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;

        let path = self.creds_path();
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_vec_pretty(credentials.as_value()).map_err(|source| {
            CredentialError::Corrupt {
                path: path.clone(),
                source,
            }
        })?;

        // Readers only ever see a complete file
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error(&path, e))?;

        tracing::debug!("Persisted credentials to {:?}", path);
        Ok(())
    }

    async fn wipe(&self) -> Result<(), CredentialError> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                tracing::info!("Removed session directory {:?}", self.dir);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&self.dir, e)),
        }
    }
}

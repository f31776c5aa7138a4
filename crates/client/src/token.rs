//! Bearer token persistence.
//!
//! The token survives between sessions in a small file and is attached to
//! every request until [`TokenStore::logout`] clears it.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("Failed to access token file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Token must not be empty")]
    EmptyToken,
}

/// Shared holder of the current bearer token.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<TokenStoreInner>,
}

struct TokenStoreInner {
    path: Option<PathBuf>,
    token: RwLock<Option<SecretString>>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("path", &self.inner.path)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl TokenStore {
    /// A store that never touches the filesystem.
    #[must_use]
    pub fn memory() -> Self {
        Self::build(None, None)
    }

    /// Open a file-backed store, reading any previously saved token.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TokenStoreError> {
        let path = path.as_ref().to_path_buf();
        let token = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let trimmed = contents.trim();
                (!trimmed.is_empty()).then(|| SecretString::from(trimmed.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(source) => return Err(TokenStoreError::Io { path, source }),
        };
        debug!(authenticated = token.is_some(), "Loaded token store");
        Ok(Self::build(Some(path), token))
    }

    fn build(path: Option<PathBuf>, token: Option<SecretString>) -> Self {
        Self {
            inner: Arc::new(TokenStoreInner {
                path,
                token: RwLock::new(token),
            }),
        }
    }

    /// Store a new token and persist it.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is blank or the file cannot be written.
    pub async fn login(&self, token: SecretString) -> Result<(), TokenStoreError> {
        let value = token.expose_secret().trim();
        if value.is_empty() {
            return Err(TokenStoreError::EmptyToken);
        }
        if let Some(path) = &self.inner.path {
            write_private(path, value).await?;
        }
        *self.inner.token.write().await = Some(SecretString::from(value.to_string()));
        Ok(())
    }

    /// Forget the token and remove the persisted copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub async fn logout(&self) -> Result<(), TokenStoreError> {
        *self.inner.token.write().await = None;
        if let Some(path) = &self.inner.path {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(TokenStoreError::Io {
                        path: path.clone(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.token.read().await.is_some()
    }

    /// Attach the current token, if any, as a bearer `Authorization` header.
    pub(crate) async fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.inner.token.read().await.as_ref() {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }
}

async fn write_private(path: &Path, value: &str) -> Result<(), TokenStoreError> {
    let io_err = |source| TokenStoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    tokio::fs::write(path, value).await.map_err(io_err)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(io_err)?;
    }
    Ok(())
}

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::core::auth::{AuthError, StoredToken, TokenStore};

/// The administrator's OAuth token, stored as JSON next to the binary.
pub struct JsonTokenStore {
    path: PathBuf,
}

impl JsonTokenStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl TokenStore for JsonTokenStore {
    fn exists(&self) -> bool {
        self.path.exists()
    }

    async fn load(&self) -> Result<Option<StoredToken>, AuthError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let text = fs::read_to_string(&self.path)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let token: StoredToken = serde_json::from_str(&text)
            .map_err(|e| AuthError::Store(format!("{}: {}", self.path.display(), e)))?;
        Ok(Some(token))
    }

    async fn save(&self, token: &StoredToken) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AuthError::Store(e.to_string()))?;
        }

        let text =
            serde_json::to_string_pretty(token).map_err(|e| AuthError::Store(e.to_string()))?;
        fs::write(&self.path, text)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        // The file holds a refresh token; keep it private to the owner.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| AuthError::Store(e.to_string()))?;
        }

        tracing::debug!("Saved OAuth token to {}", self.path.display());
        Ok(())
    }
}

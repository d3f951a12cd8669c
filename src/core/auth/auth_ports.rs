// ============================================================================
// CREDENTIAL PORTS
// ============================================================================
// The resolver only decides *which* credentials to use. Reading files,
// talking to the OAuth endpoints and building HTTP clients all happen in
// the infra layer behind these traits.

use async_trait::async_trait;

use super::auth_models::{AuthError, StoredToken};
use crate::core::drive::DriveHandle;

/// The local file holding the administrator's token.
#[async_trait]
pub trait TokenStore: Send + Sync {
    fn exists(&self) -> bool;

    /// Returns `None` when no token file exists.
    async fn load(&self) -> Result<Option<StoredToken>, AuthError>;

    /// Overwrites any previously stored token.
    async fn save(&self, token: &StoredToken) -> Result<(), AuthError>;
}

/// The installed-application OAuth flow.
#[async_trait]
pub trait OAuthFlow: Send + Sync {
    /// Whether the local client-secret file is present.
    fn has_client_secret(&self) -> bool;

    /// Exchanges the refresh credential for a new access token.
    async fn refresh(&self, token: &StoredToken) -> Result<StoredToken, AuthError>;

    /// Runs the browser consent flow. Blocks until the user answers.
    async fn authorize(&self) -> Result<StoredToken, AuthError>;
}

/// Key/value secrets provided by the deployment environment.
pub trait SecretStore: Send + Sync {
    /// The service-account JSON descriptor, if configured.
    fn service_account(&self) -> Option<String>;

    /// The generative-model API key, if configured.
    fn api_key(&self) -> Option<String>;
}

/// Builds authenticated storage handles.
pub trait DriveConnector: Send + Sync {
    fn with_token(&self, token: StoredToken) -> DriveHandle;

    fn with_service_account(&self, descriptor: &str) -> Result<DriveHandle, AuthError>;
}

// This is the credential resolver - it decides which Drive credentials the
// application runs with. It never touches the filesystem or the network
// itself; everything goes through the ports in `auth_ports`.
//
// Decision order:
// 1. A client-secret file or a stored token exists  -> Admin (OAuth)
// 2. A service-account descriptor is configured      -> Viewer (read-only)
// 3. Otherwise                                       -> None

use async_trait::async_trait;
use std::sync::Arc;

use super::auth_models::{AuthError, DriveAccess, StoredToken};
use super::auth_ports::{DriveConnector, OAuthFlow, SecretStore, TokenStore};
use crate::core::clock::Clock;

/// Anything that can produce a [`DriveAccess`].
///
/// The fetcher depends on this rather than on [`CredentialResolver`] so it
/// can be tested with canned access values.
#[async_trait]
pub trait AccessResolver: Send + Sync {
    async fn resolve(&self) -> Result<DriveAccess, AuthError>;
}

pub struct CredentialResolver {
    tokens: Arc<dyn TokenStore>,
    oauth: Arc<dyn OAuthFlow>,
    secrets: Arc<dyn SecretStore>,
    connector: Arc<dyn DriveConnector>,
    clock: Arc<dyn Clock>,
}

impl CredentialResolver {
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        oauth: Arc<dyn OAuthFlow>,
        secrets: Arc<dyn SecretStore>,
        connector: Arc<dyn DriveConnector>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tokens,
            oauth,
            secrets,
            connector,
            clock,
        }
    }

    /// Loads, refreshes or re-authorizes the administrator token.
    async fn resolve_admin(&self) -> Result<DriveAccess, AuthError> {
        let now = self.clock.now();
        let mut token = self.tokens.load().await?;

        let usable = token.as_ref().is_some_and(|t| t.is_valid(now));
        if !usable {
            token = match token {
                Some(expired) if expired.is_expired(now) && expired.can_refresh() => {
                    tracing::info!("Stored token expired, refreshing");
                    Some(self.oauth.refresh(&expired).await?)
                }
                other => {
                    if self.oauth.has_client_secret() {
                        tracing::info!("No usable token, starting browser authorization");
                        Some(self.oauth.authorize().await?)
                    } else {
                        tracing::warn!(
                            "Stored token is unusable and no client secret file is available"
                        );
                        other
                    }
                }
            };

            if let Some(token) = token.as_ref() {
                self.tokens.save(token).await?;
            }
        }

        let handle = token.map(|t: StoredToken| self.connector.with_token(t));
        Ok(DriveAccess::Admin(handle))
    }
}

#[async_trait]
impl AccessResolver for CredentialResolver {
    async fn resolve(&self) -> Result<DriveAccess, AuthError> {
        if self.oauth.has_client_secret() || self.tokens.exists() {
            tracing::debug!("Local OAuth artifacts found, using admin mode");
            return self.resolve_admin().await;
        }

        if let Some(descriptor) = self.secrets.service_account() {
            tracing::debug!("Service account configured, using viewer mode");
            let handle = self.connector.with_service_account(&descriptor)?;
            return Ok(DriveAccess::Viewer(handle));
        }

        tracing::debug!("No Drive credentials configured");
        Ok(DriveAccess::None)
    }
}

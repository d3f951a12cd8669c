use std::sync::Arc;

use super::drive_client::{DriveClient, DriveCredentials};
use crate::core::auth::{AuthError, DriveConnector, StoredToken};
use crate::core::drive::DriveHandle;
use crate::infra::google_auth::{ServiceAccountAuth, VIEWER_SCOPE};

/// Builds `DriveClient` handles for the credential resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct GoogleDriveConnector;

impl GoogleDriveConnector {
    pub fn new() -> Self {
        Self
    }
}

impl DriveConnector for GoogleDriveConnector {
    fn with_token(&self, token: StoredToken) -> DriveHandle {
        Arc::new(DriveClient::new(DriveCredentials::OAuth(token)))
    }

    fn with_service_account(&self, descriptor: &str) -> Result<DriveHandle, AuthError> {
        let auth = ServiceAccountAuth::from_json(descriptor, VIEWER_SCOPE)?;
        tracing::info!("Using service account {}", auth.client_email());
        Ok(Arc::new(DriveClient::new(DriveCredentials::ServiceAccount(
            auth,
        ))))
    }
}

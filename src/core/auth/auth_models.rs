use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::drive::DriveHandle;

/// Tokens this close to expiry are treated as already expired.
const EXPIRY_SKEW_SECS: i64 = 60;

// ============================================================================
// STORED TOKEN
// ============================================================================

/// OAuth credentials for the administrator, persisted between runs.
///
/// The client id/secret and token URI travel with the token so a refresh
/// works even after the client-secret file has been removed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl StoredToken {
    /// A token without an expiry never expires.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now + Duration::seconds(EXPIRY_SKEW_SECS),
            None => false,
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && !self.is_expired(now)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|t| !t.is_empty())
    }
}

// Keep secrets out of logs.
impl fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredToken")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .finish()
    }
}

// ============================================================================
// ACCESS MODES
// ============================================================================

/// Which credentials were used, without the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    /// Interactive OAuth. Read, write and upload.
    Admin,
    /// Service account. Read-only list and download.
    Viewer,
    /// Nothing configured.
    None,
}

impl CredentialMode {
    pub fn can_upload(self) -> bool {
        matches!(self, CredentialMode::Admin)
    }
}

impl fmt::Display for CredentialMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CredentialMode::Admin => "admin",
            CredentialMode::Viewer => "viewer",
            CredentialMode::None => "none",
        };
        f.write_str(label)
    }
}

/// Result of credential resolution.
///
/// `Admin` may carry no handle when the local artifacts exist but none of
/// load, refresh or authorization produced a token.
#[derive(Clone)]
pub enum DriveAccess {
    Admin(Option<DriveHandle>),
    Viewer(DriveHandle),
    None,
}

impl DriveAccess {
    pub fn mode(&self) -> CredentialMode {
        match self {
            DriveAccess::Admin(_) => CredentialMode::Admin,
            DriveAccess::Viewer(_) => CredentialMode::Viewer,
            DriveAccess::None => CredentialMode::None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, DriveAccess::Admin(_))
    }

    pub fn handle(&self) -> Option<&DriveHandle> {
        match self {
            DriveAccess::Admin(handle) => handle.as_ref(),
            DriveAccess::Viewer(handle) => Some(handle),
            DriveAccess::None => None,
        }
    }
}

impl fmt::Debug for DriveAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveAccess::Admin(handle) => {
                write!(f, "Admin(handle: {})", handle.is_some())
            }
            DriveAccess::Viewer(_) => f.write_str("Viewer"),
            DriveAccess::None => f.write_str("None"),
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("Token store error: {0}")]
    Store(String),

    #[error("Invalid client secret file: {0}")]
    ClientSecret(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Token refresh failed: {0}")]
    Refresh(String),

    #[error("Service account error: {0}")]
    ServiceAccount(String),
}

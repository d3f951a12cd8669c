pub mod auth_models;
pub mod auth_ports;
pub mod credential_resolver;

pub use auth_models::{AuthError, DriveAccess, StoredToken};
pub use auth_ports::{DriveConnector, OAuthFlow, SecretStore, TokenStore};
pub use credential_resolver::{AccessResolver, CredentialResolver};

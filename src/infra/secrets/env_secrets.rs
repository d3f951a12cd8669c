use crate::core::auth::SecretStore;

pub const SERVICE_ACCOUNT_JSON_VAR: &str = "GOOGLE_SERVICE_ACCOUNT_JSON";
pub const SERVICE_ACCOUNT_KEY_VAR: &str = "GOOGLE_SERVICE_ACCOUNT_KEY";
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Deployment secrets read once from the process environment.
///
/// The service account may be given inline (`GOOGLE_SERVICE_ACCOUNT_JSON`)
/// or as a path to the key file (`GOOGLE_SERVICE_ACCOUNT_KEY`); inline wins.
#[derive(Clone, Default)]
pub struct EnvSecretStore {
    service_account: Option<String>,
    api_key: Option<String>,
}

impl EnvSecretStore {
    pub fn new(service_account: Option<String>, api_key: Option<String>) -> Self {
        Self {
            service_account: non_blank(service_account),
            api_key: non_blank(api_key),
        }
    }

    pub fn from_env() -> Self {
        let service_account = std::env::var(SERVICE_ACCOUNT_JSON_VAR).ok().or_else(|| {
            let path = std::env::var(SERVICE_ACCOUNT_KEY_VAR).ok()?;
            match std::fs::read_to_string(&path) {
                Ok(json) => Some(json),
                Err(e) => {
                    tracing::warn!("Failed to read service account key at {}: {}", path, e);
                    None
                }
            }
        });

        Self::new(service_account, std::env::var(API_KEY_VAR).ok())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl SecretStore for EnvSecretStore {
    fn service_account(&self) -> Option<String> {
        self.service_account.clone()
    }

    fn api_key(&self) -> Option<String> {
        self.api_key.clone()
    }
}

impl std::fmt::Debug for EnvSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvSecretStore")
            .field("service_account", &self.service_account.is_some())
            .field("api_key", &self.api_key.is_some())
            .finish()
    }
}

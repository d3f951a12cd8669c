// This is the entry point of the class assistant.
//
// **Architecture Overview:**
// - `core/` = Business logic (credential selection, document fetching and
//   caching, the question/answer turn)
// - `infra/` = Implementations of core traits (Google OAuth, Drive, Gemini)
// - `chat/` = The terminal front end
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Hand the session to the chat loop

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "chat/chat_layer.rs"]
mod chat;
#[path = "config.rs"]
mod config;
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use std::sync::Arc;

use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

use crate::chat::ChatSession;
use crate::config::AppConfig;
use crate::core::ai::{AiConfig, AiService};
use crate::core::auth::{CredentialResolver, SecretStore};
use crate::core::clock::{Clock, SystemClock};
use crate::core::drive::{CachedDocuments, DocumentFetcher};
use crate::infra::ai::GeminiClient;
use crate::infra::google_auth::{InstalledAppFlow, JsonTokenStore, ADMIN_SCOPE};
use crate::infra::google_drive::GoogleDriveConnector;
use crate::infra::secrets::EnvSecretStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Logs go to stderr so they don't interleave with the chat on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    tracing::debug!(?config, "Configuration loaded");

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let secrets = Arc::new(EnvSecretStore::from_env());
    let api_key = secrets.api_key();

    let resolver = CredentialResolver::new(
        Arc::new(JsonTokenStore::new(&config.token_file)),
        Arc::new(InstalledAppFlow::new(
            &config.client_secret_file,
            &[ADMIN_SCOPE],
        )),
        secrets,
        Arc::new(GoogleDriveConnector::new()),
        Arc::clone(&clock),
    );
    let documents = CachedDocuments::new(DocumentFetcher::new(resolver), clock);

    let ai_service = AiService::new(
        GeminiClient::new(),
        AiConfig {
            model: config.model.clone(),
            assistant_name: config.assistant_name.clone(),
        },
    );

    let session = ChatSession::new(documents, ai_service, config.folder_id.clone(), api_key);

    // ========================================================================
    // CHAT LOOP
    // ========================================================================

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    chat::run(session, &config.class_title, stdin, tokio::io::stdout()).await
}

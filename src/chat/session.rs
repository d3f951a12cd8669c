use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::core::ai::{AiProvider, AiService, ConversationState, TurnOutcome};
use crate::core::auth::{AccessResolver, AuthError, DriveAccess};
use crate::core::drive::{CachedDocuments, DriveError, FetchOutcome, KnowledgeBase};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("this action needs admin access")]
    AdminOnly,

    #[error("no Drive credentials available")]
    NoDriveAccess,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Drive(#[from] DriveError),
}

/// State of one terminal chat: the loaded documents, the API key and the
/// transcript.
///
/// The knowledge base is loaded explicitly (at startup and on refresh) and
/// then reused for every question until the next load.
pub struct ChatSession<R: AccessResolver, P: AiProvider> {
    documents: CachedDocuments<R>,
    ai: AiService<P>,
    folder_id: String,
    api_key: Option<String>,
    state: ConversationState,
    knowledge_base: KnowledgeBase,
}

impl<R: AccessResolver, P: AiProvider> ChatSession<R, P> {
    pub fn new(
        documents: CachedDocuments<R>,
        ai: AiService<P>,
        folder_id: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            documents,
            ai,
            folder_id: folder_id.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            state: ConversationState::new(),
            knowledge_base: KnowledgeBase::empty(),
        }
    }

    pub fn assistant_name(&self) -> &str {
        &self.ai.config().assistant_name
    }

    #[cfg(test)]
    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.knowledge_base
    }

    pub fn transcript(&self) -> &ConversationState {
        &self.state
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn set_api_key(&mut self, key: impl Into<String>) {
        let key = key.into();
        self.api_key = Some(key.trim().to_string()).filter(|k| !k.is_empty());
    }

    /// Loads the folder (from cache when fresh) and makes it the active
    /// knowledge base. On a credential error the previous one is kept.
    pub async fn load(&mut self) -> Result<Arc<FetchOutcome>, AuthError> {
        let outcome = self.documents.load(&self.folder_id).await?;
        self.activate(&outcome);
        Ok(outcome)
    }

    /// Same as [`load`](Self::load) with credentials that were already resolved.
    pub async fn load_with(&mut self, access: &DriveAccess) -> Arc<FetchOutcome> {
        let outcome = self.documents.load_with(&self.folder_id, access).await;
        self.activate(&outcome);
        outcome
    }

    fn activate(&mut self, outcome: &FetchOutcome) {
        self.knowledge_base = outcome.knowledge_base();
        if self.knowledge_base.is_empty() {
            tracing::warn!("Knowledge base is empty");
        } else {
            tracing::info!(
                documents = ?self.knowledge_base.names(),
                "Knowledge base has {} document(s)",
                self.knowledge_base.len()
            );
        }
    }

    /// Clears the cache and loads again.
    pub async fn refresh(&mut self) -> Result<Arc<FetchOutcome>, AuthError> {
        self.documents.invalidate_all();
        self.load().await
    }

    pub async fn ask(&mut self, question: &str) -> TurnOutcome {
        let state = std::mem::take(&mut self.state);
        let (state, outcome) = self
            .ai
            .take_turn(state, question, self.api_key.as_deref(), &self.knowledge_base)
            .await;
        self.state = state;
        outcome
    }

    pub async fn access(&self) -> Result<DriveAccess, AuthError> {
        self.documents.fetcher().resolver().resolve().await
    }

    /// Checked on every call; credentials can change while the chat runs.
    pub async fn is_admin(&self) -> bool {
        match self.access().await {
            Ok(access) => access.is_admin(),
            Err(e) => {
                tracing::debug!("Treating session as non-admin: {}", e);
                false
            }
        }
    }

    /// Uploads a local file into the folder. Admin mode only.
    ///
    /// The cache is cleared afterwards so the next load lists the new file.
    pub async fn upload(&self, path: &Path) -> Result<String, SessionError> {
        let access = self.access().await?;
        if !access.mode().can_upload() {
            return Err(SessionError::AdminOnly);
        }
        let drive = access.handle().ok_or(SessionError::NoDriveAccess)?;

        let id = drive.upload(path, &self.folder_id).await?;
        self.documents.invalidate_all();
        Ok(id)
    }
}

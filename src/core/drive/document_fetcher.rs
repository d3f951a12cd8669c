// ============================================================================
// DOCUMENT FETCHER
// ============================================================================
// Turns the contents of a Drive folder into a `KnowledgeBase`.
//
// Credential errors propagate to the caller. Listing errors and per-file
// download errors do not: they are reported through `FetchOutcome` so the
// caller can show them and carry on with whatever was fetched.

use super::drive_models::{
    DocumentRecord, DriveError, DriveHandle, KnowledgeBase, RemoteFile, MAX_DOCUMENTS,
};
use crate::core::auth::{AccessResolver, AuthError, DriveAccess};

/// A file that was selected but could not be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

/// What a fetch produced.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// No storage handle could be obtained.
    NoAccess,
    /// The folder listing itself failed; nothing was downloaded.
    ListingFailed(DriveError),
    /// Every selected file was downloaded.
    Complete(KnowledgeBase),
    /// Some files failed to download and were left out.
    Partial {
        documents: KnowledgeBase,
        skipped: Vec<SkippedFile>,
    },
}

impl FetchOutcome {
    /// The fetched documents; empty for the failure variants.
    pub fn knowledge_base(&self) -> KnowledgeBase {
        match self {
            FetchOutcome::Complete(kb) => kb.clone(),
            FetchOutcome::Partial { documents, .. } => documents.clone(),
            FetchOutcome::NoAccess | FetchOutcome::ListingFailed(_) => KnowledgeBase::empty(),
        }
    }

    pub fn skipped(&self) -> &[SkippedFile] {
        match self {
            FetchOutcome::Partial { skipped, .. } => skipped,
            _ => &[],
        }
    }
}

/// Sorts by name, drops placeholders and keeps the first [`MAX_DOCUMENTS`].
pub fn select_files(mut files: Vec<RemoteFile>) -> Vec<RemoteFile> {
    // `sort_by` is stable, so equal names keep their listing order.
    files.sort_by(|a, b| a.name.cmp(&b.name));
    files
        .into_iter()
        .filter(|f| !f.is_placeholder())
        .take(MAX_DOCUMENTS)
        .collect()
}

pub struct DocumentFetcher<R: AccessResolver> {
    resolver: R,
}

impl<R: AccessResolver> DocumentFetcher<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Lists and downloads the documents in `folder_id`.
    pub async fn fetch_all(&self, folder_id: &str) -> Result<FetchOutcome, AuthError> {
        let access = self.resolver.resolve().await?;
        Ok(self.fetch_with(folder_id, &access).await)
    }

    /// Lists and downloads with credentials the caller already resolved.
    pub async fn fetch_with(&self, folder_id: &str, access: &DriveAccess) -> FetchOutcome {
        let Some(drive) = access.handle() else {
            tracing::warn!(mode = %access.mode(), "No Drive handle available, skipping fetch");
            return FetchOutcome::NoAccess;
        };

        let files = match drive.list(folder_id).await {
            Ok(files) => files,
            Err(e) => {
                tracing::error!("Failed to list folder {}: {}", folder_id, e);
                return FetchOutcome::ListingFailed(e);
            }
        };

        if files.is_empty() {
            tracing::info!("Folder {} is empty", folder_id);
            return FetchOutcome::Complete(KnowledgeBase::empty());
        }

        let listed = files.len();
        let selected = select_files(files);
        tracing::debug!("Listed {} entries, downloading {}", listed, selected.len());

        download_selected(drive, selected).await
    }
}

/// Downloads files one after another. A failure only loses that file.
async fn download_selected(drive: &DriveHandle, files: Vec<RemoteFile>) -> FetchOutcome {
    let mut documents = Vec::with_capacity(files.len());
    let mut skipped = Vec::new();

    for file in files {
        match drive.download(&file.id).await {
            Ok(data) => {
                tracing::debug!("Downloaded '{}' ({} bytes)", file.name, data.len());
                documents.push(DocumentRecord {
                    name: file.name,
                    data,
                    mime: file.mime_type,
                });
            }
            Err(e) => {
                tracing::warn!("Skipping '{}': {}", file.name, e);
                skipped.push(SkippedFile {
                    name: file.name,
                    reason: e.to_string(),
                });
            }
        }
    }

    let documents = KnowledgeBase::new(documents);
    if skipped.is_empty() {
        FetchOutcome::Complete(documents)
    } else {
        FetchOutcome::Partial { documents, skipped }
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Maximum number of documents kept in a knowledge base.
pub const MAX_DOCUMENTS: usize = 15;

/// Drive-native types (folders, Docs, Sheets...) all share this prefix and
/// cannot be downloaded as raw bytes.
pub const NATIVE_MIME_PREFIX: &str = "application/vnd.google-apps";

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// An entry from a folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

impl RemoteFile {
    /// Folders and native-format references have no downloadable content.
    pub fn is_placeholder(&self) -> bool {
        self.mime_type.contains(NATIVE_MIME_PREFIX)
    }
}

/// A downloaded file, ready to be attached to a model request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub name: String,
    pub data: Vec<u8>,
    pub mime: String,
}

/// The documents used as grounding for every question, ordered by name.
///
/// Built in one go by the fetcher and never edited afterwards; a refresh
/// replaces the whole value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeBase {
    documents: Vec<DocumentRecord>,
}

impl KnowledgeBase {
    /// Builds a knowledge base, keeping at most [`MAX_DOCUMENTS`] records.
    pub fn new(mut documents: Vec<DocumentRecord>) -> Self {
        documents.truncate(MAX_DOCUMENTS);
        Self { documents }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> &[DocumentRecord] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.documents.iter().map(|d| d.name.as_str()).collect()
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum DriveError {
    #[error("Drive API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Local file error: {0}")]
    Io(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),
}

// ============================================================================
// STORAGE SERVICE TRAIT (PORT)
// ============================================================================

/// The subset of the remote storage service the application needs.
#[async_trait]
pub trait DriveService: Send + Sync {
    /// Lists every non-trashed child of `parent_id`.
    async fn list(&self, parent_id: &str) -> Result<Vec<RemoteFile>, DriveError>;

    /// Downloads the full content of a file.
    async fn download(&self, file_id: &str) -> Result<Vec<u8>, DriveError>;

    /// Uploads a local file into `parent_id` and returns the new file id.
    async fn upload(&self, path: &Path, parent_id: &str) -> Result<String, DriveError>;
}

/// An authenticated storage handle, shared between the resolver's callers.
pub type DriveHandle = Arc<dyn DriveService>;

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> DocumentRecord {
        DocumentRecord {
            name: name.to_string(),
            data: vec![1, 2, 3],
            mime: "application/pdf".to_string(),
        }
    }

    #[test]
    fn test_placeholder_detection() {
        let folder = RemoteFile {
            id: "1".to_string(),
            name: "Photos".to_string(),
            mime_type: "application/vnd.google-apps.folder".to_string(),
        };
        let doc = RemoteFile {
            id: "2".to_string(),
            name: "Trip.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
        };

        assert!(folder.is_placeholder());
        assert!(!doc.is_placeholder());
    }

    #[test]
    fn test_knowledge_base_is_capped() {
        let docs: Vec<DocumentRecord> = (0..20).map(|i| record(&format!("doc{:02}", i))).collect();
        let kb = KnowledgeBase::new(docs);

        assert_eq!(kb.len(), MAX_DOCUMENTS);
        assert_eq!(kb.names().last(), Some(&"doc14"));
    }

    #[test]
    fn test_remote_file_deserializes_drive_fields() {
        let json = r#"{"id":"abc","name":"Notice.pdf","mimeType":"application/pdf"}"#;
        let file: RemoteFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.mime_type, "application/pdf");
    }
}

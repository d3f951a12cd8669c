pub mod document_cache;
pub mod document_fetcher;
pub mod drive_models;

pub use document_cache::CachedDocuments;
pub use document_fetcher::{DocumentFetcher, FetchOutcome};
pub use drive_models::{DriveError, DriveHandle, DriveService, KnowledgeBase, RemoteFile};

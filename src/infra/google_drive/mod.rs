// Google Drive v3 access for the document fetcher and admin uploads.

pub mod connector;
pub mod drive_client;

pub use connector::GoogleDriveConnector;

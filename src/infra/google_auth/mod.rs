// =============================================================================
// GOOGLE AUTH MODULE
// =============================================================================
//
// Concrete credential sources for the two Drive access modes:
// - Admin: installed-app OAuth (`InstalledAppFlow`) with the resulting token
//   persisted by `JsonTokenStore`.
// - Viewer: a service account key (`ServiceAccountAuth`).

pub mod installed_flow;
pub mod service_account;
pub mod token_store;

pub use installed_flow::InstalledAppFlow;
pub use service_account::ServiceAccountAuth;
pub use token_store::JsonTokenStore;

/// Full Drive access, required for uploads.
pub const ADMIN_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Read-only Drive access for the public deployment.
pub const VIEWER_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

// The infra module contains implementations of core traits.
// Each external system gets its own submodule.

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "google_auth/mod.rs"]
pub mod google_auth;

#[path = "google_drive/mod.rs"]
pub mod google_drive;

#[path = "secrets/mod.rs"]
pub mod secrets;

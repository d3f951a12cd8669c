// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "auth/mod.rs"]
pub mod auth;

#[path = "clock.rs"]
pub mod clock;

#[path = "drive/mod.rs"]
pub mod drive;

//! HTTP boundary for the Flowlink dispatcher.
//!
//! Exposes the run entrypoint, enforces the two-path authorization
//! sequencing before any state access, and converts every internal fault
//! into the `{ok:false, error}` response shape.

pub mod auth;
pub mod config;
pub mod routes;

pub use auth::{AuthError, DispatchAuth, StaticWorkspaceAccess, WorkspaceAccess};
pub use config::AppConfig;
pub use routes::{build_router, AppState};

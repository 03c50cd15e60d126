//! Sync-run orchestration core.
//!
//! Resolves a configured sync link, reconstructs its checkpoint state and
//! configured catalog, materializes live credentials, and issues exactly one
//! read dispatch to the external execution service.

pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod state;
pub mod urls;

pub use credentials::{CredentialError, CredentialResolver, StaticCredentialResolver};
pub use dispatcher::{Dispatcher, RunOutcome, RunResponse};
pub use error::DispatchError;
pub use executor::{ExecutionService, HttpExecutionClient, ReadAck, ReadRequest};
pub use state::load_checkpoint_state;
pub use urls::RunUrls;

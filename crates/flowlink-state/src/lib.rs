//! Persistence for the Flowlink dispatcher.
//!
//! Provides the [`ConfigStore`] and [`StateBackend`] traits and a
//! [`SqliteStateBackend`] implementation covering sync links, service
//! configs, checkpoint state rows, captured catalogs, and task records.

#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod sqlite;

pub use backend::{ConfigStore, StateBackend, StateRow};
pub use error::StateError;
pub use sqlite::SqliteStateBackend;

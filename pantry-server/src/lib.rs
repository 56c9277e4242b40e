//! # pantry-server
//!
//! The embedded configuration server that `pantry start` runs in the
//! foreground (or as a daemon) and that sandbox uploads are pushed into.
//!
//! The server itself is a collaborator behind the [`ConfigServer`] trait;
//! [`ZeroServer`] is the built-in HTTP implementation, backed by any
//! [`DataStore`] (in-memory [`MemoryStore`] by default).

mod api;
pub mod error;
pub mod server;
pub mod store;

pub use error::ServerError;
pub use server::{ConfigServer, ZeroServer};
pub use store::{DataStore, MemoryStore, PutOutcome};

//! # pantry-sandbox
//!
//! Stages configuration content on disk and pushes it to a running pantry
//! server.
//!
//! - [`InstanceSandbox`]: files consumed by the agent under test.
//! - [`ServerSandbox`]: the tree uploaded to the server, plus
//!   [`ServerSandbox::upload`] which mints a throwaway credential and drives
//!   an [`UploadClient`].
//! - [`Provisioner`]: the whole orchestration step for one test run.

pub mod credential;
pub mod error;
pub mod instance;
pub mod provision;
pub mod render;
pub mod server_sandbox;
pub mod stage;
pub mod upload;

pub use credential::{Credential, CredentialMinter};
pub use error::SandboxError;
pub use instance::{InstanceReport, InstanceSandbox};
pub use provision::{ProvisionReport, Provisioner};
pub use render::{ConfigRenderer, Settings};
pub use server_sandbox::ServerSandbox;
pub use stage::{prepare, StageResult, UnitReport};
pub use upload::{HttpUploadClient, UploadClient, UploadSettings, UploadSummary, WorkingDirGuard};

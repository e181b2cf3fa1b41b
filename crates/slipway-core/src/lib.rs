//! Core building blocks for the slipway release pipeline
//!
//! This crate carries the pieces every other slipway crate leans on: the
//! error taxonomy, the release configuration, the run context, the external
//! command runner and the rollback ledger.

pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod preflight;
pub mod rollback;

pub use command::{CommandOutput, CommandRunner};
pub use config::{load_config, ReleaseConfig};
pub use context::{IncrementKind, ReleaseEnv, RunContext, SentryTarget};
pub use error::{ReleaseError, Result};
pub use rollback::{RollbackManager, RollbackReport, RollbackStep};

//! Artifact packaging for slipway: Xcode archive/export, the deep-clean and
//! code-sign state machine, disk image assembly and notarization.

pub mod archive;
pub mod dmg;
pub mod error;
pub mod notarize;
pub mod sign;
pub mod verify;

pub use archive::ArtifactBuilder;
pub use dmg::DiskImageBuilder;
pub use error::{PackagingError, Result};
pub use notarize::{parse_submission_response, summarize_log_issues, Notarizer};
pub use sign::{find_signing_identity, plan_nested_signing, CodeSigner, SignPhase};
pub use verify::{verify_release, Verification};

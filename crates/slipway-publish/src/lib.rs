//! Publication steps for a finished release: git commit/tag/push, the
//! hosted GitHub release, and best-effort debug-symbol upload.

pub mod error;
pub mod git;
pub mod github;
pub mod symbols;

pub use error::{PublishError, Result};
pub use git::{commit_message, GitPublisher, RELEASE_BRANCH};
pub use github::{parse_release_url, GithubReleaser};
pub use symbols::{create_dsyms_zip, dsyms_dir, upload_dsyms, SymbolOutcome};

//! Version reading, bumping and descriptor rewriting for slipway
//!
//! The project descriptor (pbxproj) is mutated with a brace-matching block
//! scanner rather than a full parser; see [`descriptor`] for why.

pub mod bump;
pub mod descriptor;
pub mod types;

pub use bump::{compute_next, is_valid_marketing_version};
pub use descriptor::{read_current, read_file, rewrite, scan_blocks, write_file, SettingsBlock};
pub use types::VersionPair;

//! Sparkle update feed support
//!
//! Covers the two Sparkle-facing steps of a release: producing the EdDSA
//! enclosure signature with the vendored sign_update tool, and inserting the
//! new release item into appcast.xml.

pub mod appcast;
pub mod error;
pub mod signature;

pub use appcast::{format_pub_date, insert_entry, update_feed, FeedEntry, APPCAST_PATH};
pub use error::{FeedError, Result, SigningError};
pub use signature::{
    classify_keychain_failure, parse_signature_output, KeychainFailure, SparkleSignature,
    UpdateSigner,
};

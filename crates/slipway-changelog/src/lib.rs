//! Changelog processing for slipway: Unreleased-section promotion and
//! HTML release-note rendering for the update feed.

pub mod html;
pub mod promote;

pub use html::{render_document, render_fragment};
pub use promote::{extract_unreleased, promote, promote_file, UNRELEASED_HEADER};

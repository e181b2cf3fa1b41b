//! Brace-scoped reading and rewriting of the Xcode project descriptor
//!
//! The pbxproj format has no stable published grammar, so the version fields
//! are located by scanning for `buildSettings = {` blocks and matching braces
//! by depth. A naive global regex replace would corrupt unrelated blocks
//! that carry the same field names under different bundle identifiers; the
//! scanner re-derives exact block boundaries for every read and write.

use std::path::Path;

use regex::Regex;
use tracing::{debug, info};

use slipway_core::error::{Result, VersionError};
use slipway_core::RollbackManager;

use crate::types::VersionPair;

/// One `buildSettings = { ... }` block located in the descriptor text.
/// `start` is the byte index just after the opening brace, `end` the index
/// of the matching closing brace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsBlock {
    pub start: usize,
    pub end: usize,
}

impl SettingsBlock {
    /// The block's interior text.
    pub fn body<'a>(&self, content: &'a str) -> &'a str {
        &content[self.start..self.end]
    }
}

/// Locate every build-settings block in the descriptor.
///
/// Braces may nest (build settings hold array and dictionary values), so the
/// end of a block is found by walking forward from the opening brace with a
/// depth counter. A brace that never closes is a fatal error.
pub fn scan_blocks(content: &str) -> Result<Vec<SettingsBlock>> {
    let header = Regex::new(r"buildSettings\s*=\s*\{").unwrap();
    let bytes = content.as_bytes();
    let mut blocks = Vec::new();

    for m in header.find_iter(content) {
        let open = m.end() - 1;
        let mut depth = 1usize;
        let mut pos = open + 1;

        while pos < bytes.len() && depth > 0 {
            match bytes[pos] {
                b'{' => depth += 1,
                b'}' => depth -= 1,
                _ => {}
            }
            pos += 1;
        }

        if depth != 0 {
            return Err(VersionError::MalformedDescriptor(open).into());
        }
        blocks.push(SettingsBlock {
            start: open + 1,
            end: pos - 1,
        });
    }

    Ok(blocks)
}

fn block_matches(body: &str, bundle_identifier: &str) -> bool {
    body.contains(&format!(
        "PRODUCT_BUNDLE_IDENTIFIER = {bundle_identifier};"
    ))
}

fn extract_pair(body: &str) -> Option<VersionPair> {
    let build_re = Regex::new(r"CURRENT_PROJECT_VERSION = (\d+);").unwrap();
    let marketing_re = Regex::new(r"MARKETING_VERSION = ([\d.]+);").unwrap();

    let build = build_re.captures(body)?.get(1)?.as_str().parse().ok()?;
    let marketing = marketing_re.captures(body)?.get(1)?.as_str().to_string();
    Some(VersionPair { build, marketing })
}

/// Read the current version pair for a bundle identifier from descriptor
/// text. The first matching block that yields both fields wins.
pub fn read_current(content: &str, bundle_identifier: &str) -> Result<VersionPair> {
    for block in scan_blocks(content)? {
        let body = block.body(content);
        if !block_matches(body, bundle_identifier) {
            continue;
        }
        if let Some(pair) = extract_pair(body) {
            debug!(bundle = bundle_identifier, version = %pair, "read current version");
            return Ok(pair);
        }
    }

    Err(VersionError::NotFound(bundle_identifier.to_string()).into())
}

/// Rewrite the two version fields inside every block matching the bundle
/// identifier, leaving all other blocks byte-identical.
pub fn rewrite(content: &str, bundle_identifier: &str, new: &VersionPair) -> Result<String> {
    let build_re = Regex::new(r"CURRENT_PROJECT_VERSION = \d+;").unwrap();
    let marketing_re = Regex::new(r"MARKETING_VERSION = [\d.]+;").unwrap();

    let mut updated = content.to_string();
    let mut offset = 0i64;

    for block in scan_blocks(content)? {
        let body = block.body(content);
        if !block_matches(body, bundle_identifier) {
            continue;
        }

        let new_body = build_re.replace_all(
            body,
            format!("CURRENT_PROJECT_VERSION = {};", new.build).as_str(),
        );
        let new_body = marketing_re.replace_all(
            &new_body,
            format!("MARKETING_VERSION = {};", new.marketing).as_str(),
        );

        let start = (block.start as i64 + offset) as usize;
        let end = (block.end as i64 + offset) as usize;
        updated.replace_range(start..end, &new_body);
        offset += new_body.len() as i64 - body.len() as i64;
    }

    Ok(updated)
}

/// Read the current version pair from a descriptor file.
pub fn read_file(path: &Path, bundle_identifier: &str) -> Result<VersionPair> {
    let content = std::fs::read_to_string(path).map_err(VersionError::Io)?;
    read_current(&content, bundle_identifier)
}

/// Rewrite the version fields in a descriptor file, backing it up first.
pub fn write_file(
    path: &Path,
    bundle_identifier: &str,
    new: &VersionPair,
    rollback: &mut RollbackManager,
) -> Result<()> {
    rollback.backup(path).map_err(VersionError::Io)?;

    let content = std::fs::read_to_string(path).map_err(VersionError::Io)?;
    let updated = rewrite(&content, bundle_identifier, new)?;
    std::fs::write(path, updated).map_err(VersionError::Io)?;

    info!(path = %path.display(), version = %new, "updated project versions");
    Ok(())
}

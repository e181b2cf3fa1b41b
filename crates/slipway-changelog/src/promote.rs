//! Promotion of the "Unreleased" changelog section into a versioned one

use std::path::Path;

use tracing::{debug, info};

use slipway_core::error::{ChangelogError, Result};
use slipway_core::RollbackManager;
use slipway_version::VersionPair;

/// Sentinel header accumulating pending notes between releases.
pub const UNRELEASED_HEADER: &str = "## Unreleased";

/// Extract the body of the "Unreleased" section: everything between the
/// sentinel header and the next second-level header (or end of document).
/// The returned text is trimmed for rendering; [`promote`] preserves the
/// original block, blank lines included, in the rewritten document.
pub fn extract_unreleased(document: &str) -> Result<String> {
    let start = document
        .find(UNRELEASED_HEADER)
        .ok_or(ChangelogError::MissingSection)?;

    let body_start = start + UNRELEASED_HEADER.len();
    let body = &document[body_start..];
    let body = match body.find("\n## ") {
        Some(end) => &body[..end],
        None => body,
    };

    Ok(body.trim().to_string())
}

/// Rewrite the document so the just-released notes sit under a versioned
/// header and a fresh empty "Unreleased" section leads the file.
///
/// The first sentinel header becomes `## Version X.Y.Z (N)`, then a new
/// empty sentinel is inserted immediately above it. The result is always:
/// empty Unreleased section first, just-released section second, history
/// unchanged and ordered after.
pub fn promote(document: &str, version: &VersionPair) -> Result<String> {
    if !document.contains(UNRELEASED_HEADER) {
        return Err(ChangelogError::MissingSection.into());
    }

    let versioned_header = format!("## {}", version.header());
    let updated = document.replacen(UNRELEASED_HEADER, &versioned_header, 1);

    let mut lines: Vec<&str> = updated.split('\n').collect();
    for i in 0..lines.len() {
        if lines[i].trim() == versioned_header {
            lines.insert(i, UNRELEASED_HEADER);
            lines.insert(i + 1, "");
            break;
        }
    }

    debug!(header = %versioned_header, "promoted unreleased section");
    Ok(lines.join("\n"))
}

/// Promote the changelog file in place, backing it up first. Returns the
/// extracted release-note text.
pub fn promote_file(
    path: &Path,
    version: &VersionPair,
    rollback: &mut RollbackManager,
) -> Result<String> {
    rollback.backup(path).map_err(ChangelogError::Io)?;

    let content = std::fs::read_to_string(path).map_err(ChangelogError::Io)?;
    let items = extract_unreleased(&content)?;
    let updated = promote(&content, version)?;
    std::fs::write(path, updated).map_err(ChangelogError::Io)?;

    info!(path = %path.display(), version = %version, "changelog promoted");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slipway_core::error::ReleaseError;

    const DOCUMENT: &str = "\
# Changelog

## Unreleased
- a
- b

## Version 1.0.0 (1)
- shipped earlier
";

    #[test]
    fn test_extract_unreleased_items() {
        assert_eq!(extract_unreleased(DOCUMENT).unwrap(), "- a\n- b");
    }

    #[test]
    fn test_extract_last_section() {
        let doc = "# Changelog\n\n## Unreleased\n- only\n";
        assert_eq!(extract_unreleased(doc).unwrap(), "- only");
    }

    #[test]
    fn test_extract_missing_section() {
        let err = extract_unreleased("# Changelog\n\n## Version 1.0.0 (1)\n").unwrap_err();
        assert!(matches!(
            err,
            ReleaseError::Changelog(ChangelogError::MissingSection)
        ));
    }

    #[test]
    fn test_promote_section_ordering() {
        let updated = promote(DOCUMENT, &VersionPair::new(2, "1.1.0")).unwrap();

        let headers: Vec<&str> = updated
            .lines()
            .filter(|l| l.starts_with("## "))
            .collect();
        assert_eq!(
            headers,
            vec!["## Unreleased", "## Version 1.1.0 (2)", "## Version 1.0.0 (1)"]
        );

        // The fresh Unreleased section is empty; the released items moved
        // under the versioned header; history is untouched.
        let unreleased_pos = updated.find("## Unreleased").unwrap();
        let versioned_pos = updated.find("## Version 1.1.0 (2)").unwrap();
        assert!(unreleased_pos < versioned_pos);
        let between = &updated[unreleased_pos + "## Unreleased".len()..versioned_pos];
        assert!(between.trim().is_empty());
        assert!(updated.contains("## Version 1.1.0 (2)\n- a\n- b"));
        assert!(updated.contains("## Version 1.0.0 (1)\n- shipped earlier"));
    }

    #[test]
    fn test_promote_missing_section() {
        assert!(promote("# nothing here\n", &VersionPair::new(2, "1.1.0")).is_err());
    }

    #[test]
    fn test_promote_file_backs_up() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("CHANGELOG.md");
        std::fs::write(&path, DOCUMENT).unwrap();

        let mut rollback = RollbackManager::new();
        let items = promote_file(&path, &VersionPair::new(2, "1.1.0"), &mut rollback).unwrap();
        assert_eq!(items, "- a\n- b");

        rollback.rollback();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), DOCUMENT);
    }
}

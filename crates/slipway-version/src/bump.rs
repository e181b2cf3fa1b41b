//! Version increment computation

use regex::Regex;

use slipway_core::error::{Result, VersionError};
use slipway_core::IncrementKind;

use crate::types::VersionPair;

/// True if the marketing version matches the strict MAJOR.MINOR.PATCH shape.
/// Pre-release suffixes and `v` prefixes are deliberately rejected; the
/// descriptor only ever carries plain numeric triples.
pub fn is_valid_marketing_version(version: &str) -> bool {
    Regex::new(r"^\d+\.\d+\.\d+$").unwrap().is_match(version)
}

/// Compute the next version pair for the requested increment kind.
///
/// `skip` is the identity and performs no validation, so a release can be
/// re-cut against whatever the descriptor currently holds. The build counter
/// moves by 1, 10 or 100 so the increment kind stays readable in the counter
/// history.
pub fn compute_next(current: &VersionPair, kind: IncrementKind) -> Result<VersionPair> {
    if kind == IncrementKind::Skip {
        return Ok(current.clone());
    }

    if !is_valid_marketing_version(&current.marketing) {
        return Err(VersionError::InvalidFormat(current.marketing.clone()).into());
    }

    let mut parts = current.marketing.split('.').map(|p| p.parse::<u64>());
    let (major, minor, patch) = match (parts.next(), parts.next(), parts.next()) {
        (Some(Ok(major)), Some(Ok(minor)), Some(Ok(patch))) => (major, minor, patch),
        _ => return Err(VersionError::InvalidFormat(current.marketing.clone()).into()),
    };

    let next = match kind {
        IncrementKind::Major => VersionPair::new(current.build + 100, format!("{}.0.0", major + 1)),
        IncrementKind::Minor => {
            VersionPair::new(current.build + 10, format!("{major}.{}.0", minor + 1))
        }
        IncrementKind::Patch => {
            VersionPair::new(current.build + 1, format!("{major}.{minor}.{}", patch + 1))
        }
        IncrementKind::Skip => unreachable!(),
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slipway_core::error::ReleaseError;

    #[test]
    fn test_skip_is_identity() {
        let current = VersionPair::new(41, "2.3.0");
        let next = compute_next(&current, IncrementKind::Skip).unwrap();
        assert_eq!(next, current);
    }

    #[test]
    fn test_patch_bump() {
        let next = compute_next(&VersionPair::new(41, "2.3.0"), IncrementKind::Patch).unwrap();
        assert_eq!(next, VersionPair::new(42, "2.3.1"));
    }

    #[test]
    fn test_minor_bump_resets_patch() {
        let next = compute_next(&VersionPair::new(41, "2.3.7"), IncrementKind::Minor).unwrap();
        assert_eq!(next, VersionPair::new(51, "2.4.0"));
    }

    #[test]
    fn test_major_bump_resets_minor_and_patch() {
        let next = compute_next(&VersionPair::new(41, "2.3.7"), IncrementKind::Major).unwrap();
        assert_eq!(next, VersionPair::new(141, "3.0.0"));
    }

    #[test]
    fn test_two_part_version_rejected() {
        let err = compute_next(&VersionPair::new(1, "1.2"), IncrementKind::Patch).unwrap_err();
        assert!(matches!(
            err,
            ReleaseError::Version(VersionError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_v_prefix_rejected() {
        for kind in [IncrementKind::Major, IncrementKind::Minor, IncrementKind::Patch] {
            assert!(compute_next(&VersionPair::new(1, "v1.2.3"), kind).is_err());
        }
    }

    #[test]
    fn test_skip_accepts_nonconforming_version() {
        // Skip never validates; it re-releases whatever is in the descriptor.
        let current = VersionPair::new(1, "1.2");
        assert_eq!(compute_next(&current, IncrementKind::Skip).unwrap(), current);
    }

    #[test]
    fn test_valid_pattern() {
        assert!(is_valid_marketing_version("0.0.0"));
        assert!(is_valid_marketing_version("12.34.56"));
        assert!(!is_valid_marketing_version("1.2"));
        assert!(!is_valid_marketing_version("1.2.3-beta"));
        assert!(!is_valid_marketing_version("1.2.3.4"));
    }
}

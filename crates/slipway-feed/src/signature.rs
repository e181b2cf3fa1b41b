//! Sparkle EdDSA update signing
//!
//! Runs the vendored `sign_update` tool against the finished disk image and
//! extracts the `sparkle:edSignature` and `length` attributes from its
//! output. Keychain access failures are classified so the operator gets
//! actionable guidance instead of a raw macOS error code.

use std::path::Path;

use regex::Regex;
use tracing::{debug, info};

use slipway_core::error::CommandError;
use slipway_core::preflight::SIGN_UPDATE_PATH;
use slipway_core::CommandRunner;

use crate::error::SigningError;

/// Marker string sign_update prints when the EdDSA private key is
/// unreachable, regardless of the underlying Security framework code.
const KEYCHAIN_MARKER: &str = "Unable to access required key in the Keychain";

/// Signature attributes for one enclosure, as printed by sign_update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparkleSignature {
    pub ed_signature: String,
    pub length: u64,
}

/// Classified Keychain failure from sign_update, mapped from the Security
/// framework error code embedded in the tool's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeychainFailure {
    /// errSecAuthFailed (-60008): the keychain holding the key is not the
    /// default keychain, or it locked again after being unlocked.
    AuthenticationFailed,
    /// errSecItemNotFound (-25300): no EdDSA private key in any unlocked
    /// keychain.
    ItemNotFound,
    /// The key exists but its Access Control list does not admit
    /// sign_update.
    AccessDenied,
}

impl KeychainFailure {
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::AuthenticationFailed => Some(-60008),
            Self::ItemNotFound => Some(-25300),
            Self::AccessDenied => None,
        }
    }

    /// Operator-facing remediation steps, printed alongside the error.
    pub fn guidance(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => {
                "Error -60008: Authentication failed. The keychain holding the \
                 Sparkle EdDSA key is likely not the default keychain, or it was \
                 locked again after unlocking. Check Keychain Access for the key, \
                 move it to the default keychain (or set its keychain as default \
                 temporarily), and make sure its Access Control allows \
                 'sign_update' to use it."
            }
            Self::ItemNotFound => {
                "Error -25300: Item not found. The Sparkle EdDSA private key was \
                 not found in any unlocked keychain. Generate a Sparkle EdDSA key \
                 pair and import the private key."
            }
            Self::AccessDenied => {
                "Open Keychain Access, find the Sparkle EdDSA private key \
                 (usually 'Private key for signing Sparkle updates'), open its \
                 Access Control tab and either allow all applications or add \
                 'sign_update' to the allowed list, then save."
            }
        }
    }
}

impl std::fmt::Display for KeychainFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthenticationFailed => write!(f, "authentication failed, code -60008"),
            Self::ItemNotFound => write!(f, "item not found, code -25300"),
            Self::AccessDenied => write!(f, "access control denied"),
        }
    }
}

/// Classify a failed sign_update run. Returns None when the failure is not
/// a Keychain access problem.
pub fn classify_keychain_failure(output: &str) -> Option<KeychainFailure> {
    if !output.contains(KEYCHAIN_MARKER) {
        return None;
    }
    if output.contains("-60008") {
        Some(KeychainFailure::AuthenticationFailed)
    } else if output.contains("-25300") {
        Some(KeychainFailure::ItemNotFound)
    } else {
        Some(KeychainFailure::AccessDenied)
    }
}

/// Extract the signature and enclosure length from sign_update stdout.
///
/// The tool prints a ready-to-paste attribute fragment of the form
/// `sparkle:edSignature="..." length="..."`.
pub fn parse_signature_output(output: &str) -> Result<SparkleSignature, SigningError> {
    let sig_re = Regex::new(r#"sparkle:edSignature="([^"]+)""#).unwrap();
    let len_re = Regex::new(r#"length="(\d+)""#).unwrap();

    let out = output.trim();
    let signature = sig_re.captures(out).map(|c| c[1].to_string());
    let length = len_re
        .captures(out)
        .and_then(|c| c[1].parse::<u64>().ok());

    match (signature, length) {
        (Some(ed_signature), Some(length)) => Ok(SparkleSignature {
            ed_signature,
            length,
        }),
        _ => Err(SigningError::Parse(out.to_string())),
    }
}

/// Drives the sign_update tool against a disk image.
#[derive(Debug)]
pub struct UpdateSigner<'a> {
    runner: &'a CommandRunner,
}

impl<'a> UpdateSigner<'a> {
    pub fn new(runner: &'a CommandRunner) -> Self {
        Self { runner }
    }

    /// Sign the disk image and return the enclosure attributes.
    pub async fn sign(&self, dmg_path: &Path) -> Result<SparkleSignature, SigningError> {
        let tool = Path::new(SIGN_UPDATE_PATH);
        if !tool.exists() {
            return Err(SigningError::ToolMissing(tool.to_path_buf()));
        }
        ensure_executable(tool)?;

        debug!(dmg = %dmg_path.display(), "signing update with sign_update");
        let dmg = dmg_path.to_string_lossy();
        let output = self
            .runner
            .run_unchecked(SIGN_UPDATE_PATH, &[&dmg])
            .await?;

        if !output.success {
            // sign_update reports Keychain trouble on stdout.
            let combined = format!("{}{}", output.stdout, output.stderr);
            if let Some(failure) = classify_keychain_failure(&combined) {
                return Err(SigningError::KeychainAccess(failure));
            }
            return Err(SigningError::Tool(
                CommandError::Failed {
                    program: SIGN_UPDATE_PATH.to_string(),
                    code: output.code,
                    stderr: combined,
                }
                .into(),
            ));
        }

        let signature = parse_signature_output(&output.stdout)?;
        info!(length = signature.length, "update signed");
        Ok(signature)
    }
}

fn ensure_executable(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_signature_and_length() {
        let out = r#"sparkle:edSignature="AbCd1234==" length="52428800""#;
        let sig = parse_signature_output(out).unwrap();
        assert_eq!(sig.ed_signature, "AbCd1234==");
        assert_eq!(sig.length, 52428800);
    }

    #[test]
    fn parses_signature_with_surrounding_noise() {
        let out = "\n  sparkle:edSignature=\"xyz\" length=\"42\"  \n";
        let sig = parse_signature_output(out).unwrap();
        assert_eq!(sig.ed_signature, "xyz");
        assert_eq!(sig.length, 42);
    }

    #[test]
    fn rejects_output_missing_length() {
        let out = r#"sparkle:edSignature="xyz""#;
        let err = parse_signature_output(out).unwrap_err();
        assert!(matches!(err, SigningError::Parse(_)));
    }

    #[test]
    fn rejects_garbage_output() {
        assert!(matches!(
            parse_signature_output("no signature here"),
            Err(SigningError::Parse(_))
        ));
    }

    #[test]
    fn classifies_authentication_failure() {
        let out = "Unable to access required key in the Keychain (error -60008)";
        assert_eq!(
            classify_keychain_failure(out),
            Some(KeychainFailure::AuthenticationFailed)
        );
    }

    #[test]
    fn classifies_missing_key() {
        let out = "Unable to access required key in the Keychain: -25300";
        assert_eq!(
            classify_keychain_failure(out),
            Some(KeychainFailure::ItemNotFound)
        );
    }

    #[test]
    fn classifies_access_control_problem() {
        let out = "Unable to access required key in the Keychain";
        assert_eq!(
            classify_keychain_failure(out),
            Some(KeychainFailure::AccessDenied)
        );
    }

    #[test]
    fn ignores_unrelated_failures() {
        assert_eq!(classify_keychain_failure("file not found"), None);
    }

    #[test]
    fn guidance_mentions_error_code() {
        assert!(KeychainFailure::AuthenticationFailed
            .guidance()
            .contains("-60008"));
        assert!(KeychainFailure::ItemNotFound.guidance().contains("-25300"));
    }

    #[test]
    fn keychain_error_message_carries_the_guidance() {
        // The failure report prints the error's Display, so the remediation
        // steps must be part of it.
        let err = SigningError::KeychainAccess(KeychainFailure::AuthenticationFailed);
        let rendered = err.to_string();
        assert!(rendered.contains("code -60008"));
        assert!(rendered.contains(KeychainFailure::AuthenticationFailed.guidance()));

        let err = SigningError::KeychainAccess(KeychainFailure::ItemNotFound);
        assert!(err
            .to_string()
            .contains(KeychainFailure::ItemNotFound.guidance()));
    }
}

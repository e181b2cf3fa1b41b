//! Notarization submission via notarytool
//!
//! The submission itself blocks: notarytool polls Apple's service and only
//! returns on a terminal status or the two-hour timeout. A rejected
//! submission triggers a best-effort fetch of the detailed issue log before
//! the failure is surfaced; the log fetch never masks the rejection.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use slipway_core::CommandRunner;

use crate::error::{PackagingError, Result};

/// Blocking timeout handed to notarytool.
const SUBMIT_TIMEOUT: &str = "2h";

/// Notarization client using a stored keychain profile for credentials.
pub struct Notarizer<'a> {
    runner: &'a CommandRunner,
    notarytool: PathBuf,
    keychain_profile: String,
}

/// Parsed terminal response from a notarytool submission.
#[derive(Debug, Clone)]
pub struct SubmissionResponse {
    pub id: Option<String>,
    pub status: String,
    pub message: String,
}

/// Pull the submission id, status and message out of notarytool's JSON
/// output. Kept separate from process execution so it is unit testable.
pub fn parse_submission_response(json_text: &str) -> Result<SubmissionResponse> {
    let value: serde_json::Value = serde_json::from_str(json_text)
        .map_err(|e| PackagingError::NotarizationResponse(e.to_string()))?;

    let status = value
        .get("status")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown")
        .to_string();
    let message = value
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or("No message provided")
        .to_string();
    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    Ok(SubmissionResponse { id, status, message })
}

impl<'a> Notarizer<'a> {
    pub fn new(
        runner: &'a CommandRunner,
        notarytool: PathBuf,
        keychain_profile: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            notarytool,
            keychain_profile: keychain_profile.into(),
        }
    }

    /// Submit the image and block until a terminal status. On acceptance the
    /// notarization ticket is stapled to the image. Returns the submission
    /// id for the run report, when the response carried one.
    pub async fn notarize(&self, dmg_path: &Path, archive_dir: &Path) -> Result<Option<String>> {
        info!(dmg = %dmg_path.display(), "submitting for notarization");

        let output = self
            .runner
            .run(
                &self.notarytool.to_string_lossy(),
                &[
                    "submit",
                    &dmg_path.to_string_lossy(),
                    "--keychain-profile",
                    &self.keychain_profile,
                    "--wait",
                    "--timeout",
                    SUBMIT_TIMEOUT,
                    "--output-format",
                    "json",
                ],
            )
            .await?;

        // Keep the raw response next to the image for post-mortems.
        let response_path = archive_dir.join("NotarizationResponse.json");
        std::fs::write(&response_path, &output.stdout)?;

        let response = parse_submission_response(&output.stdout)?;

        if response.status != "Accepted" {
            let log = match &response.id {
                Some(id) => self.fetch_log(id, archive_dir).await,
                None => None,
            };
            return Err(PackagingError::NotarizationRejected {
                status: response.status,
                message: response.message,
                log,
            });
        }

        info!("notarization accepted, stapling ticket");
        self.runner
            .run("xcrun", &["stapler", "staple", &dmg_path.to_string_lossy()])
            .await?;

        Ok(response.id)
    }

    /// Fetch the detailed issue log for a rejected submission, best effort.
    async fn fetch_log(&self, submission_id: &str, archive_dir: &Path) -> Option<String> {
        info!(submission = submission_id, "fetching notarization log");

        let result = self
            .runner
            .run(
                &self.notarytool.to_string_lossy(),
                &[
                    "log",
                    submission_id,
                    "--keychain-profile",
                    &self.keychain_profile,
                ],
            )
            .await;

        match result {
            Ok(output) => {
                let log_path = archive_dir.join("notarization_log.json");
                if let Err(e) = std::fs::write(&log_path, &output.stdout) {
                    warn!(error = %e, "could not save notarization log");
                }
                Some(output.stdout)
            }
            Err(e) => {
                warn!(error = %e, "could not fetch notarization log");
                None
            }
        }
    }
}

/// Render the issues out of a notarization log for the failure report.
pub fn summarize_log_issues(log_json: &str) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(log_json) else {
        return Vec::new();
    };

    let mut lines = Vec::new();

    if let Some(issues) = value.get("issues").and_then(|v| v.as_array()) {
        for issue in issues {
            let severity = issue
                .get("severity")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            let path = issue
                .get("path")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown path");
            let message = issue
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("No message");
            lines.push(format!("[{}] {}: {}", severity.to_uppercase(), path, message));
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepted_response() {
        let json = r#"{"id":"abc-123","status":"Accepted","message":"Processing complete"}"#;
        let response = parse_submission_response(json).unwrap();
        assert_eq!(response.id.as_deref(), Some("abc-123"));
        assert_eq!(response.status, "Accepted");
    }

    #[test]
    fn test_parse_invalid_status() {
        let json = r#"{"id":"abc-123","status":"Invalid","message":"Package Invalid"}"#;
        let response = parse_submission_response(json).unwrap();
        assert_eq!(response.status, "Invalid");
        assert_eq!(response.message, "Package Invalid");
    }

    #[test]
    fn test_parse_missing_fields_defaults() {
        let response = parse_submission_response("{}").unwrap();
        assert_eq!(response.status, "Unknown");
        assert!(response.id.is_none());
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(parse_submission_response("not json").is_err());
    }

    #[test]
    fn test_summarize_log_issues() {
        let log = r#"{"issues":[
            {"severity":"error","path":"App.app/Contents/MacOS/App","message":"binary is not signed"},
            {"severity":"warning","path":"App.app","message":"missing timestamp"}
        ]}"#;
        let lines = summarize_log_issues(log);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[ERROR]"));
        assert!(lines[0].contains("binary is not signed"));
    }

    #[test]
    fn test_summarize_handles_garbage() {
        assert!(summarize_log_issues("???").is_empty());
        assert!(summarize_log_issues("{}").is_empty());
    }
}

//! Release configuration loading and validation

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ConfigError, Result};

/// Immutable release configuration, loaded once at process start.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseConfig {
    /// Application name, e.g. "Context"
    pub app_name: String,
    /// Bundle identifier whose build settings carry the version numbers
    pub bundle_identifier: String,
    /// Path to the .xcodeproj directory, relative to the repository root
    pub xcode_project: String,
    /// Xcode scheme to archive
    pub scheme: String,
    /// Website URL used as the feed entry link
    pub website_url: String,
    /// GitHub owner for the hosted release
    pub github_owner: String,
    /// GitHub repository for the hosted release
    pub github_repo: String,
    /// Minimum macOS version advertised in the update feed
    #[serde(default = "default_minimum_system_version")]
    pub minimum_system_version: String,
}

fn default_minimum_system_version() -> String {
    "15.0".to_string()
}

impl ReleaseConfig {
    /// Path to the project descriptor file inside the .xcodeproj directory.
    pub fn descriptor_path(&self) -> std::path::PathBuf {
        Path::new(&self.xcode_project).join("project.pbxproj")
    }

    /// Name of the packaged disk image for a marketing version.
    pub fn dmg_name(&self, marketing_version: &str) -> String {
        format!("{}_v{}.dmg", self.app_name, marketing_version)
    }

    /// Download URL for the release asset, matching the hosted release layout.
    pub fn download_url(&self, marketing_version: &str) -> String {
        format!(
            "https://github.com/{}/{}/releases/download/v{}/{}",
            self.github_owner,
            self.github_repo,
            marketing_version,
            self.dmg_name(marketing_version)
        )
    }
}

/// Load configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<ReleaseConfig> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()).into());
    }

    info!(path = %path.display(), "loading config");
    let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

    if content.trim().is_empty() {
        return Err(ConfigError::Empty(path.to_path_buf()).into());
    }

    let config: ReleaseConfig = serde_yaml::from_str(&content).map_err(ConfigError::Yaml)?;
    validate_config(&config)?;

    debug!(app = %config.app_name, "config loaded and validated");
    Ok(config)
}

/// Reject blank values for required keys. serde already rejects missing keys;
/// this catches `app_name: ""` style mistakes.
fn validate_config(config: &ReleaseConfig) -> Result<()> {
    let required: [(&'static str, &str); 7] = [
        ("app_name", &config.app_name),
        ("bundle_identifier", &config.bundle_identifier),
        ("xcode_project", &config.xcode_project),
        ("scheme", &config.scheme),
        ("website_url", &config.website_url),
        ("github_owner", &config.github_owner),
        ("github_repo", &config.github_repo),
    ];

    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(field).into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const VALID_YAML: &str = r#"
app_name: "Context"
bundle_identifier: "com.indragie.Context"
xcode_project: "Context/Context.xcodeproj"
scheme: "Context"
website_url: "https://www.contextmcp.app/"
github_owner: "indragiek"
github_repo: "Context"
"#;

    #[test]
    fn test_load_valid_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("release.yaml");
        std::fs::write(&path, VALID_YAML).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.app_name, "Context");
        assert_eq!(config.minimum_system_version, "15.0");
        assert_eq!(
            config.descriptor_path(),
            Path::new("Context/Context.xcodeproj/project.pbxproj")
        );
    }

    #[test]
    fn test_missing_config_file() {
        let temp = TempDir::new().unwrap();
        let err = load_config(&temp.path().join("release.yaml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_empty_config_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("release.yaml");
        std::fs::write(&path, "   \n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_missing_required_key() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("release.yaml");
        std::fs::write(&path, "app_name: \"App\"\n").unwrap();

        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_blank_required_value() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("release.yaml");
        std::fs::write(&path, VALID_YAML.replace("\"Context\"", "\"\"")).unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("app_name"));
    }

    #[test]
    fn test_download_url_template() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("release.yaml");
        std::fs::write(&path, VALID_YAML).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(
            config.download_url("1.2.3"),
            "https://github.com/indragiek/Context/releases/download/v1.2.3/Context_v1.2.3.dmg"
        );
    }
}

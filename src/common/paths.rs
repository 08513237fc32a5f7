//! Configuration and fixture paths
//!
//! Uses platform-appropriate locations via the directories crate:
//! - Linux: `~/.config/permcheck-cli/`
//! - macOS: `~/Library/Application Support/permcheck-cli/`
//! - Windows: `%APPDATA%\permcheck-cli\`

use std::io;
use std::path::PathBuf;

/// Application name used for config directories
const APP_NAME: &str = "permcheck-cli";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Default fixtures directory when the config names none
///
/// Falls back to `./fixtures` relative to the working directory, which is
/// where suites conventionally keep their data blobs.
pub fn default_fixtures_dir() -> PathBuf {
    PathBuf::from("fixtures")
}

/// Ensure the configuration directory exists
pub fn ensure_config_dir() -> io::Result<Option<PathBuf>> {
    if let Some(dir) = config_dir() {
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(Some(dir))
    } else {
        Ok(None)
    }
}

//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout (config dir holds settings and the optional key files):
//!
//!   Windows: %APPDATA%\translator-mini\
//!   macOS:   ~/Library/Application Support/translator-mini/
//!   Linux:   ~/.config/translator-mini/

use std::path::{Path, PathBuf};

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and the API key files.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// OpenRouter key file (`api_key.txt`).
    pub openrouter_key_file: PathBuf,
    /// Gemini key file (`gemini_api_key.txt`).
    pub gemini_key_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "translator-mini";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);
        Self::in_dir(&config_dir)
    }

    /// Lay out every file inside `config_dir`.  Used when `--config` points
    /// at a settings file outside the platform directory, so the key files
    /// are looked up next to it.
    pub fn in_dir(config_dir: &Path) -> Self {
        Self {
            config_dir: config_dir.to_path_buf(),
            settings_file: config_dir.join("settings.toml"),
            openrouter_key_file: config_dir.join("api_key.txt"),
            gemini_key_file: config_dir.join("gemini_api_key.txt"),
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

//! API key resolution: key file first, then environment variable.
//!
//! A key file may carry comments; the first line that is neither empty nor
//! starts with `#` is the key.  The key is resolved once when a backend is
//! built and never re-read during a session.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::{AppPaths, ChatProvider};

/// No credential was found for a provider.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("no {provider} API key: create {} or set {env_var}", key_file.display())]
pub struct CredentialError {
    pub provider: &'static str,
    pub env_var: &'static str,
    pub key_file: PathBuf,
}

impl CredentialError {
    /// Multi-line guidance printed before the process exits.
    pub fn guidance(&self, key_url: &str) -> String {
        format!(
            "No {} API key found!\n  1. Get a key at: {key_url}\n  2. Put it in {}\n  or set the {} environment variable",
            self.provider,
            self.key_file.display(),
            self.env_var
        )
    }
}

/// Return the first usable line of a key file, if the file exists.
pub fn read_key_file(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
}

/// Resolve a key from `key_file`, falling back to the `env_var` value.
///
/// `env_value` is passed in rather than read here so callers (and tests)
/// decide where the environment comes from.
pub fn resolve_key(key_file: &Path, env_value: Option<String>) -> Option<String> {
    read_key_file(key_file).or_else(|| {
        env_value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// Resolve the key for `provider` using the standard file locations and the
/// process environment.
pub fn resolve_provider_key(
    paths: &AppPaths,
    provider: ChatProvider,
) -> Result<String, CredentialError> {
    let key_file = match provider {
        ChatProvider::OpenRouter => &paths.openrouter_key_file,
        ChatProvider::Gemini => &paths.gemini_key_file,
    };
    let env_var = provider.env_var();

    match resolve_key(key_file, std::env::var(env_var).ok()) {
        Some(key) => {
            log::debug!("credentials: {} key resolved", provider.label());
            Ok(key)
        }
        None => Err(CredentialError {
            provider: provider.label(),
            env_var,
            key_file: key_file.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn key_file_skips_comments_and_blank_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("api_key.txt");
        std::fs::write(&path, "# OpenRouter key\n\n  sk-or-123  \n").unwrap();

        assert_eq!(read_key_file(&path).as_deref(), Some("sk-or-123"));
    }

    #[test]
    fn comment_only_file_yields_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("api_key.txt");
        std::fs::write(&path, "# paste your key here\n").unwrap();

        assert_eq!(read_key_file(&path), None);
    }

    #[test]
    fn file_wins_over_environment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("api_key.txt");
        std::fs::write(&path, "from-file").unwrap();

        let key = resolve_key(&path, Some("from-env".into()));
        assert_eq!(key.as_deref(), Some("from-file"));
    }

    #[test]
    fn environment_used_when_file_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.txt");

        let key = resolve_key(&path, Some(" from-env ".into()));
        assert_eq!(key.as_deref(), Some("from-env"));
    }

    #[test]
    fn nothing_found_is_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.txt");

        assert_eq!(resolve_key(&path, None), None);
        assert_eq!(resolve_key(&path, Some("   ".into())), None);
    }

    #[test]
    fn guidance_names_file_and_variable() {
        let err = CredentialError {
            provider: "OpenRouter",
            env_var: "OPENROUTER_API_KEY",
            key_file: PathBuf::from("/cfg/api_key.txt"),
        };
        let text = err.guidance("https://openrouter.ai/keys");
        assert!(text.contains("/cfg/api_key.txt"));
        assert!(text.contains("OPENROUTER_API_KEY"));
        assert!(text.contains("https://openrouter.ai/keys"));
    }
}

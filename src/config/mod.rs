//! Configuration module for Translator Mini.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for cross-platform config directories, TOML persistence via
//! `AppConfig::load` / `AppConfig::save`, and API key resolution.

pub mod credentials;
pub mod paths;
pub mod settings;

pub use credentials::{read_key_file, resolve_key, resolve_provider_key, CredentialError};
pub use paths::AppPaths;
pub use settings::{
    AppConfig, ChatConfig, ChatProvider, LanguagePolicy, SpeechConfig, TranslateConfig,
    TranslateDirection, TranslateEngine, TtsConfig, TtsEngineChoice,
};

//! Chat and translation backends.
//!
//! Everything that turns a conversation into text goes through the
//! [`ChatBackend`] trait:
//!
//! * [`OpenRouterBackend`] – OpenRouter chat completions (streaming via SSE)
//! * [`GeminiBackend`] – Google Gemini `generateContent`
//! * [`GoogleTranslateBackend`] – free Google Translate endpoint
//! * [`LlmTranslateBackend`] – any chat backend prompted as a translator
//!
//! [`History`] keeps the bounded conversation that assistant sessions send.

pub mod backend;
pub mod gemini;
pub mod message;
pub mod models;
pub mod openrouter;
pub mod sse;
pub mod translate;

pub use backend::{ChatBackend, ChatError, FragmentSender, FragmentStream};
pub use gemini::GeminiBackend;
pub use message::{History, Message, Role};
pub use models::ModelAlias;
pub use openrouter::OpenRouterBackend;
pub use translate::{
    resolve_direction, GoogleTranslateBackend, LlmTranslateBackend, TRANSLATION_TEMPERATURE,
};

use std::sync::Arc;

use crate::config::{resolve_provider_key, AppPaths, ChatConfig, ChatProvider};

/// Build the configured chat provider, resolving its API key.
///
/// `temperature` overrides `config.temperature` when given.
pub fn build_backend(
    config: &ChatConfig,
    paths: &AppPaths,
    temperature: Option<f32>,
) -> Result<Arc<dyn ChatBackend>, ChatError> {
    let key = resolve_provider_key(paths, config.provider)?;
    let temperature = temperature.unwrap_or(config.temperature);
    let backend: Arc<dyn ChatBackend> = match config.provider {
        ChatProvider::OpenRouter => {
            Arc::new(OpenRouterBackend::from_config(config, key).with_temperature(temperature))
        }
        ChatProvider::Gemini => {
            Arc::new(GeminiBackend::from_config(config, key).with_temperature(temperature))
        }
    };
    log::info!(
        "chat: using {} model {}",
        config.provider.label(),
        models::resolve(config.provider, &config.model)
    );
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn build_backend_with_key_file() {
        let dir = tempdir().unwrap();
        let paths = AppPaths::in_dir(dir.path());
        std::fs::write(&paths.gemini_key_file, "test-key\n").unwrap();

        let config = ChatConfig {
            provider: ChatProvider::Gemini,
            ..ChatConfig::default()
        };
        let backend = build_backend(&config, &paths, None).unwrap();
        assert_eq!(backend.name(), "gemini");
    }
}

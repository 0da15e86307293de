//! Short model aliases and their provider model identifiers.
//!
//! Unknown aliases pass through unchanged, so any literal provider model id
//! can be given on the command line.

use crate::config::ChatProvider;

/// One alias → model id entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelAlias {
    pub alias: &'static str,
    pub id: &'static str,
}

const fn alias(alias: &'static str, id: &'static str) -> ModelAlias {
    ModelAlias { alias, id }
}

/// OpenRouter models.  The free tier is rate limited.
pub static OPENROUTER_MODELS: &[ModelAlias] = &[
    alias("free", "meta-llama/llama-3.2-3b-instruct:free"),
    alias("llama-free", "meta-llama/llama-3.2-3b-instruct:free"),
    alias("gemma-free", "google/gemma-2-9b-it:free"),
    alias("qwen-free", "qwen/qwen-2-7b-instruct:free"),
    alias("gpt-4o-mini", "openai/gpt-4o-mini"),
    alias("gpt-4o", "openai/gpt-4o"),
    alias("claude-sonnet", "anthropic/claude-3.5-sonnet"),
    alias("claude-haiku", "anthropic/claude-3-haiku"),
    alias("llama-70b", "meta-llama/llama-3.1-70b-instruct"),
    alias("gemini-flash", "google/gemini-flash-1.5"),
    alias("gemini-pro", "google/gemini-pro-1.5"),
    alias("deepseek", "deepseek/deepseek-chat"),
    alias("mistral", "mistralai/mistral-7b-instruct"),
];

/// Gemini models (direct API).
pub static GEMINI_MODELS: &[ModelAlias] = &[
    alias("free", "gemini-flash-latest"),
    alias("gemini-flash", "gemini-flash-latest"),
    alias("gemini-pro", "gemini-pro-latest"),
    alias("gemini-2-flash", "gemini-2.0-flash"),
    alias("gemini-2-flash-lite", "gemini-2.0-flash-lite"),
    alias("gemini-2.5-flash", "gemini-2.5-flash"),
    alias("gemini-2.5-pro", "gemini-2.5-pro"),
];

/// Alias table for `provider`.
pub fn table(provider: ChatProvider) -> &'static [ModelAlias] {
    match provider {
        ChatProvider::OpenRouter => OPENROUTER_MODELS,
        ChatProvider::Gemini => GEMINI_MODELS,
    }
}

/// Resolve `name` to a provider model id; unknown names are returned as-is.
pub fn resolve(provider: ChatProvider, name: &str) -> &str {
    table(provider)
        .iter()
        .find(|m| m.alias == name)
        .map(|m| m.id)
        .unwrap_or(name)
}

impl ModelAlias {
    /// Free-tier models carry `free` in the alias or a `:free` id suffix.
    pub fn is_free(&self) -> bool {
        self.alias.contains("free") || self.id.ends_with(":free")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_alias_resolves() {
        assert_eq!(
            resolve(ChatProvider::OpenRouter, "claude-sonnet"),
            "anthropic/claude-3.5-sonnet"
        );
        assert_eq!(
            resolve(ChatProvider::Gemini, "gemini-2-flash"),
            "gemini-2.0-flash"
        );
    }

    #[test]
    fn unknown_alias_passes_through() {
        assert_eq!(
            resolve(ChatProvider::OpenRouter, "x-ai/grok-beta"),
            "x-ai/grok-beta"
        );
    }

    #[test]
    fn free_alias_exists_for_every_provider() {
        for provider in [ChatProvider::OpenRouter, ChatProvider::Gemini] {
            assert_ne!(resolve(provider, "free"), "free");
        }
    }

    #[test]
    fn free_tier_classification() {
        let free: Vec<_> = OPENROUTER_MODELS.iter().filter(|m| m.is_free()).collect();
        assert_eq!(free.len(), 4);
        assert!(!alias("gpt-4o", "openai/gpt-4o").is_free());
    }
}

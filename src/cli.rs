//! Command-line surface.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{AppConfig, ChatProvider, LanguagePolicy, TranslateDirection, TtsEngineChoice};

/// Chatbot Translator Mini - English/Vietnamese translation and AI assistant.
#[derive(Parser, Debug)]
#[command(name = "translator-mini")]
#[command(version)]
#[command(about = "Bilingual (EN/VI) voice and text translator with an AI assistant.", long_about = None)]
#[command(after_help = "Examples:
  translator-mini --mode voice --loop
  translator-mini --mode text --voice-output
  translator-mini --mode assistant
  translator-mini --mode assistant-text --model gpt-4o-mini
  translator-mini --mode chat --model claude-sonnet
  translator-mini --list-mics
  translator-mini --list-models")]
pub struct Cli {
    /// voice/text (translator), assistant/assistant-text (AI chat), chat (streaming)
    #[arg(long, value_enum, default_value_t = Mode::Voice)]
    pub mode: Mode,

    /// Speak the translation (translator modes)
    #[arg(long)]
    pub voice_output: bool,

    /// Speech rate for the local engine (words per minute)
    #[arg(long)]
    pub tts_rate: Option<u32>,

    /// Voice mode: keep listening after each translation
    #[arg(long = "loop")]
    pub continuous: bool,

    /// Text mode: translate this text once and exit
    #[arg(long)]
    pub input: Option<String>,

    /// Input speech locale for the voice translator (en-US, vi-VN)
    #[arg(long)]
    pub language_in: Option<String>,

    /// Model alias or provider model id (see --list-models)
    #[arg(long)]
    pub model: Option<String>,

    /// Chat provider for the assistant modes
    #[arg(long, value_enum)]
    pub provider: Option<ProviderArg>,

    /// Use Google TTS with local fallback (default)
    #[arg(long, overrides_with = "no_gtts")]
    pub gtts: bool,

    /// Use only the offline local speech engine
    #[arg(long, overrides_with = "gtts")]
    pub no_gtts: bool,

    /// Disable voice output in assistant-text mode
    #[arg(long)]
    pub no_speak: bool,

    /// Voice input language for the assistant
    #[arg(long, value_enum)]
    pub lang: Option<LangArg>,

    /// Microphone device index (see --list-mics)
    #[arg(long)]
    pub mic_index: Option<usize>,

    /// List microphone devices and exit
    #[arg(long)]
    pub list_mics: bool,

    /// List model aliases and exit
    #[arg(long)]
    pub list_models: bool,

    /// Settings file (API key files are looked up next to it)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Microphone → translation
    Voice,
    /// Typed text → translation
    Text,
    /// Spoken conversation with the assistant
    Assistant,
    /// Typed conversation with optional spoken replies
    AssistantText,
    /// Streaming typed chat
    Chat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderArg {
    Openrouter,
    Gemini,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LangArg {
    Auto,
    En,
    Vi,
}

impl From<LangArg> for LanguagePolicy {
    fn from(arg: LangArg) -> Self {
        match arg {
            LangArg::Auto => LanguagePolicy::Auto,
            LangArg::En => LanguagePolicy::En,
            LangArg::Vi => LanguagePolicy::Vi,
        }
    }
}

impl From<ProviderArg> for ChatProvider {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Openrouter => ChatProvider::OpenRouter,
            ProviderArg::Gemini => ChatProvider::Gemini,
        }
    }
}

impl Cli {
    /// Apply flag overrides on top of the loaded settings.
    pub fn apply(&self, config: &mut AppConfig) {
        if self.voice_output {
            config.translate.voice_output = true;
        }
        if let Some(rate) = self.tts_rate {
            config.translate.rate = rate;
            config.tts.rate = rate;
        }
        if let Some(locale) = &self.language_in {
            config.speech.translate_locale = locale.clone();
            // Vietnamese speech in the translator means translating to English.
            if locale.to_lowercase().starts_with("vi") {
                config.translate.direction = TranslateDirection::ViToEn;
            }
        }
        if let Some(model) = &self.model {
            config.chat.model = model.clone();
        }
        if let Some(provider) = self.provider {
            config.chat.provider = provider.into();
        }
        if self.no_gtts {
            config.tts.engine = TtsEngineChoice::Local;
        } else if self.gtts {
            config.tts.engine = TtsEngineChoice::Remote;
        }
        if let Some(lang) = self.lang {
            config.speech.input_language = lang.into();
        }
        if self.mic_index.is_some() {
            config.speech.mic_index = self.mic_index;
        }
    }
}

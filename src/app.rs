//! Mode runners behind the CLI.
//!
//! # Modes
//!
//! | Mode | Input | Session | Output |
//! |------|-------|---------|--------|
//! | `voice` | microphone | [`TranslatorSession`] | text, optional speech |
//! | `text` | `--input` or stdin | [`TranslatorSession`] | text, optional speech |
//! | `assistant` | microphone | [`ConversationSession`] | text + speech |
//! | `assistant-text` | stdin | [`ConversationSession`] | text, speech unless `--no-speak` |
//! | `chat` | stdin | [`ConversationSession`] (streaming) | streamed text |
//!
//! Conversation text goes to stdout; diagnostics go through `log`.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::chat::{
    self, models, ChatBackend, ChatError, GoogleTranslateBackend, LlmTranslateBackend,
    TRANSLATION_TEMPERATURE,
};
use crate::cli::{Cli, Mode};
use crate::config::{AppConfig, AppPaths, ChatProvider, TranslateEngine};
use crate::session::persona::{
    Command, CHAT_PROMPT, FAREWELL, GREETING, TEXT_ASSISTANT_PROMPT, VOICE_ASSISTANT_PROMPT,
};
use crate::session::{
    ConversationSession, EventSink, Interrupt, SessionConfig, SessionEvent, TranslatorSession,
    TurnFailure, TurnOutcome, TurnResult,
};
use crate::speech::{self, CaptureError, CaptureRequest, SpeechLanguage};

type StdinLines = Lines<BufReader<Stdin>>;

const RULE: &str = "============================================================";

/// Run the utility or mode selected on the command line.
pub async fn run(cli: &Cli, config: AppConfig, paths: AppPaths, interrupt: Interrupt) -> Result<ExitCode> {
    if cli.list_mics {
        list_mics()?;
        return Ok(ExitCode::SUCCESS);
    }
    if cli.list_models {
        list_models();
        return Ok(ExitCode::SUCCESS);
    }

    log::info!("app: starting {:?} mode", cli.mode);
    match cli.mode {
        Mode::Voice => run_voice(cli, &config, &paths, interrupt).await,
        Mode::Text => run_text(cli, &config, &paths, interrupt).await,
        Mode::Assistant => run_assistant(&config, &paths, interrupt).await,
        Mode::AssistantText => run_assistant_text(cli, &config, &paths, interrupt).await,
        Mode::Chat => run_chat(&config, &paths, interrupt).await,
    }
}

// ---------------------------------------------------------------------------
// Utilities
// ---------------------------------------------------------------------------

fn list_mics() -> Result<()> {
    let mics = speech::list_input_devices()?;
    if mics.is_empty() {
        println!("No microphones detected.");
        return Ok(());
    }
    println!("Available microphones:");
    for (index, name) in mics {
        println!("  [{index}] {name}");
    }
    Ok(())
}

fn list_models() {
    for provider in [ChatProvider::OpenRouter, ChatProvider::Gemini] {
        let table = models::table(provider);
        println!("{} models:", provider.label());
        for (heading, free) in [("Free", true), ("Paid", false)] {
            let group: Vec<_> = table.iter().filter(|m| m.is_free() == free).collect();
            if group.is_empty() {
                continue;
            }
            println!("  {heading} models:");
            for model in group {
                println!("    --model {:15} → {}", model.alias, model.id);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// The configured chat provider, or exit code 1 after printing where to get
/// a key.
fn chat_backend_or_exit(
    config: &AppConfig,
    paths: &AppPaths,
    temperature: Option<f32>,
) -> Result<Arc<dyn ChatBackend>, ExitCode> {
    chat::build_backend(&config.chat, paths, temperature).map_err(|e| {
        match e {
            ChatError::CredentialMissing(missing) => {
                println!("❌ {}", missing.guidance(config.chat.provider.key_url()));
            }
            other => log::error!("app: cannot build chat backend: {other}"),
        }
        ExitCode::from(1)
    })
}

fn translator_backend(config: &AppConfig, paths: &AppPaths) -> Result<Arc<dyn ChatBackend>, ExitCode> {
    let direction = config.translate.direction;
    match config.translate.engine {
        TranslateEngine::Google => Ok(Arc::new(GoogleTranslateBackend::new(
            config.translate.endpoint.clone(),
            direction,
            backend_timeout(config),
        ))),
        TranslateEngine::Llm => {
            let inner = chat_backend_or_exit(config, paths, Some(TRANSLATION_TEMPERATURE))?;
            Ok(Arc::new(LlmTranslateBackend::new(inner, direction)))
        }
    }
}

fn backend_timeout(config: &AppConfig) -> Duration {
    Duration::from_secs(config.chat.timeout_secs)
}

// ---------------------------------------------------------------------------
// Translator modes
// ---------------------------------------------------------------------------

fn translator_session(
    config: &AppConfig,
    paths: &AppPaths,
    interrupt: Interrupt,
) -> Result<TranslatorSession, ExitCode> {
    let backend = translator_backend(config, paths)?;
    let mut session = TranslatorSession::new(backend, config.translate.direction, backend_timeout(config))
        .with_interrupt(interrupt);
    if config.translate.voice_output {
        let speaker = speech::build_speaker(&config.tts, config.translate.rate);
        session = session.with_output(Arc::new(speaker));
    }
    Ok(session)
}

/// Translate `text`, print it and speak it when voice output is on.
async fn translate_and_report(session: &TranslatorSession, text: &str, show_source: bool) {
    match session.translate(text).await {
        Ok(Some(translation)) => {
            if show_source {
                println!("{}", translation.render());
            } else {
                println!(
                    "{}: {}",
                    translation.target.code().to_uppercase(),
                    translation.translated
                );
            }
            if session.speaks() && !session.speak(&translation).await {
                println!("⚠️ Could not play the translation.");
            }
        }
        Ok(None) => {}
        Err(e) => println!("❌ Translation failed: {e}"),
    }
}

async fn run_voice(cli: &Cli, config: &AppConfig, paths: &AppPaths, interrupt: Interrupt) -> Result<ExitCode> {
    let session = match translator_session(config, paths, interrupt) {
        Ok(session) => session,
        Err(code) => return Ok(code),
    };
    let request = CaptureRequest::from_config(
        &config.speech,
        SpeechLanguage::Locale(config.speech.translate_locale.clone()),
    );
    let session = session.with_input(Arc::new(speech::build_input(&config.speech)), request);

    if cli.continuous {
        println!("🎙️ Voice mode (continuous loop).");
        println!("Speak {} and I'll translate it. Press Ctrl+C to stop.\n", config.speech.translate_locale);
    } else {
        println!("Voice mode (single turn).");
    }

    let mut turns = 0usize;
    loop {
        turns += 1;
        if cli.continuous {
            println!("--- Turn {turns} ---");
        }
        match session.listen().await {
            Ok(Some(text)) => {
                println!("🎤 Heard: {text}");
                translate_and_report(&session, &text, false).await;
                println!();
            }
            Ok(None) => {}
            Err(e) if e.is_recoverable() => println!("No recognized text ({e}). Try again..."),
            Err(e) => println!("⚠️ Error in turn: {e}"),
        }

        if session.is_interrupted() {
            println!("\n🛑 Stopped after {turns} turns.");
            break;
        }
        if !cli.continuous {
            break;
        }
        println!("👂 Listening again...\n");
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_text(cli: &Cli, config: &AppConfig, paths: &AppPaths, interrupt: Interrupt) -> Result<ExitCode> {
    let session = match translator_session(config, paths, interrupt.clone()) {
        Ok(session) => session,
        Err(code) => return Ok(code),
    };

    if let Some(text) = &cli.input {
        translate_and_report(&session, text, true).await;
        return Ok(ExitCode::SUCCESS);
    }

    println!("Text mode. Type a sentence and press Enter. Ctrl+C to exit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = read_line(&mut lines, ">> ", &interrupt).await? {
        if line.trim().is_empty() {
            continue;
        }
        translate_and_report(&session, &line, false).await;
    }
    println!("Stopped.");
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// Assistant modes
// ---------------------------------------------------------------------------

fn session_config(config: &AppConfig, system_prompt: &str, speak_output: bool) -> SessionConfig {
    SessionConfig {
        system_prompt: system_prompt.to_string(),
        max_history: config.chat.max_history,
        backend_timeout: backend_timeout(config),
        output_language: config.tts.output_language,
        speak_output,
        capture: CaptureRequest::from_config(
            &config.speech,
            SpeechLanguage::from_policy(config.speech.input_language),
        ),
    }
}

fn print_events() -> EventSink {
    Arc::new(|event: &SessionEvent| match event {
        SessionEvent::Listening => println!("🎤 Đang nghe..."),
        SessionEvent::Heard(text) => println!("👤 Bạn: {text}"),
        SessionEvent::Thinking => println!("💭 Đang suy nghĩ..."),
        SessionEvent::Reply(text) => println!("🤖 Mini: {text}"),
        SessionEvent::Speaking(language) => println!("🔊 Đang phát âm thanh... ({language})"),
        SessionEvent::Spoken(true) => {}
        SessionEvent::Spoken(false) => println!("⚠️ Không thể phát âm thanh."),
    })
}

fn report_turn(turn: &TurnResult) {
    match &turn.outcome {
        TurnOutcome::Answered | TurnOutcome::NoInput => {}
        TurnOutcome::Exited => println!("👋 {FAREWELL}"),
        TurnOutcome::Reset => println!("🔄 Đã reset cuộc hội thoại."),
        TurnOutcome::VoiceOn => println!("🔊 Đã bật giọng nói."),
        TurnOutcome::VoiceOff => println!("🔇 Đã tắt giọng nói."),
        TurnOutcome::Failed(TurnFailure::Capture(CaptureError::Timeout)) => {
            println!("⏱️ Không nghe thấy gì, thử lại...")
        }
        TurnOutcome::Failed(TurnFailure::Capture(CaptureError::Unintelligible)) => {
            println!("❓ Không hiểu, vui lòng nói lại.")
        }
        TurnOutcome::Failed(TurnFailure::Capture(e)) => println!("⚠️ Lỗi micro: {e}"),
        TurnOutcome::Failed(TurnFailure::Backend(e)) => println!("❌ Không nhận được phản hồi: {e}"),
        TurnOutcome::Failed(TurnFailure::Interrupted) => println!("\n👋 Tạm biệt!"),
        TurnOutcome::Failed(TurnFailure::NoSpeechInput) => println!("⚠️ Không có micro."),
    }
}

fn banner(title: &str, config: &AppConfig, hints: &[&str]) {
    println!("\n{RULE}");
    println!("{title}");
    println!(
        "   Model: {} ({})",
        models::resolve(config.chat.provider, &config.chat.model),
        config.chat.provider.label()
    );
    for hint in hints {
        println!("   {hint}");
    }
    println!("{RULE}\n");
}

async fn run_assistant(config: &AppConfig, paths: &AppPaths, interrupt: Interrupt) -> Result<ExitCode> {
    let backend = match chat_backend_or_exit(config, paths, None) {
        Ok(backend) => backend,
        Err(code) => return Ok(code),
    };
    let input = speech::build_input(&config.speech);
    let speaker = speech::build_speaker(&config.tts, config.tts.rate);
    log::info!("app: speech engines {:?}", speaker.engine_names());

    let mut session = ConversationSession::new(session_config(config, VOICE_ASSISTANT_PROMPT, true), backend)
        .with_input(Arc::new(input))
        .with_output(Arc::new(speaker))
        .with_interrupt(interrupt)
        .with_events(print_events());

    banner(
        "🎙️ VOICE ASSISTANT - MINI",
        config,
        &[
            "Nói 'thoát' hoặc 'tạm biệt' để kết thúc",
            "💡 Nói 'dịch' kèm câu tiếng Anh để dịch sang tiếng Việt",
        ],
    );
    println!("🤖 Mini: {GREETING}");
    session.greet().await;

    loop {
        let turn = session.process_turn().await;
        report_turn(&turn);
        if !turn.continue_loop {
            break;
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_assistant_text(
    cli: &Cli,
    config: &AppConfig,
    paths: &AppPaths,
    interrupt: Interrupt,
) -> Result<ExitCode> {
    let backend = match chat_backend_or_exit(config, paths, None) {
        Ok(backend) => backend,
        Err(code) => return Ok(code),
    };
    let speaker = speech::build_speaker(&config.tts, config.tts.rate);
    let mut session =
        ConversationSession::new(session_config(config, TEXT_ASSISTANT_PROMPT, !cli.no_speak), backend)
            .with_output(Arc::new(speaker))
            .with_interrupt(interrupt.clone())
            .with_events(print_events());

    banner(
        "💬 TEXT ASSISTANT - MINI",
        config,
        &[
            "Gõ 'quit' để thoát, 'reset' để xóa lịch sử",
            "Gõ 'voice on/off' để bật/tắt giọng nói",
            "💡 Gõ 'dịch [câu tiếng Anh]' để dịch sang tiếng Việt",
        ],
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Some(line) = read_line(&mut lines, "👤 Bạn: ", &interrupt).await? else {
            println!("\n👋 Tạm biệt!");
            break;
        };
        let turn = session.process_text(&line).await;
        report_turn(&turn);
        if !turn.continue_loop {
            break;
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_chat(config: &AppConfig, paths: &AppPaths, interrupt: Interrupt) -> Result<ExitCode> {
    let backend = match chat_backend_or_exit(config, paths, None) {
        Ok(backend) => backend,
        Err(code) => return Ok(code),
    };
    let mut session = ConversationSession::new(session_config(config, CHAT_PROMPT, false), backend)
        .with_interrupt(interrupt.clone());

    banner(
        "🤖 AI Chat",
        config,
        &["Type 'quit' to exit, 'reset' to clear history"],
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Some(line) = read_line(&mut lines, "\n👤 You: ", &interrupt).await? else {
            println!("\n👋 Goodbye!");
            break;
        };
        let question = streams_reply(&line);
        if question {
            print!("🤖 AI: ");
            std::io::stdout().flush()?;
        }
        let turn = session
            .process_text_streaming(&line, |fragment| {
                print!("{fragment}");
                // A failed flush only delays output.
                let _ = std::io::stdout().flush();
            })
            .await;
        if question {
            println!();
        }
        report_turn(&turn);
        if !turn.continue_loop {
            break;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Whether a chat line goes to the backend.  Only `reset` and exit phrases
/// are handled locally in streaming chat.
fn streams_reply(line: &str) -> bool {
    !line.trim().is_empty()
        && !matches!(Command::parse(line), Some(Command::Exit | Command::Reset))
}

// ---------------------------------------------------------------------------
// Stdin
// ---------------------------------------------------------------------------

/// Prompt and read one line.  `None` on end of input or interrupt.
async fn read_line(lines: &mut StdinLines, prompt: &str, interrupt: &Interrupt) -> Result<Option<String>> {
    if interrupt.is_triggered() {
        return Ok(None);
    }
    print!("{prompt}");
    std::io::stdout().flush()?;
    tokio::select! {
        line = lines.next_line() => Ok(line?),
        _ = interrupt.triggered() => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn isolated_paths() -> (tempfile::TempDir, AppPaths) {
        let dir = tempdir().unwrap();
        let paths = AppPaths::in_dir(dir.path());
        (dir, paths)
    }

    #[test]
    fn chat_mode_streams_everything_but_reset_and_exit() {
        assert!(streams_reply("what is rust?"));
        assert!(streams_reply("voice on"));
        assert!(streams_reply("Voice Off"));
        assert!(!streams_reply("reset"));
        assert!(!streams_reply("  Bye "));
        assert!(!streams_reply("   "));
    }

    #[test]
    fn google_translator_needs_no_key() {
        let (_dir, paths) = isolated_paths();
        let backend = translator_backend(&AppConfig::default(), &paths).unwrap();
        assert_eq!(backend.name(), "google-translate");
    }

    #[test]
    fn llm_translator_uses_the_chat_provider_key() {
        let (_dir, paths) = isolated_paths();
        std::fs::write(&paths.gemini_key_file, "# comment\nkey-123\n").unwrap();
        let mut config = AppConfig::default();
        config.translate.engine = TranslateEngine::Llm;
        config.chat.provider = ChatProvider::Gemini;

        let backend = translator_backend(&config, &paths).unwrap();
        assert_eq!(backend.name(), "gemini");
    }

    #[test]
    fn session_config_follows_settings() {
        let mut config = AppConfig::default();
        config.chat.max_history = 6;
        config.chat.timeout_secs = 9;
        let session = session_config(&config, TEXT_ASSISTANT_PROMPT, false);

        assert_eq!(session.max_history, 6);
        assert_eq!(session.backend_timeout, Duration::from_secs(9));
        assert!(!session.speak_output);
        assert_eq!(session.capture.language, SpeechLanguage::Auto);
    }

    #[tokio::test]
    async fn utilities_exit_successfully() {
        let (_dir, paths) = isolated_paths();
        let cli = <Cli as clap::Parser>::try_parse_from(["translator-mini", "--list-models"]).unwrap();
        assert!(run(&cli, AppConfig::default(), paths, Interrupt::new()).await.is_ok());
    }
}

//! Offline synthesis through the platform speech program.
//!
//! | Platform | Program                | Vietnamese voice |
//! |----------|------------------------|------------------|
//! | Linux    | `espeak-ng` / `espeak` | `-v vi`          |
//! | macOS    | `say`                  | `-v Linh`        |
//! | Windows  | PowerShell + SAPI      | system default   |
//!
//! The program is probed once, on first use.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::OnceCell;

use super::output::{SynthesisEngine, SynthesisError};
use crate::language::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalProgram {
    EspeakNg,
    Espeak,
    Say,
    PowerShell,
}

impl LocalProgram {
    fn executable(&self) -> &'static str {
        match self {
            LocalProgram::EspeakNg => "espeak-ng",
            LocalProgram::Espeak => "espeak",
            LocalProgram::Say => "say",
            LocalProgram::PowerShell => "powershell",
        }
    }

    /// Candidates for the current platform, best first.
    fn candidates() -> &'static [LocalProgram] {
        if cfg!(target_os = "macos") {
            &[LocalProgram::Say, LocalProgram::EspeakNg, LocalProgram::Espeak]
        } else if cfg!(target_os = "windows") {
            &[LocalProgram::PowerShell, LocalProgram::EspeakNg]
        } else {
            &[LocalProgram::EspeakNg, LocalProgram::Espeak]
        }
    }

    /// Arguments that make the program exit at once if it is installed.
    fn probe_args(&self) -> &'static [&'static str] {
        match self {
            LocalProgram::EspeakNg | LocalProgram::Espeak => &["--version"],
            LocalProgram::Say => &["-v", "?"],
            LocalProgram::PowerShell => &["-NoProfile", "-Command", "exit 0"],
        }
    }
}

/// One utterance: program, arguments and the text fed on stdin.
///
/// The text never appears in `args` for espeak and say, so a reply that
/// starts with `-` cannot be taken for an option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechCommand {
    pub program: &'static str,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

pub fn build_command(
    program: LocalProgram,
    text: &str,
    language: Language,
    rate: u32,
    volume: f32,
) -> SpeechCommand {
    let volume = volume.clamp(0.0, 1.0);
    let (args, stdin) = match program {
        LocalProgram::EspeakNg | LocalProgram::Espeak => (
            vec![
                "-s".into(),
                rate.to_string(),
                "-a".into(),
                ((volume * 200.0).round() as u32).to_string(),
                "-v".into(),
                language.code().into(),
                "--stdin".into(),
            ],
            Some(text.to_string()),
        ),
        LocalProgram::Say => {
            let mut args = vec!["-r".to_string(), rate.to_string()];
            if language == Language::Vi {
                args.push("-v".into());
                args.push("Linh".into());
            }
            args.push("-f".into());
            args.push("-".into());
            (args, Some(text.to_string()))
        }
        LocalProgram::PowerShell => {
            // SAPI rate runs from -10 to 10 with 0 ≈ 180 wpm.
            let sapi_rate = ((rate as i32 - 180) / 10).clamp(-10, 10);
            let script = format!(
                "Add-Type -AssemblyName System.Speech; \
                 $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
                 $s.Rate = {sapi_rate}; $s.Volume = {}; $s.Speak('{}')",
                (volume * 100.0).round() as u32,
                text.replace('\'', "''")
            );
            (vec!["-NoProfile".into(), "-Command".into(), script], None)
        }
    };
    SpeechCommand {
        program: program.executable(),
        args,
        stdin,
    }
}

/// Rough upper bound on how long speaking `text` at `rate` wpm may take.
pub fn estimated_duration(text: &str, rate: u32) -> Duration {
    let words = text.split_whitespace().count().max(1) as f64;
    let minutes = words / rate.max(60) as f64;
    Duration::from_secs_f64(minutes * 60.0 * 2.0) + Duration::from_secs(5)
}

pub struct LocalEngine {
    rate: u32,
    volume: f32,
    program: OnceCell<Option<LocalProgram>>,
}

impl LocalEngine {
    pub fn new(rate: u32, volume: f32) -> Self {
        Self {
            rate,
            volume,
            program: OnceCell::new(),
        }
    }

    async fn program(&self) -> Option<LocalProgram> {
        *self.program.get_or_init(probe).await
    }
}

async fn probe() -> Option<LocalProgram> {
    for candidate in LocalProgram::candidates() {
        let status = Command::new(candidate.executable())
            .args(candidate.probe_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();
        if let Ok(Ok(status)) = tokio::time::timeout(Duration::from_secs(5), status).await {
            if status.success() {
                log::debug!("local-tts: using {}", candidate.executable());
                return Some(*candidate);
            }
        }
    }
    log::warn!("local-tts: no speech program found (install espeak-ng)");
    None
}

#[async_trait]
impl SynthesisEngine for LocalEngine {
    fn name(&self) -> &str {
        "local"
    }

    async fn speak(&self, text: &str, language: Language) -> Result<(), SynthesisError> {
        let program = self
            .program()
            .await
            .ok_or_else(|| SynthesisError::Unavailable("no local speech program".into()))?;

        let command = build_command(program, text, language, self.rate, self.volume);
        let exe = command.program;
        let mut child = Command::new(exe)
            .args(&command.args)
            .stdin(if command.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let (Some(input), Some(mut pipe)) = (command.stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
            // Closing stdin tells the program the text is complete.
            drop(pipe);
        }

        let limit = estimated_duration(text, self.rate);
        match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => {
                let status = status?;
                if status.success() {
                    Ok(())
                } else {
                    Err(SynthesisError::Program(format!("{exe} exited with {status}")))
                }
            }
            Err(_) => {
                let _ = child.kill().await;
                Err(SynthesisError::Program(format!(
                    "{exe} still speaking after {:.0}s",
                    limit.as_secs_f32()
                )))
            }
        }
    }
}

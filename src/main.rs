//! Application entry point for Translator Mini.
//!
//! # Startup sequence
//!
//! 1. Initialise logging (`RUST_LOG`, default `warn`).
//! 2. Parse the command line.
//! 3. Load [`AppConfig`] (defaults on first run) and apply flag overrides.
//! 4. Create the [`tokio`] runtime and install the Ctrl+C handler.
//! 5. Run the selected mode until it ends or is interrupted.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use translator_mini::{
    app,
    cli::Cli,
    config::{AppConfig, AppPaths},
    session::Interrupt,
};

/// How long blocked audio or stdin threads may delay exit.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Settings and key-file locations, honouring `--config`.
fn load_config(cli: &Cli) -> (AppConfig, AppPaths) {
    let (paths, settings_file) = match &cli.config {
        Some(file) => {
            let dir = file
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (AppPaths::in_dir(&dir), file.clone())
        }
        None => {
            let paths = AppPaths::new();
            let file = paths.settings_file.clone();
            (paths, file)
        }
    };

    let config = AppConfig::load_from(&settings_file).unwrap_or_else(|e| {
        log::warn!("Failed to load config from {} ({e}); using defaults", settings_file.display());
        AppConfig::default()
    });
    (config, paths)
}

fn main() -> ExitCode {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // 2. Command line
    let cli = Cli::parse();

    // 3. Configuration
    let (mut config, paths) = load_config(&cli);
    cli.apply(&mut config);
    log::debug!("main: settings from {}", paths.config_dir.display());

    // 4. Runtime + interrupt
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let interrupt = Interrupt::new();
    {
        let interrupt = interrupt.clone();
        rt.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("main: interrupt received");
                interrupt.trigger();
            }
        });
    }

    // 5. Mode
    let code = match rt.block_on(app::run(&cli, config, paths, interrupt)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    };
    rt.shutdown_timeout(SHUTDOWN_GRACE);
    code
}

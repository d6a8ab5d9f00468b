use std::fs::File;
use std::io::{self, Write};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use drill_core::{
    DeadlineTimer, Event, GateOutcome, InputGate, KeyBindings, PeriodicDriver, SessionEngine,
    Speaker, ThreadRandom,
};
use drill_service::config::{Config, Overrides};
use drill_service::report::SessionReport;
use drill_service::speaker::{LogSpeaker, ProcessSpeaker};
use drill_service::terminal::{self, RawModeGuard, Status, TerminalInput};
use tokio::sync::mpsc;
use tracing_subscriber::fmt::time::ChronoLocal;

/// Listen to numbers in a foreign language and type them before time runs out.
///
/// Keys: Space new number, / answer, [ and ] range bounds, Enter submit,
/// Esc leave a field, Left/Right speech rate, q quit.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Smallest number drawn
    #[arg(long, allow_hyphen_values = true)]
    min: Option<i64>,
    /// Largest number drawn
    #[arg(long, allow_hyphen_values = true)]
    max: Option<i64>,
    /// Speech rate between 0.5 and 2.0
    #[arg(long)]
    rate: Option<f64>,
    /// Language tag of the spoken numbers, e.g. fr-FR
    #[arg(long)]
    language: Option<String>,
    /// Print the session report as JSON on exit
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    // Stderr shares the raw-mode terminal with the status line, so it only
    // gets warnings and errors. DRILL_LOG_FILE receives the full level.
    match &config.log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_max_level(config.log_level)
                .with_timer(ChronoLocal::rfc_3339())
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_max_level(config.console_level())
                .with_timer(ChronoLocal::rfc_3339())
                .with_writer(io::stderr)
                .init();
        }
    }

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();
    config
        .apply(Overrides {
            min: args.min,
            max: args.max,
            rate: args.rate,
            language: args.language,
        })
        .context("Invalid command-line arguments")?;

    tracing::info!(
        language = %config.language,
        range = %config.range,
        rate = %config.speech_rate,
        "Configuration loaded successfully. Starting drill..."
    );

    // --- 4. Speech Backend ---
    let speaker: Box<dyn Speaker> = match &config.speech_program {
        Some(program) => {
            Box::new(ProcessSpeaker::start(program.as_str(), config.voices.clone()).await)
        }
        None => {
            tracing::info!("Speech disabled, numbers are only logged");
            Box::new(LogSpeaker::new(config.voices.clone()))
        }
    };

    // --- 5. Session Setup ---
    // Deadline expiries come back through this channel so the engine is only
    // ever touched from this task.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
    let mut engine = SessionEngine::new(
        speaker,
        ThreadRandom,
        DeadlineTimer::new(event_tx),
        config.engine_settings(),
    );
    let mut gate = InputGate::new(KeyBindings::default(), engine.range());
    let mut driver = PeriodicDriver::new(config.tick);
    driver.sync(engine.drive_config());

    // --- 6. Terminal Input ---
    let raw_mode = RawModeGuard::enable().context("Failed to switch the terminal to raw mode")?;
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<TerminalInput>();
    // `event::read` blocks, so it gets a thread of its own. It is left behind on exit.
    std::thread::spawn(move || terminal::forward_keys(input_tx));

    let mut stdout = io::stdout();
    let mut last_error: Option<String> = None;
    terminal::draw(&mut stdout, &Status::capture(&engine, &gate, None))?;

    // --- 7. Event Loop ---
    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                if let Some(entry) = engine.handle_event(event) {
                    tracing::debug!(round = %entry.round, "Deadline retired a round");
                }
            }
            _ = driver.tick() => {
                if let Err(e) = engine.advance_if_allowed() {
                    tracing::warn!("Periodic start failed: {}", e);
                }
            }
            input = input_rx.recv() => match input {
                Some(TerminalInput::Key(key)) => match gate.handle_key(key, &mut engine) {
                    Ok(GateOutcome::Quit) => break,
                    Ok(GateOutcome::Ignored) => {}
                    Ok(outcome) => {
                        tracing::debug!(?outcome, "Key handled");
                        last_error = None;
                    }
                    Err(e) => {
                        tracing::warn!("Rejected input: {}", e);
                        last_error = Some(e.to_string());
                    }
                },
                Some(TerminalInput::Interrupt) | None => break,
            },
        }

        driver.sync(engine.drive_config());
        terminal::draw(
            &mut stdout,
            &Status::capture(&engine, &gate, last_error.as_deref()),
        )?;
    }

    // --- 8. Shutdown ---
    engine.stop();
    drop(raw_mode);
    writeln!(stdout)?;

    if args.json {
        let report = SessionReport::new(
            engine.language(),
            engine.range(),
            engine.speech_rate(),
            engine.history(),
        );
        let json = serde_json::to_string_pretty(&report).context("Failed to encode the report")?;
        writeln!(stdout, "{json}")?;
    } else {
        terminal::print_history(&mut stdout, engine.history())?;
    }

    tracing::info!(attempts = engine.history().len(), "Drill finished");
    Ok(())
}

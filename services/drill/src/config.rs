//! Application Configuration Module
//!
//! Loads the drill settings from the environment (and a local `.env` file)
//! into a single struct, then lets command-line flags override them.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use drill_core::{
    ANSWER_WINDOW, DEFAULT_LANGUAGE, DrillError, EngineSettings, Range, SpeechRate, Voice,
};
use tracing::Level;

// --- Application Constants ---

/// Speech program used when `DRILL_SPEECH_PROGRAM` is not set.
pub const DEFAULT_SPEECH_PROGRAM: &str = "espeak-ng";
/// Voices offered when `DRILL_VOICES` is not set, as `language=voice` pairs.
pub const DEFAULT_VOICES: &str = "fr-FR=fr,en-US=en-us";
/// Value of `DRILL_SPEECH_PROGRAM` that selects the silent speaker.
pub const SILENT_PROGRAM: &str = "none";

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub language: String,
    pub range: Range,
    pub speech_rate: SpeechRate,
    pub answer_window: Duration,
    pub tick: Duration,
    /// `None` selects the silent speaker.
    pub speech_program: Option<String>,
    pub voices: Vec<Voice>,
    pub log_file: Option<PathBuf>,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error(transparent)]
    Drill(#[from] DrillError),
}

/// Values given on the command line. Each one that is set wins over the
/// environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub rate: Option<f64>,
    pub language: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `DRILL_LANGUAGE`: (Optional) Language tag of the drilled numbers. Defaults to "fr-FR".
    // *   `DRILL_MIN` / `DRILL_MAX`: (Optional) Initial range. Defaults to 0 and 100.
    // *   `DRILL_RATE`: (Optional) Initial speech rate, clamped to 0.5..=2.0. Defaults to 1.0.
    // *   `DRILL_ANSWER_WINDOW_MS`: (Optional) Time to answer. Defaults to 5000.
    // *   `DRILL_TICK_MS`: (Optional) Period of the auto-advance tick. Defaults to 5000.
    // *   `DRILL_SPEECH_PROGRAM`: (Optional) espeak-compatible program, or "none". Defaults to "espeak-ng".
    // *   `DRILL_VOICES`: (Optional) Comma separated `language=voice` pairs.
    // *   `DRILL_LOG_FILE`: (Optional) Write logs here instead of stderr.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let language = lookup("DRILL_LANGUAGE").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let min = parse_var(&lookup, "DRILL_MIN")?.unwrap_or(Range::default().min());
        let max = parse_var(&lookup, "DRILL_MAX")?.unwrap_or(Range::default().max());
        let range = Range::new(min, max)?;

        let speech_rate = parse_var::<f64>(&lookup, "DRILL_RATE")?
            .map(SpeechRate::clamped)
            .unwrap_or_default();

        let answer_window = parse_var(&lookup, "DRILL_ANSWER_WINDOW_MS")?
            .map(Duration::from_millis)
            .unwrap_or(ANSWER_WINDOW);
        let tick = parse_var(&lookup, "DRILL_TICK_MS")?
            .map(Duration::from_millis)
            .unwrap_or(ANSWER_WINDOW);
        for (var, value) in [("DRILL_ANSWER_WINDOW_MS", answer_window), ("DRILL_TICK_MS", tick)] {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue {
                    var,
                    value: "0".to_string(),
                });
            }
        }

        let speech_program = match lookup("DRILL_SPEECH_PROGRAM") {
            Some(program) if program.eq_ignore_ascii_case(SILENT_PROGRAM) => None,
            Some(program) => Some(program),
            None => Some(DEFAULT_SPEECH_PROGRAM.to_string()),
        };

        let voices_str = lookup("DRILL_VOICES").unwrap_or_else(|| DEFAULT_VOICES.to_string());
        let voices = parse_voices(&voices_str).ok_or_else(|| ConfigError::InvalidValue {
            var: "DRILL_VOICES",
            value: voices_str.clone(),
        })?;

        let log_file = lookup("DRILL_LOG_FILE").map(PathBuf::from);

        // Configure logging level from RUST_LOG, with a sensible default.
        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            language,
            range,
            speech_rate,
            answer_window,
            tick,
            speech_program,
            voices,
            log_file,
            log_level,
        })
    }

    /// Applies command-line values on top of the environment.
    ///
    /// A single bound keeps the other one from the environment, and the pair is
    /// validated again.
    pub fn apply(&mut self, overrides: Overrides) -> Result<(), ConfigError> {
        let min = overrides.min.unwrap_or(self.range.min());
        let max = overrides.max.unwrap_or(self.range.max());
        self.range = Range::new(min, max)?;
        if let Some(rate) = overrides.rate {
            self.speech_rate = SpeechRate::clamped(rate);
        }
        if let Some(language) = overrides.language {
            self.language = language;
        }
        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings::default()
            .with_language(&self.language)
            .with_answer_window(self.answer_window)
            .with_range(self.range)
            .with_speech_rate(self.speech_rate)
    }

    /// Level for logs written to the terminal. Anything chattier than WARN
    /// would be drawn over the status line.
    pub fn console_level(&self) -> Level {
        self.log_level.min(Level::WARN)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        None => Ok(None),
    }
}

/// Parses `fr-FR=fr,en-US=en-us` into voices. Returns `None` on a malformed pair.
pub fn parse_voices(pairs: &str) -> Option<Vec<Voice>> {
    pairs.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (language, id) = pair.split_once('=')?;
            let (language, id) = (language.trim(), id.trim());
            if language.is_empty() || id.is_empty() {
                return None;
            }
            Some(Voice::new(id, language))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.language, "fr-FR");
        assert_eq!(config.range, Range::new(0, 100).unwrap());
        assert_eq!(config.speech_rate, SpeechRate::NORMAL);
        assert_eq!(config.answer_window, Duration::from_millis(5000));
        assert_eq!(config.tick, Duration::from_millis(5000));
        assert_eq!(config.speech_program.as_deref(), Some("espeak-ng"));
        assert_eq!(
            config.voices,
            vec![Voice::new("fr", "fr-FR"), Voice::new("en-us", "en-US")]
        );
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn reads_every_variable() {
        let config = Config::from_lookup(lookup_from(&[
            ("DRILL_LANGUAGE", "en-US"),
            ("DRILL_MIN", "-10"),
            ("DRILL_MAX", " 10 "),
            ("DRILL_RATE", "3.5"),
            ("DRILL_ANSWER_WINDOW_MS", "8000"),
            ("DRILL_TICK_MS", "2000"),
            ("DRILL_SPEECH_PROGRAM", "NONE"),
            ("DRILL_VOICES", "en-US=en-gb"),
            ("DRILL_LOG_FILE", "/tmp/drill.log"),
            ("RUST_LOG", "debug"),
        ]))
        .unwrap();

        assert_eq!(config.language, "en-US");
        assert_eq!(config.range, Range::new(-10, 10).unwrap());
        assert_eq!(config.speech_rate, SpeechRate::MAX);
        assert_eq!(config.answer_window, Duration::from_millis(8000));
        assert_eq!(config.tick, Duration::from_millis(2000));
        assert_eq!(config.speech_program, None);
        assert_eq!(config.voices, vec![Voice::new("en-gb", "en-US")]);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/drill.log")));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("DRILL_MIN", "9"), ("DRILL_MAX", "1")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Drill(DrillError::InvalidRange { min: 9, max: 1 })
        ));
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let err = Config::from_lookup(lookup_from(&[("DRILL_MAX", "lots")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for DRILL_MAX: \"lots\"");

        let err = Config::from_lookup(lookup_from(&[("DRILL_TICK_MS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "DRILL_TICK_MS", .. }));

        let err = Config::from_lookup(lookup_from(&[("DRILL_VOICES", "fr-FR")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "DRILL_VOICES", .. }));

        let err = Config::from_lookup(lookup_from(&[("RUST_LOG", "chatty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLogLevel(_)));
    }

    #[test]
    fn command_line_wins_and_is_revalidated() {
        let mut config = Config::from_lookup(lookup_from(&[("DRILL_MAX", "50")])).unwrap();

        config
            .apply(Overrides {
                min: Some(20),
                rate: Some(0.7),
                language: Some("en-US".to_string()),
                ..Overrides::default()
            })
            .unwrap();
        assert_eq!(config.range, Range::new(20, 50).unwrap());
        assert_eq!(config.speech_rate.to_string(), "0.7x");
        assert_eq!(config.engine_settings().language, "en-US");

        let err = config
            .apply(Overrides {
                min: Some(60),
                ..Overrides::default()
            })
            .unwrap_err();
        assert!(matches!(err, ConfigError::Drill(DrillError::InvalidRange { .. })));
        assert_eq!(config.range, Range::new(20, 50).unwrap());
    }

    #[test]
    fn voice_pairs_tolerate_spacing() {
        assert_eq!(
            parse_voices(" fr-FR = fr , ,en-US=en-us"),
            Some(vec![Voice::new("fr", "fr-FR"), Voice::new("en-us", "en-US")])
        );
        assert_eq!(parse_voices("=fr"), None);
    }

    #[test]
    fn terminal_logging_is_capped_at_warnings() {
        let level = |value: &str| {
            Config::from_lookup(lookup_from(&[("RUST_LOG", value)]))
                .unwrap()
                .console_level()
        };

        assert_eq!(level("INFO"), Level::WARN);
        assert_eq!(level("DEBUG"), Level::WARN);
        assert_eq!(level("ERROR"), Level::ERROR);
    }
}

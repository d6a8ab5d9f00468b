//! Machine-readable session summary printed by `--json`.
use drill_core::{HistoryEntry, Outcome, Range, SpeechRate};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SessionReport<'a> {
    pub language: &'a str,
    pub range: Range,
    pub speech_rate: f32,
    pub attempts: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub timed_out: usize,
    pub history: &'a [HistoryEntry],
}

impl<'a> SessionReport<'a> {
    pub fn new(
        language: &'a str,
        range: Range,
        speech_rate: SpeechRate,
        history: &'a [HistoryEntry],
    ) -> Self {
        let count = |outcome| history.iter().filter(|e| e.outcome == outcome).count();
        Self {
            language,
            range,
            speech_rate: speech_rate.as_f32(),
            attempts: history.len(),
            correct: count(Outcome::Correct),
            incorrect: count(Outcome::Incorrect),
            timed_out: count(Outcome::TimedOut),
            history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drill_core::RoundId;
    use serde_json::json;

    #[test]
    fn counts_outcomes_and_keeps_order() {
        let history = [
            HistoryEntry {
                round: RoundId::new(1),
                value: 4,
                outcome: Outcome::Correct,
            },
            HistoryEntry {
                round: RoundId::new(2),
                value: 8,
                outcome: Outcome::Incorrect,
            },
            HistoryEntry {
                round: RoundId::new(4),
                value: 8,
                outcome: Outcome::TimedOut,
            },
        ];

        let report = SessionReport::new("fr-FR", Range::new(0, 10).unwrap(), SpeechRate::MIN, &history);

        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "language": "fr-FR",
                "range": { "min": 0, "max": 10 },
                "speech_rate": 0.5,
                "attempts": 3,
                "correct": 1,
                "incorrect": 1,
                "timed_out": 1,
                "history": [
                    { "round": 1, "value": 4, "outcome": "correct" },
                    { "round": 2, "value": 8, "outcome": "incorrect" },
                    { "round": 4, "value": 8, "outcome": "timed_out" }
                ]
            })
        );
    }
}

//! End-to-end drill scenarios driven through the public engine API with a
//! paused tokio clock.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use drill_core::{
    ANSWER_WINDOW, DeadlineTimer, EngineSettings, Event, HistoryEntry, Outcome, Range,
    SeededRandom, SessionEngine, Speaker, Submission, Utterance, Voice,
};
use tokio::sync::mpsc;

/// Records everything the engine asks the speech backend to do.
#[derive(Clone, Default)]
struct RecordingSpeaker {
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingSpeaker {
    fn spoken(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl Speaker for RecordingSpeaker {
    fn voices(&self) -> Vec<Voice> {
        vec![Voice::new("fr", "fr-FR")]
    }

    fn speak(&mut self, utterance: Utterance) {
        self.log.lock().unwrap().push(utterance.text);
    }

    fn cancel_all(&mut self) {
        self.log.lock().unwrap().push("<cancel>".to_string());
    }
}

struct Harness {
    engine: SessionEngine<RecordingSpeaker, SeededRandom>,
    events: mpsc::UnboundedReceiver<Event>,
    speaker: RecordingSpeaker,
}

impl Harness {
    fn new(min: i64, max: i64) -> Self {
        let speaker = RecordingSpeaker::default();
        let (tx, events) = mpsc::unbounded_channel();
        let settings = EngineSettings::default().with_range(Range::new(min, max).unwrap());
        let engine = SessionEngine::new(
            speaker.clone(),
            SeededRandom::new(2024),
            DeadlineTimer::new(tx),
            settings,
        );
        Self {
            engine,
            events,
            speaker,
        }
    }

    /// Lets the clock run and feeds every delivered event to the engine, the
    /// way the service loop does.
    async fn run_for(&mut self, span: Duration) -> Vec<HistoryEntry> {
        tokio::time::advance(span).await;
        tokio::task::yield_now().await;
        let mut retired = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            retired.extend(self.engine.handle_event(event));
        }
        retired
    }
}

#[tokio::test(start_paused = true)]
async fn single_value_range_chains_after_a_correct_answer() {
    // --- 1. Arrange ---
    let mut h = Harness::new(0, 0);
    let first = h.engine.start_round().unwrap();
    assert_eq!(h.engine.active_round().unwrap().value(), 0);

    // --- 2. Act ---
    let submission = h.engine.submit_answer("0");

    // --- 3. Assert ---
    let Submission::Correct { entry, next } = submission else {
        panic!("expected a correct submission, got {submission:?}");
    };
    assert_eq!(entry.round, first);
    assert_eq!((entry.value, entry.outcome), (0, Outcome::Correct));
    assert_eq!(h.engine.history(), &[entry]);

    let next = next.expect("a correct answer chains straight into the next round");
    let active = h.engine.active_round().unwrap();
    assert_eq!((active.id(), active.value()), (next, 0));
    assert!(h.engine.auto_advance());
    assert_eq!(h.speaker.spoken(), ["<cancel>", "0", "Correct", "<cancel>", "0"]);
}

#[tokio::test(start_paused = true)]
async fn silence_for_the_whole_window_times_out() {
    let mut h = Harness::new(42, 42);
    h.engine.start_round().unwrap();

    // Just short of the window nothing happens.
    let early = h.run_for(ANSWER_WINDOW - Duration::from_millis(1)).await;
    assert!(early.is_empty());
    assert!(h.engine.active_round().is_some());

    let retired = h.run_for(Duration::from_millis(1)).await;

    assert_eq!(retired.len(), 1);
    assert_eq!((retired[0].value, retired[0].outcome), (42, Outcome::TimedOut));
    assert_eq!(h.engine.history(), retired.as_slice());
    assert!(!h.engine.auto_advance());
    assert!(h.engine.active_round().is_none());
    assert_eq!(h.engine.revealed(), Some(42));
    assert_eq!(h.engine.advance_if_allowed().unwrap(), None);
    assert_eq!(h.speaker.spoken().last().map(String::as_str), Some("Time is up!"));
}

#[tokio::test(start_paused = true)]
async fn wrong_answer_reveals_the_number_and_stops() {
    let mut h = Harness::new(7, 7);
    h.engine.start_round().unwrap();

    let submission = h.engine.submit_answer("3");

    assert!(matches!(
        submission,
        Submission::Incorrect { entry } if entry.value == 7 && entry.outcome == Outcome::Incorrect
    ));
    assert!(!h.engine.auto_advance());
    assert_eq!(h.engine.revealed(), Some(7));
    assert_eq!(
        h.engine.notice().unwrap().to_string(),
        "Incorrect, the correct number was 7."
    );
    assert!(h.engine.active_round().is_none());

    // The deadline of the resolved round was canceled with it.
    assert!(h.run_for(ANSWER_WINDOW * 2).await.is_empty());
    assert_eq!(h.engine.history().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn answer_and_deadline_never_both_resolve_a_round() {
    let mut h = Harness::new(5, 5);
    h.engine.start_round().unwrap();

    // Let the deadline fire but keep its event queued.
    tokio::time::advance(ANSWER_WINDOW).await;
    tokio::task::yield_now().await;

    let submission = h.engine.submit_answer("5");
    assert!(matches!(submission, Submission::Correct { .. }));

    // The queued expiry belongs to the retired round and must be ignored.
    let event = h.events.try_recv().expect("expiry should be queued");
    assert_eq!(h.engine.handle_event(event), None);

    assert_eq!(h.engine.history().len(), 1);
    assert_eq!(h.engine.history()[0].outcome, Outcome::Correct);
    // The chained round is still waiting.
    assert!(h.engine.active_round().unwrap().is_pending());

    // And an answer after a timeout is a stale no-op.
    let retired = h.run_for(ANSWER_WINDOW).await;
    assert_eq!(retired.len(), 1);
    assert_eq!(h.engine.submit_answer("5"), Submission::Stale);
    assert_eq!(h.engine.history().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn manual_trigger_replaces_the_active_round() {
    let mut h = Harness::new(1, 9);
    let first = h.engine.start_round().unwrap();
    h.run_for(Duration::from_millis(2500)).await;

    let second = h.engine.manual_trigger().unwrap();
    let third = h.engine.manual_trigger().unwrap();

    assert_ne!(first, second);
    assert_ne!(second, third);
    assert_eq!(h.engine.active_round().unwrap().id(), third);
    // Abandoned rounds never reach history.
    assert!(h.engine.history().is_empty());

    // Only the newest deadline fires, one full window after its arming.
    let retired = h.run_for(ANSWER_WINDOW - Duration::from_millis(1)).await;
    assert!(retired.is_empty());
    let retired = h.run_for(Duration::from_millis(1)).await;
    assert_eq!(retired.len(), 1);
    assert_eq!(retired[0].round, third);
    assert!(h.run_for(ANSWER_WINDOW * 3).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn auto_advance_stays_off_until_manual_trigger() {
    let mut h = Harness::new(3, 3);
    h.engine.start_round().unwrap();
    h.engine.submit_answer("4");
    assert!(!h.engine.auto_advance());

    // Periodic ticks, range changes and rate changes do not resume the drill.
    for _ in 0..3 {
        assert_eq!(h.engine.advance_if_allowed().unwrap(), None);
    }
    h.engine.set_range(Range::new(0, 10).unwrap());
    assert!(!h.engine.auto_advance());
    assert_eq!(h.engine.submit_answer("3"), Submission::Stale);
    assert!(!h.engine.auto_advance());

    let resumed = h.engine.manual_trigger().unwrap();
    assert!(h.engine.auto_advance());
    assert_eq!(h.engine.active_round().unwrap().id(), resumed);
}

#[tokio::test(start_paused = true)]
async fn history_grows_by_one_per_resolution_in_order() {
    let mut h = Harness::new(6, 6);

    h.engine.start_round().unwrap();
    h.engine.submit_answer("6");
    h.engine.submit_answer("6");
    h.engine.submit_answer("1");
    h.engine.manual_trigger().unwrap();
    h.run_for(ANSWER_WINDOW).await;

    let outcomes: Vec<Outcome> = h.engine.history().iter().map(|e| e.outcome).collect();
    assert_eq!(
        outcomes,
        [
            Outcome::Correct,
            Outcome::Correct,
            Outcome::Incorrect,
            Outcome::TimedOut
        ]
    );
    let rounds: Vec<u64> = h.engine.history().iter().map(|e| e.round.value()).collect();
    assert!(rounds.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test(start_paused = true)]
async fn history_serializes_for_the_json_report() {
    let mut h = Harness::new(2, 2);
    h.engine.start_round().unwrap();
    h.engine.submit_answer("9");

    let json = serde_json::to_value(h.engine.history()).unwrap();

    assert_eq!(
        json,
        serde_json::json!([{ "round": 1, "value": 2, "outcome": "incorrect" }])
    );
}

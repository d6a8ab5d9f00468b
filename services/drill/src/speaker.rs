//! Speech backends for the terminal drill.
//!
//! `ProcessSpeaker` drives an espeak-compatible program. Utterances are queued
//! to a worker task that plays them one at a time; `cancel_all` bumps an epoch
//! that kills the running child and makes the worker skip everything queued
//! before it.
use std::process::Stdio;
use std::time::Duration;

use drill_core::{Speaker, SpeechRate, Utterance, Voice};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Words per minute espeak uses at rate 1.0.
pub const BASE_WORDS_PER_MINUTE: f32 = 175.0;
/// How long the program gets to answer `--version` at startup.
pub const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

struct Job {
    epoch: u64,
    utterance: Utterance,
}

pub struct ProcessSpeaker {
    voices: Vec<Voice>,
    jobs: mpsc::UnboundedSender<Job>,
    epoch: watch::Sender<u64>,
    worker: JoinHandle<()>,
}

impl ProcessSpeaker {
    /// Checks that `program` runs, then starts the playback worker.
    ///
    /// A program that cannot be run offers no voices, so the engine reports the
    /// language as unavailable instead of arming deadlines for silent rounds.
    pub async fn start(program: impl Into<String>, voices: Vec<Voice>) -> Self {
        let program = program.into();
        let voices = if answers_version(&program).await {
            voices
        } else {
            Vec::new()
        };

        let (jobs, job_rx) = mpsc::unbounded_channel();
        let (epoch, epoch_rx) = watch::channel(0);
        tracing::info!(%program, voices = voices.len(), "Starting speech worker");
        let worker = tokio::spawn(play_jobs(program, job_rx, epoch_rx));
        Self {
            voices,
            jobs,
            epoch,
            worker,
        }
    }
}

async fn answers_version(program: &str) -> bool {
    let status = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();
    match tokio::time::timeout(VERSION_TIMEOUT, status).await {
        Ok(Ok(status)) if status.success() => true,
        Ok(Ok(status)) => {
            tracing::warn!("{} --version exited with {}, speech disabled", program, status);
            false
        }
        Ok(Err(e)) => {
            tracing::warn!("Cannot run {}: {}, speech disabled", program, e);
            false
        }
        Err(_) => {
            tracing::warn!("{} did not answer --version, speech disabled", program);
            false
        }
    }
}

impl Speaker for ProcessSpeaker {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&mut self, utterance: Utterance) {
        let job = Job {
            epoch: *self.epoch.borrow(),
            utterance,
        };
        if self.jobs.send(job).is_err() {
            tracing::error!("Speech worker is gone, dropping an utterance");
        }
    }

    fn cancel_all(&mut self) {
        self.epoch.send_modify(|epoch| *epoch += 1);
    }
}

impl Drop for ProcessSpeaker {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn play_jobs(
    program: String,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    mut epoch: watch::Receiver<u64>,
) {
    while let Some(job) = jobs.recv().await {
        if job.epoch != *epoch.borrow_and_update() {
            tracing::trace!(text = %job.utterance.text, "Skipping canceled utterance");
            continue;
        }

        let mut child = match Command::new(&program)
            .args(command_args(&job.utterance))
            .kill_on_drop(true)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::error!("Failed to run {}: {}", program, e);
                continue;
            }
        };

        tokio::select! {
            status = child.wait() => match status {
                Ok(status) if status.success() => {
                    tracing::debug!(text = %job.utterance.text, "Utterance finished");
                }
                Ok(status) => tracing::error!("{} exited with {}", program, status),
                Err(e) => tracing::error!("Failed to wait for {}: {}", program, e),
            },
            _ = epoch.changed() => {
                if let Err(e) = child.kill().await {
                    tracing::warn!("Failed to stop {}: {}", program, e);
                }
                tracing::debug!(text = %job.utterance.text, "Utterance interrupted");
            }
        }
    }
}

/// Arguments for an espeak-compatible program.
pub fn command_args(utterance: &Utterance) -> Vec<String> {
    vec![
        "-v".to_string(),
        utterance.voice.clone(),
        "-s".to_string(),
        words_per_minute(utterance.rate).to_string(),
        utterance.text.clone(),
    ]
}

fn words_per_minute(rate: SpeechRate) -> u32 {
    (BASE_WORDS_PER_MINUTE * rate.as_f32()).round() as u32
}

/// Speaks into the log only. Selected with `DRILL_SPEECH_PROGRAM=none`.
#[derive(Debug, Clone, Default)]
pub struct LogSpeaker {
    voices: Vec<Voice>,
}

impl LogSpeaker {
    pub fn new(voices: Vec<Voice>) -> Self {
        Self { voices }
    }
}

impl Speaker for LogSpeaker {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&mut self, utterance: Utterance) {
        // The text is the answer; it stays out of the default log level.
        tracing::info!(voice = %utterance.voice, rate = %utterance.rate, "Speaking");
        tracing::debug!(text = %utterance.text, "Utterance text");
    }

    fn cancel_all(&mut self) {
        tracing::trace!("Speech canceled");
    }
}

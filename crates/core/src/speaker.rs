use crate::model::SpeechRate;
#[cfg(test)]
use mockall::automock;

/// A voice the speech backend can use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// Backend-specific identifier, passed back in `Utterance::voice`.
    pub id: String,
    /// BCP 47 language tag such as `fr-FR`.
    pub language: String,
}

impl Voice {
    pub fn new(id: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            language: language.into(),
        }
    }
}

/// One speak request.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub voice: String,
    pub rate: SpeechRate,
}

// The `Speaker` trait is the seam between the engine and whatever produces
// audio. `speak` is fire-and-forget: the engine never waits for playback.
// `cancel_all` must stop the current utterance and drop anything queued
// before returning.
#[cfg_attr(test, automock)]
pub trait Speaker {
    fn voices(&self) -> Vec<Voice>;

    fn speak(&mut self, utterance: Utterance);

    fn cancel_all(&mut self);
}

impl<S: Speaker + ?Sized> Speaker for Box<S> {
    fn voices(&self) -> Vec<Voice> {
        (**self).voices()
    }

    fn speak(&mut self, utterance: Utterance) {
        (**self).speak(utterance)
    }

    fn cancel_all(&mut self) {
        (**self).cancel_all()
    }
}

/// Finds the first voice whose language tag matches, ignoring ASCII case.
pub fn voice_for(speaker: &(impl Speaker + ?Sized), language: &str) -> Option<Voice> {
    speaker
        .voices()
        .into_iter()
        .find(|voice| voice.language.eq_ignore_ascii_case(language))
}

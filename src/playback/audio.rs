//! Audio boundary
//!
//! Synthesis lives outside this crate. The core hands resolved pitches to
//! an `AudioSink`; a sink that is not ready reports `SynthesisError` and
//! the caller logs and skips.

use crate::models::pitch::PitchInfo;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    #[error("audio output unavailable: {0}")]
    Unavailable(String),
}

/// One pitch of a chord with the timbre to play it with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordTone {
    pub pitch: PitchInfo,
    pub timbre: String,
}

/// The sounding content of one occupied slot. An empty tone list is a rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackUnit {
    pub position: u8,
    pub tones: Vec<ChordTone>,
}

impl PlaybackUnit {
    pub fn is_rest(&self) -> bool {
        self.tones.is_empty()
    }
}

pub trait AudioSink {
    fn play_note(
        &mut self,
        pitch: &PitchInfo,
        duration_secs: f64,
        volume: f64,
        timbre: &str,
    ) -> Result<(), SynthesisError>;

    fn play_chord(&mut self, tones: &[ChordTone], duration_secs: f64) -> Result<(), SynthesisError>;
}

/// Sink that plays nothing (sound disabled, headless use)
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAudio;

impl AudioSink for SilentAudio {
    fn play_note(&mut self, _: &PitchInfo, _: f64, _: f64, _: &str) -> Result<(), SynthesisError> {
        Ok(())
    }

    fn play_chord(&mut self, _: &[ChordTone], _: f64) -> Result<(), SynthesisError> {
        Ok(())
    }
}

/// Sound a unit: nothing for a rest, a note for one tone, a chord otherwise
pub fn sound_unit(
    sink: &mut dyn AudioSink,
    tones: &[ChordTone],
    duration_secs: f64,
    volume: f64,
) -> Result<(), SynthesisError> {
    match tones {
        [] => Ok(()),
        [tone] => sink.play_note(&tone.pitch, duration_secs, volume, &tone.timbre),
        _ => sink.play_chord(tones, duration_secs),
    }
}

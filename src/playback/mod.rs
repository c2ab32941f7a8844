//! Looping playback and the audio boundary

pub mod audio;
pub mod controller;

pub use audio::{AudioSink, SilentAudio, ChordTone, PlaybackUnit, SynthesisError};
pub use controller::{PlaybackController, PlaybackEvent, PlaybackState};

//! Playback tempo
//!
//! Tempo is clamped into a configured BPM range. Unparseable or empty
//! input falls back to the default tempo rather than failing.

use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMPO_BPM: f64 = 86.0;
pub const MIN_TEMPO_BPM: f64 = 40.0;
pub const MAX_TEMPO_BPM: f64 = 240.0;

/// Inclusive BPM bounds plus the fallback value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoRange {
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

impl Default for TempoRange {
    fn default() -> Self {
        Self {
            min: MIN_TEMPO_BPM,
            max: MAX_TEMPO_BPM,
            default: DEFAULT_TEMPO_BPM,
        }
    }
}

/// A validated tempo in beats per minute
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tempo(f64);

impl Tempo {
    /// Clamp a numeric BPM into range; non-finite input gives the default
    pub fn from_bpm(bpm: f64, range: &TempoRange) -> Self {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Tempo(range.default);
        }
        Tempo(bpm.clamp(range.min, range.max))
    }

    /// Parse user input (e.g. the tempo text field)
    pub fn parse(input: &str, range: &TempoRange) -> Self {
        match input.trim().parse::<f64>() {
            Ok(bpm) => Self::from_bpm(bpm, range),
            Err(_) => Tempo(range.default),
        }
    }

    pub fn bpm(&self) -> f64 {
        self.0
    }

    /// Milliseconds per beat
    pub fn beat_duration_ms(&self) -> f64 {
        60_000.0 / self.0
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Tempo(DEFAULT_TEMPO_BPM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamps_to_bounds() {
        let range = TempoRange::default();
        assert_eq!(Tempo::from_bpm(10.0, &range).bpm(), 40.0);
        assert_eq!(Tempo::from_bpm(500.0, &range).bpm(), 240.0);
        assert_eq!(Tempo::from_bpm(120.0, &range).bpm(), 120.0);
    }

    #[test]
    fn test_invalid_input_resets_to_default() {
        let range = TempoRange::default();
        assert_eq!(Tempo::parse("", &range).bpm(), 86.0);
        assert_eq!(Tempo::parse("fast", &range).bpm(), 86.0);
        assert_eq!(Tempo::from_bpm(f64::NAN, &range).bpm(), 86.0);
        assert_eq!(Tempo::parse(" 100 ", &range).bpm(), 100.0);
    }

    #[test]
    fn test_beat_duration() {
        let range = TempoRange::default();
        assert_eq!(Tempo::from_bpm(120.0, &range).beat_duration_ms(), 500.0);
        assert_eq!(Tempo::from_bpm(60.0, &range).beat_duration_ms(), 1000.0);
    }
}

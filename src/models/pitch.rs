//! Value-to-pitch mapping
//!
//! Maps an indicator score on the 0-100 scale onto one of ten ascending
//! scale tones (C4..E5). The range is cut into ten buckets of width 10;
//! the lowest bucket is inclusive of both ends (`[0, 10]`), every other
//! bucket is `(10k, 10k + 10]`.
//!
//! In minor mode the 3rd, 6th and 7th degrees are lowered a semitone.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of value buckets on the 0-100 scale
pub const BUCKET_COUNT: usize = 10;

/// Lower and upper bound of the score scale
pub const VALUE_MIN: f64 = 0.0;
pub const VALUE_MAX: f64 = 100.0;

/// Scale mode (affects degrees 3, 6 and 7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Major,
    Minor,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        }
    }

    /// The other mode (used by the major/minor toggle)
    pub fn toggled(self) -> Self {
        match self {
            Mode::Major => Mode::Minor,
            Mode::Minor => Mode::Major,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "major" | "maj" => Ok(Mode::Major),
            "minor" | "min" => Ok(Mode::Minor),
            _ => Err(format!("Invalid mode: '{}'. Expected 'major' or 'minor'", s)),
        }
    }
}

/// Whether a note head needs a ledger line drawn through or under it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerLine {
    Below,
}

/// One row of the bucket table: natural letter, octave, MIDI number and degree
struct BucketTone {
    letter: &'static str,
    octave: u8,
    midi: u8,
    degree: u8,
}

const BUCKET_TONES: [BucketTone; BUCKET_COUNT] = [
    BucketTone { letter: "C", octave: 4, midi: 60, degree: 1 },
    BucketTone { letter: "D", octave: 4, midi: 62, degree: 2 },
    BucketTone { letter: "E", octave: 4, midi: 64, degree: 3 },
    BucketTone { letter: "F", octave: 4, midi: 65, degree: 4 },
    BucketTone { letter: "G", octave: 4, midi: 67, degree: 5 },
    BucketTone { letter: "A", octave: 4, midi: 69, degree: 6 },
    BucketTone { letter: "B", octave: 4, midi: 71, degree: 7 },
    BucketTone { letter: "C", octave: 5, midi: 72, degree: 1 },
    BucketTone { letter: "D", octave: 5, midi: 74, degree: 2 },
    BucketTone { letter: "E", octave: 5, midi: 76, degree: 3 },
];

/// Result of mapping a value to a pitch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchInfo {
    /// Spelled degree name, e.g. "A" or "Ab"
    pub degree_name: String,

    /// Scale degree (1-7)
    pub degree: u8,

    /// MIDI note number
    pub midi: u8,

    /// Frequency in Hz (equal temperament, A4 = 440)
    pub frequency: f64,

    pub octave: u8,

    /// Degree name with octave, e.g. "Ab4"
    pub full_name: String,

    pub needs_ledger_line: Option<LedgerLine>,

    /// Input value after clamping to [0, 100]
    pub clamped_value: f64,

    /// Bucket index (0-9)
    pub bucket: u8,

    /// Staff placement class, e.g. "note-value-51-60"
    pub position_class: String,
}

/// Is this degree lowered in minor mode
fn lowered_in_minor(degree: u8) -> bool {
    matches!(degree, 3 | 6 | 7)
}

/// Clamp a score into [0, 100]. NaN is mapped to the bottom of the scale.
pub fn clamp_value(value: f64) -> f64 {
    if value.is_nan() {
        log::warn!("valueToNote received NaN, treating as {}", VALUE_MIN);
        return VALUE_MIN;
    }
    value.clamp(VALUE_MIN, VALUE_MAX)
}

/// Bucket index (0-9) of an already clamped value
pub fn bucket_index(clamped: f64) -> usize {
    if clamped <= 10.0 {
        return 0;
    }
    let idx = (clamped / 10.0).ceil() as usize - 1;
    idx.min(BUCKET_COUNT - 1)
}

fn position_class(bucket: usize) -> String {
    if bucket == 0 {
        "note-value-0-10".to_string()
    } else {
        format!("note-value-{}-{}", bucket * 10 + 1, bucket * 10 + 10)
    }
}

/// Equal-tempered frequency of a MIDI note number
pub fn midi_to_frequency(midi: u8) -> f64 {
    440.0 * 2f64.powf((midi as f64 - 69.0) / 12.0)
}

/// Map a score to a pitch under the given mode.
///
/// Out-of-range input is clamped, never rejected.
pub fn value_to_note(value: f64, mode: Mode) -> PitchInfo {
    let clamped = clamp_value(value);
    let bucket = bucket_index(clamped);
    let tone = &BUCKET_TONES[bucket];

    let flatten = mode == Mode::Minor && lowered_in_minor(tone.degree);
    let midi = if flatten { tone.midi - 1 } else { tone.midi };
    let degree_name = if flatten {
        format!("{}b", tone.letter)
    } else {
        tone.letter.to_string()
    };

    PitchInfo {
        full_name: format!("{}{}", degree_name, tone.octave),
        degree_name,
        degree: tone.degree,
        midi,
        frequency: midi_to_frequency(midi),
        octave: tone.octave,
        needs_ledger_line: if bucket == 0 { Some(LedgerLine::Below) } else { None },
        clamped_value: clamped,
        bucket: bucket as u8,
        position_class: position_class(bucket),
    }
}

/// Signed semitone distance from `a` to `b`
pub fn interval_semitones(a: f64, b: f64, mode: Mode) -> i16 {
    value_to_note(b, mode).midi as i16 - value_to_note(a, mode).midi as i16
}

/// Intervals treated as consonant (unison, thirds, fourth, fifth, sixths, octave)
const CONSONANT_INTERVALS: [i16; 8] = [0, 3, 4, 5, 7, 8, 9, 12];

/// Whether the two values sound a consonant interval
pub fn is_consonant(a: f64, b: f64, mode: Mode) -> bool {
    CONSONANT_INTERVALS.contains(&interval_semitones(a, b, mode).abs())
}

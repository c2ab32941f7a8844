//! Composer configuration
//!
//! The knobs that differed between exhibit builds (indicator cap,
//! selectable indicators, timbre table, sound gating) live here so one
//! implementation serves all of them. Every field has a default; a config
//! file only needs to name what it changes.

use crate::models::indicator::IndicatorId;
use crate::models::indicator_data::DataError;
use crate::models::notice::DEFAULT_NOTICE_MS;
use crate::models::pitch::Mode;
use crate::models::tempo::{TempoRange, DEFAULT_TEMPO_BPM, MAX_TEMPO_BPM, MIN_TEMPO_BPM};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Hard upper bound on indicators per note
pub const MAX_INDICATORS_LIMIT: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComposerConfig {
    /// How many indicators may be selected at once (3 or 4 in practice)
    pub max_indicators: usize,

    /// Indicators offered for selection
    pub selectable_indicators: Vec<IndicatorId>,

    /// Per-indicator timbre ids passed to the audio layer
    pub timbres: HashMap<IndicatorId, String>,

    pub default_timbre: String,

    /// When false no audio calls are made at all
    pub sound_enabled: bool,

    pub default_tempo: f64,
    pub min_tempo: f64,
    pub max_tempo: f64,

    pub year_min: u16,
    pub year_max: u16,
    pub default_year: u16,

    pub default_mode: Mode,

    pub note_volume: f64,

    /// Click-to-play duration in seconds
    pub preview_duration_secs: f64,

    pub notice_duration_ms: u32,

    /// Fixed seed for the shuffle RNG (replays, tests)
    pub shuffle_seed: Option<u64>,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            max_indicators: MAX_INDICATORS_LIMIT,
            selectable_indicators: [1, 3, 7, 13, 16].into_iter().map(IndicatorId).collect(),
            timbres: HashMap::new(),
            default_timbre: "sine".to_string(),
            sound_enabled: true,
            default_tempo: DEFAULT_TEMPO_BPM,
            min_tempo: MIN_TEMPO_BPM,
            max_tempo: MAX_TEMPO_BPM,
            year_min: 2015,
            year_max: 2024,
            default_year: 2024,
            default_mode: Mode::Major,
            note_volume: 0.3,
            preview_duration_secs: 0.5,
            notice_duration_ms: DEFAULT_NOTICE_MS,
            shuffle_seed: None,
        }
    }
}

impl ComposerConfig {
    pub fn from_json(json: &str) -> Result<Self, DataError> {
        let config: ComposerConfig =
            serde_json::from_str(json).map_err(|e| DataError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, DataError> {
        let config: ComposerConfig =
            serde_yaml::from_str(yaml).map_err(|e| DataError::Yaml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DataError> {
        if self.max_indicators == 0 || self.max_indicators > MAX_INDICATORS_LIMIT {
            return Err(DataError::Config(format!(
                "maxIndicators {} must be 1-{}",
                self.max_indicators, MAX_INDICATORS_LIMIT
            )));
        }
        if self.selectable_indicators.is_empty() {
            return Err(DataError::Config("selectableIndicators is empty".into()));
        }
        if let Some(bad) = self.selectable_indicators.iter().find(|id| !id.is_known()) {
            return Err(DataError::Config(format!("unknown indicator {}", bad.number())));
        }
        if self.min_tempo <= 0.0 || self.min_tempo > self.max_tempo {
            return Err(DataError::Config(format!(
                "tempo range {}-{} is invalid",
                self.min_tempo, self.max_tempo
            )));
        }
        if self.year_min > self.year_max
            || !(self.year_min..=self.year_max).contains(&self.default_year)
        {
            return Err(DataError::Config(format!(
                "default year {} outside {}-{}",
                self.default_year, self.year_min, self.year_max
            )));
        }
        Ok(())
    }

    pub fn tempo_range(&self) -> TempoRange {
        TempoRange {
            min: self.min_tempo,
            max: self.max_tempo,
            default: self.default_tempo.clamp(self.min_tempo, self.max_tempo),
        }
    }

    pub fn timbre_for(&self, id: IndicatorId) -> &str {
        self.timbres
            .get(&id)
            .map(String::as_str)
            .unwrap_or(&self.default_timbre)
    }

    pub fn clamp_year(&self, year: u16) -> u16 {
        year.clamp(self.year_min, self.year_max)
    }
}

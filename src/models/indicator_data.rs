//! Indicator data source
//!
//! Values are keyed `country -> year -> indicator`. The data set is loaded
//! once from JSON shaped like:
//!
//! ```json
//! { "USA": { "2020": { "sdg1": 45.2, "sdg3": null } } }
//! ```
//!
//! Missing countries, years, indicators, and non-numeric values all resolve
//! to `None` (rendered as a rest).

use crate::models::indicator::IndicatorId;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Failures while loading data or configuration
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataError {
    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("invalid YAML: {0}")]
    Yaml(String),

    #[error("unexpected data shape: {0}")]
    Shape(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

type YearTable = HashMap<u16, HashMap<String, f64>>;

#[derive(Debug, Clone, Default)]
pub struct IndicatorData {
    countries: HashMap<String, YearTable>,
}

impl IndicatorData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the JSON data set
    pub fn from_json(json: &str) -> Result<Self, DataError> {
        let root: Value = serde_json::from_str(json).map_err(|e| DataError::Json(e.to_string()))?;
        let countries = root
            .as_object()
            .ok_or_else(|| DataError::Shape("top level must be an object keyed by country".into()))?;

        let mut data = IndicatorData::new();
        for (country, years) in countries {
            let Some(years) = years.as_object() else {
                log::warn!("Skipping country {}: expected an object of years", country);
                continue;
            };
            for (year, values) in years {
                let Ok(year_num) = year.trim().parse::<u16>() else {
                    log::warn!("Skipping {}/{}: year is not a number", country, year);
                    continue;
                };
                let Some(values) = values.as_object() else {
                    continue;
                };
                for (key, value) in values {
                    if let Some(number) = value.as_f64() {
                        data.insert(country, year_num, key, number);
                    }
                }
            }
        }

        log::info!("✅ Indicator data loaded: {} countries", data.countries.len());
        Ok(data)
    }

    /// Insert a single value (data key form, e.g. "sdg3")
    pub fn insert(&mut self, country: &str, year: u16, key: &str, value: f64) {
        self.countries
            .entry(country.to_string())
            .or_default()
            .entry(year)
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Look up one indicator value; `None` when absent
    pub fn value(&self, country: &str, year: u16, indicator: IndicatorId) -> Option<f64> {
        self.countries
            .get(country)?
            .get(&year)?
            .get(&indicator.data_key())
            .copied()
            .filter(|v| v.is_finite())
    }

    /// Resolve every indicator of a selection for one country/year
    pub fn values(&self, country: &str, year: u16, indicators: &[IndicatorId]) -> Vec<Option<f64>> {
        indicators
            .iter()
            .map(|id| self.value(country, year, *id))
            .collect()
    }

    pub fn country_count(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }
}
